//! hierconf command-line tool
//!
//! Builds a provider from a description file and/or command-line options,
//! then reads or edits the layered configuration.

use anyhow::{Context, Result, bail};
use clap::Parser;
use hierconf::cli::{Cli, Command};
use hierconf::format::Format;
use hierconf::logging;
use hierconf::{EnvOptions, Provider};
use serde_json::Value;
use tracing::debug;

fn build_provider(cli: &Cli) -> Result<Provider> {
    let options = cli.provider_options().with_context(|| match &cli.config {
        Some(path) => format!("reading provider description {}", path.display()),
        None => "building provider options".to_string(),
    })?;
    let mut provider = Provider::from_options(options)?;

    if cli.env {
        let options = EnvOptions {
            separator: cli.env_separator.clone(),
            prefix: cli.env_prefix.clone(),
            ..Default::default()
        };
        provider.env(options)?;
    }

    for path in &cli.files {
        provider.file_named(&path.display().to_string(), path.as_path())?;
    }

    debug!("Store order: {:?}", provider.store_names());
    Ok(provider)
}

fn print_value(value: &Value) -> Result<()> {
    match value {
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

/// Parse a command-line value as JSON, falling back to a plain string.
fn parse_cli_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log, cli.verbose)?;

    let mut provider = build_provider(&cli)?;

    match &cli.command {
        Command::Get { key } => match provider.get_async(key).await? {
            Some(value) => print_value(&value)?,
            None => bail!("{key} is not defined"),
        },
        Command::Any { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            match provider.any_async(&keys).await? {
                Some(value) => print_value(&value)?,
                None => bail!("none of {} is defined", keys.join(", ")),
            }
        }
        Command::Set { key, value, store } => {
            let value = parse_cli_value(value);
            let written = match store {
                Some(name) => provider.set_in(name, key, value)?,
                None => provider.set(key, value),
            };
            if !written {
                bail!("no writable store accepted {key}");
            }
            provider.save_async().await?;
        }
        Command::Dump { output } => {
            let merged = provider.load_async().await?;
            let text = Format::from(*output)
                .stringify(&merged)
                .map_err(anyhow::Error::msg)?;
            println!("{}", text.trim_end());
        }
        Command::Stores => {
            for name in provider.store_names() {
                if let Some(store) = provider.store(name) {
                    let access = if store.read_only() { "ro" } else { "rw" };
                    println!("{name}\t{}\t{access}", store.kind());
                }
            }
        }
    }

    Ok(())
}
