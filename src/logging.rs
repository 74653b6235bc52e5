//! Tracing setup for the command-line tool.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::FmtSubscriber;

/// Where log output goes: `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl FromStr for LogTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            path => LogTarget::File(PathBuf::from(path)),
        })
    }
}

fn filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init(target: &LogTarget, verbose: bool) -> anyhow::Result<()> {
    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter(verbose))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
