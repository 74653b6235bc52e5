//! CLI command definitions for hierconf
//!
//! This module defines the CLI structure using clap's derive macros.
//! Global options describe the store chain; subcommands query or update it.

use crate::error::Result;
use crate::format::Format;
use crate::logging::LogTarget;
use crate::provider::ProviderOptions;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}

/// Inspect and edit layered configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Provider description file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Add a file store; earlier files take precedence
    #[arg(short = 'f', long = "file", global = true)]
    pub files: Vec<PathBuf>,

    /// Add an environment store ahead of the files
    #[arg(short, long, global = true)]
    pub env: bool,

    /// Separator for nesting environment variable names
    #[arg(long, global = true)]
    pub env_separator: Option<String>,

    /// Only read environment variables with this prefix
    #[arg(long, global = true)]
    pub env_prefix: Option<String>,

    /// Key separator; overrides the description's separator
    #[arg(short, long, global = true)]
    pub separator: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Provider description from `--config`, with `--separator` applied on top.
    pub fn provider_options(&self) -> Result<ProviderOptions> {
        let mut options = match &self.config {
            Some(path) => ProviderOptions::from_path(path)?,
            None => ProviderOptions::default(),
        };
        if let Some(separator) = &self.separator {
            options.separator = separator.clone();
        }
        Ok(options)
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value of a key
    Get { key: String },

    /// Print the first defined value among several keys
    Any {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set a key and save; the value is parsed as JSON when possible
    Set {
        key: String,
        value: String,
        /// Target store (defaults to the first writable store)
        #[arg(long)]
        store: Option<String>,
    },

    /// Load every store and print the merged configuration
    Dump {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List stores in precedence order
    Stores,
}
