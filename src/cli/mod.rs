//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{KindsCommand, ListCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Declarative action pipelines over domain objects
#[derive(Debug, Parser, Clone)]
#[command(name = "actionpipe")]
#[command(author = "actionpipe contributors")]
#[command(version = "0.1.0")]
#[command(about = "Run and inspect declarative action pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Handle one request against a domain
    Run(RunCommand),

    /// Validate a domain configuration
    Validate(ValidateCommand),

    /// List templates, models and their actions
    List(ListCommand),

    /// List every recognized step kind
    Kinds(KindsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
