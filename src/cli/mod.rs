//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PrintCommand, RunCommand, TasksCommand, ValidateCommand};
use std::ffi::OsString;

/// Phase-ordered job orchestrator
#[derive(Debug, Parser, Clone)]
#[command(name = "nightwatch")]
#[command(version)]
#[command(about = "Run phase-ordered jobs of pluggable task units", long_about = None)]
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
    /// Run a job
    Run(RunCommand),

    /// Validate a job file
    Validate(ValidateCommand),

    /// Print the resolved blueprint of a job
    Print(PrintCommand),

    /// List available task units
    Tasks(TasksCommand),
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
