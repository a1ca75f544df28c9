//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! armar train experiment.ini
//! armar train experiment.ini --overwrite --set main.epochs=20
//! armar validate experiment.ini
//! armar info experiment.ini --format json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Armar: declarative experiment assembly and training orchestration
#[derive(Parser, Debug, Clone)]
#[command(name = "armar")]
#[command(version)]
#[command(about = "Assemble experiments from configuration blocks and drive training")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run an experiment from a configuration file
    Train(TrainArgs),

    /// Check a configuration (parse, references, cycles) without building it
    Validate(ValidateArgs),

    /// Display the sections of a configuration
    Info(InfoArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Path to the experiment configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override an option; the syntax is section.option=value
    #[arg(short = 's', long = "set", value_name = "SETTING")]
    pub overrides: Vec<String>,

    /// Force overwriting the output directory
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Initialize the output directory and exit without building the model
    #[arg(short, long)]
    pub init_only: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the experiment configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Path to the experiment configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: InfoFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InfoFormat {
    #[default]
    Text,
    Json,
}
