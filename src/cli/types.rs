//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tactician")]
#[command(about = "Tactician - adaptive decision engine for turn-based agents", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Project directory holding `.tactician/`
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what a persisted agent has learned
    Status {
        /// Agent ID
        #[arg(short, long)]
        agent: String,

        /// Number of variants and actions to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List persisted agents
    Agents,

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration after file and environment overrides
    Show,
}
