//! CLI command definitions for diigo-sync
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod import;
pub mod inspect;

use crate::format::OutputFormat;
use clap::{Parser, Subcommand};
use import::ImportArgs;
use inspect::{ItemSetArgs, LedgerArgs};

/// Diigo library sync into a semantic graph store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Path to media directory (overrides config)
    #[arg(short, long, global = true)]
    pub media_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format of command results
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a Diigo library into an item set
    Import(ImportArgs),

    /// List import runs with their per-action counts
    Imports,

    /// List the ledger entries of one import run
    Ledger(LedgerArgs),

    /// Create an item set to import into
    CreateItemSet(ItemSetArgs),
}
