//! Subcommands that read or prepare the graph store.

use clap::Args;

/// Arguments for the ledger subcommand
#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Import run whose entries to list
    #[arg(value_name = "IMPORT_ID")]
    pub import_id: i64,

    /// Only list entries with this action (e.g. createTag)
    #[arg(long)]
    pub action: Option<String>,
}

/// Arguments for the create-item-set subcommand
#[derive(Args, Debug)]
pub struct ItemSetArgs {
    /// Title of the new item set
    #[arg(value_name = "TITLE")]
    pub title: String,
}
