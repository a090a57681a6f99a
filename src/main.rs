//! diigo-sync
//!
//! Imports a Diigo bookmark library into a semantic graph store and
//! inspects past import runs.

use anyhow::{Result, anyhow};
use clap::Parser;
use diigo_sync::cli::import::ImportArgs;
use diigo_sync::cli::inspect::{ItemSetArgs, LedgerArgs};
use diigo_sync::cli::{Cli, Command};
use diigo_sync::config::Config;
use diigo_sync::db::Database;
use diigo_sync::diigo::url::{DiigoUrls, library_url};
use diigo_sync::diigo::{ApiTransport, FeedTransport, TransportMode, build_http_client};
use diigo_sync::error::{SyncError, SyncResult};
use diigo_sync::format::{
    OutputFormat, format_imports_markdown, format_ledger_markdown, format_report_markdown,
};
use diigo_sync::logging::{self, LogTarget};
use diigo_sync::repository::Repository;
use diigo_sync::sync::{
    CancellationToken, FileDownloader, Importer, MappingTable, StopReason, SyncReport,
};
use diigo_sync::types::{ImportStatus, Term};
use serde_json::json;
use std::io;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Diigo API version recorded on every import run.
const API_VERSION: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    if let Some(media_dir) = &cli.media_dir {
        config.store.media_dir = media_dir.into();
    }
    config.ensure_dirs()?;

    match cli.command {
        Command::Import(args) => run_import(config, args, cli.format).await,
        Command::Imports => run_imports(&config, cli.format),
        Command::Ledger(args) => run_ledger(&config, args, cli.format),
        Command::CreateItemSet(args) => run_create_item_set(&config, args, cli.format),
    }
}

fn open_database(config: &Config) -> Result<Database> {
    Ok(Database::open(&config.store.db_path)?.with_media_dir(&config.store.media_dir))
}

/// Register a run, execute it on a blocking worker and record its outcome.
/// Ctrl-C asks the job to stop after the record in flight.
async fn run_import(config: Config, args: ImportArgs, format: OutputFormat) -> Result<()> {
    args.validate()?;

    let db = open_database(&config)?;
    let import_id = db.create_import(
        &args.user,
        &library_url(&args.user),
        API_VERSION,
        args.transport.as_str(),
    )?;
    info!(import_id, user = %args.user, transport = %args.transport, "registered import");

    let cancel = CancellationToken::new();
    let job = {
        let db = db.clone();
        let config = config.clone();
        let args = args.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || run_job(&db, &config, &args, import_id, cancel))
    };

    let outcome = await_job(job, tokio::signal::ctrl_c(), &cancel)
        .await
        .map_err(|e| anyhow!("import worker failed: {}", e))?;

    match outcome {
        Ok(report) => {
            let status = if report.stop == StopReason::Cancelled {
                ImportStatus::Stopped
            } else {
                ImportStatus::Completed
            };
            db.finish_import(import_id, status, None)?;
            print_report(import_id, &report, format)?;
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            db.finish_import(import_id, ImportStatus::Error, Some(&message))?;
            error!(import_id, code = ?err.code, error = %message, "import failed");
            Err(err.into())
        }
    }
}

/// Wait for the job. The first interrupt cancels it and the job is still
/// awaited to the end. If no interrupt listener can be installed the job
/// runs on uninterruptible.
async fn await_job<T>(
    mut job: JoinHandle<T>,
    interrupt: impl Future<Output = io::Result<()>>,
    cancel: &CancellationToken,
) -> Result<T, JoinError> {
    tokio::select! {
        joined = &mut job => joined,
        signal = interrupt => {
            match signal {
                Ok(()) => {
                    warn!("interrupt received, stopping after the current record");
                    cancel.cancel();
                }
                Err(err) => warn!(error = %err, "cannot listen for interrupts"),
            }
            job.await
        }
    }
}

/// The synchronous part of an import. Runs off the async runtime because
/// the HTTP client is blocking.
fn run_job(
    db: &Database,
    config: &Config,
    args: &ImportArgs,
    import_id: i64,
    cancel: CancellationToken,
) -> SyncResult<SyncReport> {
    let client = build_http_client(config.http.timeout_seconds)?;
    let params = args.to_params(import_id, config.sync.page_size)?;
    let table = match &config.sync.mapping_path {
        Some(path) => MappingTable::load(path)
            .map_err(|e| SyncError::invalid_params(format!("{:#}", e)))?,
        None => MappingTable::default(),
    };
    let downloader = FileDownloader::new(client.clone(), config.temp_dir())
        .with_prefix(&config.sync.temp_prefix)
        .with_max_attempts(config.sync.download_attempts);
    let urls = DiigoUrls::new(
        &config.http.api_base,
        &config.http.feed_base,
        args.api_key.clone().unwrap_or_default(),
        &args.user,
    );

    match args.transport {
        TransportMode::Api => {
            let transport = ApiTransport::new(
                client.clone(),
                urls,
                args.login(),
                args.password.as_deref().unwrap_or_default(),
            )
            .with_query(args.what.clone());
            if !args.skip_verify {
                transport.verify()?;
            }
            Importer::new(db, transport, params)?
                .with_mapping(&table)
                .with_downloader(downloader)
                .with_probe(client)
                .with_cancel(cancel)
                .run()
        }
        TransportMode::Feed => {
            let transport = FeedTransport::new(
                client.clone(),
                urls,
                args.session_cookie.as_deref().unwrap_or_default(),
            )
            .with_query(args.what.clone());
            Importer::new(db, transport, params)?
                .with_mapping(&table)
                .with_downloader(downloader)
                .with_probe(client)
                .with_cancel(cancel)
                .run()
        }
    }
}

fn print_report(import_id: i64, report: &SyncReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "import_id": import_id, "report": report }))?
        ),
        OutputFormat::Markdown => print!("{}", format_report_markdown(import_id, report)),
    }
    Ok(())
}

fn run_imports(config: &Config, format: OutputFormat) -> Result<()> {
    let db = open_database(config)?;
    let mut runs = Vec::new();
    for run in db.list_imports()? {
        let counts = db.import_action_counts(run.id)?;
        runs.push((run, counts));
    }

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = runs
                .iter()
                .map(|(run, counts)| json!({ "import": run, "actions": counts }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Markdown => print!("{}", format_imports_markdown(&runs)),
    }
    Ok(())
}

fn run_ledger(config: &Config, args: LedgerArgs, format: OutputFormat) -> Result<()> {
    let db = open_database(config)?;
    if db.get_import(args.import_id)?.is_none() {
        return Err(anyhow!("import {} not found", args.import_id));
    }

    let mut entries = db.ledger_entries(args.import_id)?;
    if let Some(action) = &args.action {
        entries.retain(|entry| entry.action.as_str() == action);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Markdown => print!("{}", format_ledger_markdown(args.import_id, &entries)),
    }
    Ok(())
}

fn run_create_item_set(config: &Config, args: ItemSetArgs, format: OutputFormat) -> Result<()> {
    let db = open_database(config)?;
    let title = db
        .schema()?
        .property(&Term::new("dcterms", "title"))
        .ok_or_else(|| anyhow!("schema lacks dcterms:title"))?;
    let id = db.create_item_set(&args.title, title)?;
    info!(item_set = id, title = %args.title, "created item set");

    match format {
        OutputFormat::Json => println!("{}", json!({ "item_set_id": id, "title": args.title })),
        OutputFormat::Markdown => println!("Created item set {}: {}", id, args.title),
    }
    Ok(())
}
