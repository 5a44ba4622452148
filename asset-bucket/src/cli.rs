///
/// This module implements the CLI interface for asset-bucket: command parsing,
/// configuration resolution and user-visible reporting.
///
/// All business logic (scanning, migration, batching) lives in the
/// [`asset-bucket-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: use the installed `asset-bucket` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`asset-bucket-core`]: ../../asset-bucket-core/
use crate::load_config::{
    load_config, migration_config, resolve_domain, resolve_store_config, FileConfig,
    StoreOverrides,
};
use crate::upload::HttpAssetStore;
use anyhow::Result;
use asset_bucket_core::batch::{collect_documents, run_batch, BatchReport};
use asset_bucket_core::migrate::MigrationEngine;
use asset_bucket_core::scan::{AssetLocation, ReferenceScanner};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// CLI for asset-bucket: move media referenced by markdown into an object store.
#[derive(Parser)]
#[clap(
    name = "asset-bucket",
    version,
    about = "Upload images and audio referenced by markdown documents to an object store and rewrite the links"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload local assets of the given documents (or directories) and rewrite their links
    Migrate {
        /// Markdown files or directories to process recursively
        #[clap(required = true)]
        paths: Vec<PathBuf>,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        #[clap(flatten)]
        store: StoreArgs,
        /// Re-upload legacy remote links from matching local files (needs migrate.legacy in the config)
        #[clap(long)]
        relink_legacy: bool,
    },
    /// List the asset references of the given documents without changing anything
    Scan {
        /// Markdown files or directories to scan recursively
        #[clap(required = true)]
        paths: Vec<PathBuf>,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Public store domain; links on it are reported as remote
        #[clap(long)]
        domain: Option<String>,
    },
}

/// Store settings that may be given on the command line.
#[derive(Args, Debug, Default, Clone)]
pub struct StoreArgs {
    /// Store access key
    #[clap(long = "ak")]
    pub access_key: Option<String>,
    /// Store secret key
    #[clap(long = "sk")]
    pub secret_key: Option<String>,
    /// Bucket name
    #[clap(long)]
    pub bucket: Option<String>,
    /// Public domain uploaded objects are served from
    #[clap(long)]
    pub domain: Option<String>,
    /// Upload endpoint base URL
    #[clap(long)]
    pub endpoint: Option<String>,
}

impl From<StoreArgs> for StoreOverrides {
    fn from(args: StoreArgs) -> Self {
        StoreOverrides {
            access_key: args.access_key,
            secret_key: args.secret_key,
            bucket: args.bucket,
            domain: args.domain,
            endpoint: args.endpoint,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Migrate {
            paths,
            config,
            store,
            relink_legacy,
        } => migrate(&paths, config.as_deref(), store, relink_legacy).await,
        Commands::Scan {
            paths,
            config,
            domain,
        } => scan(&paths, config.as_deref(), domain),
    }
}

fn file_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(FileConfig::default()),
    }
}

async fn migrate(
    paths: &[PathBuf],
    config: Option<&Path>,
    store: StoreArgs,
    relink_legacy: bool,
) -> Result<()> {
    let file = file_config(config)?;
    // Credentials are checked before any document is touched.
    let store_config = resolve_store_config(&file, &store.into())?;
    store_config.trace_loaded();

    let migration = migration_config(&file, Some(store_config.domain.clone()), relink_legacy);
    migration.trace_loaded();

    let documents = collect_documents(paths, &migration.extension)?;
    tracing::info!(command = "migrate", documents = documents.len(), "Starting migration");

    let client = HttpAssetStore::new(store_config)?;
    let engine = MigrationEngine::new(&migration, &client);
    let report = run_batch(&engine, &documents).await;

    print_report(&report);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => tracing::debug!(json = %json, "Migration report as JSON"),
        Err(e) => tracing::error!(error = ?e, "Failed to serialize migration report"),
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        println!(
            "{}: {} migrated, {} skipped ({} missing, {} failed), {} remote{}",
            outcome.document.display(),
            outcome.migrated,
            outcome.skipped(),
            outcome.missing,
            outcome.failed,
            outcome.remote,
            if outcome.written { ", backup kept" } else { "" }
        );
    }
    for failure in &report.failures {
        println!("{}: FAILED: {}", failure.document.display(), failure.error);
    }
    println!(
        "Done. {} asset(s) migrated across {} document(s), {} document(s) failed.",
        report.total_migrated,
        report.outcomes.len(),
        report.failures.len()
    );
}

fn scan(paths: &[PathBuf], config: Option<&Path>, domain: Option<String>) -> Result<()> {
    let file = file_config(config)?;
    let migration = migration_config(&file, resolve_domain(&file, &domain), false);
    let scanner = ReferenceScanner::new(&migration.audio_marker, migration.remote_domain.as_deref());
    let documents = collect_documents(paths, &migration.extension)?;
    tracing::info!(command = "scan", documents = documents.len(), "Scanning documents");

    for document in &documents {
        let text = match std::fs::read_to_string(document) {
            Ok(text) => text,
            Err(e) => {
                println!("{}: FAILED: {}", document.display(), e);
                continue;
            }
        };
        println!("{}", document.display());
        for reference in scanner.scan(document, &text) {
            let status = match &reference.location {
                AssetLocation::Local(path) if path.exists() => "local",
                AssetLocation::Local(_) => "missing",
                AssetLocation::Remote => "remote",
            };
            println!("  [{status}] {:?} {}", reference.kind, reference.target);
        }
    }
    Ok(())
}
