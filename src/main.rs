mod cli;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use deposit_recon::config::{ConfigError, Settings, StoreBackend};
use deposit_recon::ingest::IngestOptions;
use deposit_recon::store::StoreError;
use deposit_recon::report::{AddressRegistry, write_csv_report, write_report};
use deposit_recon::{
    AggregationEngine, Error, FixtureSource, FjallStore, Ingestor, MemoryStore, RecordStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, Error> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    if let Some(dir) = &cli.fixtures {
        settings.source.fixtures_dir = dir.clone();
    }
    if let Some(max_pages) = cli.max_pages {
        settings.ingest.max_pages = Some(max_pages);
    }
    settings.validate().map_err(ConfigError::from)?;

    Ok(settings)
}

async fn run(cli: &Cli, settings: &Settings) -> Result<(), Error> {
    match settings.store.backend {
        StoreBackend::Memory => reconcile(Arc::new(MemoryStore::new()), cli, settings).await,
        StoreBackend::Fjall => {
            let store = Arc::new(FjallStore::open(&settings.store.path)?);
            let result = reconcile(store.clone(), cli, settings).await;
            // flush whatever was committed, even after a failed run
            settle(result, store.persist())
        }
    }
}

/// The run's own failure wins over a failure to persist afterwards.
fn settle(result: Result<(), Error>, persisted: Result<(), StoreError>) -> Result<(), Error> {
    match (result, persisted) {
        (Err(e), Err(persist)) => {
            warn!("failed to persist store after a failed run: {persist}");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), persisted) => Ok(persisted?),
    }
}

async fn reconcile<S: RecordStore>(
    store: Arc<S>,
    cli: &Cli,
    settings: &Settings,
) -> Result<(), Error> {
    let registry: AddressRegistry = settings.registry();
    if registry.is_empty() {
        warn!("no known addresses configured, every deposit is unreferenced");
    }

    let source = FixtureSource::new(&settings.source.fixtures_dir);
    let mut ingestor =
        Ingestor::new(store.clone(), source).with_options(IngestOptions::from(&settings.ingest));

    let report = ingestor.run_until(shutdown_signal()).await?;
    for failure in &report.failures {
        warn!(page = failure.page, reason = %failure.error, "page was only partially applied");
    }
    info!(pages = report.pages, stop = ?report.stop, "ingestion complete");

    let summary = AggregationEngine::new(store).summarize(&registry).await?;

    let stdout = io::stdout();
    match cli.format {
        ReportFormat::Text => write_report(&summary, &registry, stdout.lock())?,
        ReportFormat::Csv => write_csv_report(&summary, &registry, stdout.lock())?,
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // without a signal handler, never cancel
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
