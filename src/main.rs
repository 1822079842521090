use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::{error, info};

use fieldbook::{
    cache::{RowCache, SqliteCache},
    catalog::HttpCatalog,
    config::Config,
    exchange, ingest,
    progress::{self, IngestPhase},
    store::{AppStatus, LoadOutcome, RowStore},
};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "FIELDBOOK_CONFIG")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Populate the table from the remote catalog, unless the cache
    /// already holds rows.
    Sync {
        /// Clear the cache and re-ingest even if rows exist.
        #[clap(long)]
        force: bool,
    },
    /// Import a delimited-text file, inferring columns for unknown headers.
    Import { file: PathBuf },
    /// Export the whole table to a delimited-text file.
    Export { file: PathBuf },
}

async fn open_store(config: &Config) -> anyhow::Result<RowStore<SqliteCache>> {
    let cache = SqliteCache::open(&config.cache.database_url)
        .await
        .with_context(|| format!("open cache at {}", config.cache.database_url))?;
    Ok(RowStore::new(cache))
}

async fn sync(config: Config, force: bool) -> anyhow::Result<()> {
    let mut store = open_store(&config).await?;
    if force {
        store.cache().clear_rows().await.context("clear cache")?;
    }
    match store.load().await.context("load cache")? {
        LoadOutcome::Ready if !force => {
            info!(rows = store.rows().len(), "cache already populated, skipping ingestion");
            return Ok(());
        }
        _ => {}
    }

    store.set_status(AppStatus::Fetching);
    let reporter = progress::create_reporter();
    let client = HttpCatalog::new(config.catalog.base_url.clone());
    let result = ingest::ingest_all(
        &client,
        config.catalog.batch_size,
        config.catalog.index_cap,
        &mut store,
        reporter.as_ref(),
    )
    .await;
    match result {
        Ok(summary) => {
            store.set_status(AppStatus::Ready);
            store.set_progress(100);
            reporter.set_phase(IngestPhase::Completed);
            reporter.finish();
            info!(
                delivered = summary.delivered,
                attempted = summary.attempted,
                total = summary.total,
                "ingestion complete"
            );
            Ok(())
        }
        Err(error) => {
            store.set_status(AppStatus::Error);
            reporter.set_phase(IngestPhase::Failed(error.to_string()));
            reporter.finish();
            Err(error.into())
        }
    }
}

async fn import(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let mut store = open_store(&config).await?;
    store.load().await.context("load cache")?;
    let reader = std::fs::File::open(&file)
        .with_context(|| format!("open {}", file.display()))?;
    let summary = exchange::import_into(&mut store, reader)
        .await
        .context("import")?;
    info!(
        rows = summary.rows,
        new_columns = summary.new_columns,
        "import complete"
    );
    Ok(())
}

async fn export(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let mut store = open_store(&config).await?;
    if store.load().await.context("load cache")? == LoadOutcome::NeedsIngest {
        return Err(anyhow!("nothing to export, run sync first"));
    }
    let writer = std::fs::File::create(&file)
        .with_context(|| format!("create {}", file.display()))?;
    exchange::export_from(&store, writer).context("export")?;
    info!(rows = store.rows().len(), "export complete");
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = tokio::fs::read_to_string(&opts.config)
        .await
        .with_context(|| "read config")?;
    let config: Config = serde_yaml::from_str(&config)
        .with_context(|| format!("parse config from {}", opts.config.display()))?;
    config.validate().map_err(|msg| anyhow!("{msg}"))?;
    match opts.command {
        Command::Sync { force } => sync(config, force).await,
        Command::Import { file } => import(config, file).await,
        Command::Export { file } => export(config, file).await,
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
