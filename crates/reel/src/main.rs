//! reel: firehose ingestion service.
//!
//! Usage:
//!   reel                  stream live events (default)
//!   reel backfill <did>   list an author's history unless already stored
//!   reel refresh <did>    drop an author's stored ratings and list them again

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reel::{
    BackfillReconciler, IngestConfig, Ingestor, ReconnectSupervisor, SqliteStore, Store,
    StreamConsumer, TmdbClient, XrpcClient,
};
use tracing_subscriber::EnvFilter;

enum Command {
    Run,
    Backfill(String),
    Refresh(String),
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some(cmd @ ("backfill" | "refresh")) => {
            let did = match args.get(1) {
                Some(did) if did.starts_with("did:") => did.clone(),
                _ => bail!("usage: reel {} <did>", cmd),
            };
            Ok(if cmd == "backfill" {
                Command::Backfill(did)
            } else {
                Command::Refresh(did)
            })
        }
        Some(other) => bail!("unknown command {:?}; expected run, backfill or refresh", other),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let command = parse_args()?;
    let config = IngestConfig::from_env().context("load configuration")?;

    let sqlite = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("open database {}", config.database_url))?;
    let store: Arc<dyn Store> = Arc::new(sqlite);
    let http = reqwest::Client::builder()
        .user_agent(concat!("reel/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build HTTP client")?;
    let repo = Arc::new(XrpcClient::new(http.clone(), &config.pds_url, &config.appview_url));
    let enrich = Arc::new(TmdbClient::new(http, &config.tmdb_url, &config.tmdb_api_key));
    let backfill = BackfillReconciler::new(
        Arc::clone(&store),
        repo.clone(),
        enrich.clone(),
        config.collections.rating.clone(),
        config.backfill.clone(),
    );

    match command {
        Command::Backfill(did) => {
            let summary = backfill.ensure_author_backfilled(&did).await;
            match summary {
                Some(s) => println!("{:?}", s),
                None => println!("{} already has stored ratings", did),
            }
        }
        Command::Refresh(did) => {
            let summary = backfill.refresh_author(&did).await?;
            println!("{:?}", summary);
        }
        Command::Run => {
            let ingestor = Arc::new(Ingestor::new(
                Arc::clone(&store),
                repo,
                enrich,
                backfill,
                config.collections.clone(),
            ));
            let consumer = StreamConsumer::new(&config.jetstream_url, config.collections.clone());
            let supervisor =
                ReconnectSupervisor::new(consumer, ingestor, store, config.reconnection.clone());
            tokio::select! {
                res = supervisor.run() => res.context("ingestion stopped")?,
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
            }
        }
    }
    Ok(())
}
