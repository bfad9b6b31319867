//! Collector entry point.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use classifier::{Classifier, ClassifierRules};
use collector::{CollectorError, Config, Mode, Result, oneshot};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use usage_store::{SqliteUsageStore, UsageStore};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_classifier(rules: Option<&Path>) -> Result<Classifier> {
    let rules = match rules {
        Some(path) => ClassifierRules::from_toml_file(path)?,
        None => ClassifierRules::default(),
    };
    Ok(Classifier::new(rules))
}

async fn run_server(config: &Config, classifier: Classifier) -> Result<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| CollectorError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let store = Arc::new(SqliteUsageStore::open(&config.db).await?);

    tracing::info!(%addr, db = %config.db.display(), "server started");

    collector::serve(
        listener,
        Arc::clone(&store),
        Arc::new(classifier),
        shutdown_signal(),
        config.drain_timeout(),
    )
    .await;

    let events = store.event_count().await?;
    tracing::info!(events, "server stopped");
    store.close().await;

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let classifier = load_classifier(config.rules.as_deref())?;

    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }

    match config.mode() {
        Mode::Serve => run_server(&config, classifier).await,
        Mode::Import(source) => {
            let report = oneshot::import_file(&source, &config.db, &classifier).await?;
            tracing::info!(
                imported = report.imported,
                skipped = report.skipped,
                "import done"
            );
            Ok(())
        }
        Mode::Migrate(source) => {
            let report = oneshot::migrate_store(&source, &config.db, &classifier).await?;
            tracing::info!(replayed = report.replayed, "migration done");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(config.log_json);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "collector failed");
            eprintln!("collector: {err}");
            ExitCode::FAILURE
        }
    }
}
