//! ATS Monitor - headless dashboard client
//!
//! Connects to the measurement server, requests the run history and logs
//! every change to the connection, measurement and progress indicators.
//!
//! Usage: `ats-monitor [config.toml]`

use anyhow::Context;
use ats_dashboard::{
    config::{ClientConfig, LoggingConfig},
    store::MeasurementStore,
    transport::{TransportClient, WebSocketConnector},
    Command, Observable,
};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .context("log_file must name a file")?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter)))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Log every change of an observable indicator
fn log_changes<T>(name: &'static str, cell: &Observable<T>)
where
    T: Display + Send + Sync + 'static,
{
    let mut rx = cell.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            tracing::info!("{}: {}", name, *rx.borrow_and_update());
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load_or_default(config_path.as_deref());
    let _log_guard = init_logging(&config.logging)?;

    tracing::info!("Starting ATS monitor against {}", config.transport.url);

    let store = Arc::new(MeasurementStore::new(config.grid));
    log_changes("Connection", &store.connection_status);
    log_changes("Measurement", &store.measurement_status);
    log_changes("Writer", &store.writer_status);
    log_changes("Progress", &store.progress_status);

    let mut history = store.history.subscribe();
    tokio::spawn(async move {
        while history.changed().await.is_ok() {
            for entry in history.borrow_and_update().iter() {
                let when = entry
                    .started_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown time".to_string());
                tracing::info!(
                    "History: {} - {} devices x {} channels - {}",
                    when,
                    entry.device_count,
                    entry.channel_count,
                    entry.status
                );
            }
        }
    });

    let client = TransportClient::new(
        config.transport.clone(),
        store.clone(),
        WebSocketConnector::new(),
    );
    let handle = client.handle();
    let client_task = tokio::spawn(client.run());

    handle.connect()?;
    handle.send_command(&Command::measurement_history())?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down...");
    handle.shutdown()?;
    client_task.await?;

    tracing::info!(
        "{} of {} slots tested",
        store.tested_count(),
        store.grid().slot_count()
    );
    Ok(())
}
