use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sbadmin::clash;
use sbadmin::config::AppConfig;
use sbadmin::service::ServiceController;
use sbadmin::store::ConfigStore;
use sbadmin::watcher::ConfigWatcher;
use sbadmin::web::{self, AppState};

/// Web admin for a sing-box instance
#[derive(Parser, Debug)]
#[command(name = "sbadmin", version, about)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Path to the sing-box configuration file
    #[arg(long, default_value = "/etc/sing-box/config.json")]
    config: PathBuf,

    /// systemd unit to control
    #[arg(long, default_value = "sing-box")]
    service: String,

    /// Clash API URL, overriding the saved setting
    #[arg(long)]
    api_url: Option<String>,

    /// Clash API secret
    #[arg(long)]
    secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = AppConfig::load().unwrap_or_else(|e| {
        warn!("failed to load settings, starting with defaults: {e}");
        AppConfig::default()
    });
    settings.merge_cli(cli.api_url.clone(), cli.secret.clone());

    let store = ConfigStore::new(&cli.config)
        .with_context(|| format!("failed to open config store at {}", cli.config.display()))?;
    if let Err(e) = store.create_backup("Initial backup", "Automatic backup at startup") {
        warn!("startup backup failed: {e}");
    }

    // Saved or CLI-provided endpoint first, then probe common local ports.
    let upstream_url = match settings.api_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Some(clash::format_api_url(url)),
        _ => clash::auto_detect().await,
    };
    if let Some(url) = &upstream_url {
        settings.api_url = Some(url.clone());
        if let Err(e) = settings.save() {
            warn!("failed to persist settings: {e}");
        }
    }

    let service = ServiceController::new(&cli.service);
    let secret = settings.secret.clone();
    let state = Arc::new(AppState::new(store, service, settings));

    match upstream_url {
        Some(url) => {
            info!("upstream Clash API: {url}");
            state.set_upstream(url, secret).await;
        }
        None => warn!("no upstream Clash API found; proxy and connection pages are unavailable"),
    }

    let watcher = match ConfigWatcher::spawn(&cli.config, || {
        info!("configuration changed on disk")
    }) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("file watcher unavailable: {e}");
            None
        }
    };

    let app = web::router(state);
    let listener = TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    info!("listening on http://{}", cli.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(watcher) = watcher {
        watcher.stop();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down");
}
