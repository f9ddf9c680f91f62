//! wmlink - window manager control-plane service
//!
//! `wmlink` (or `wmlink serve`) hosts the reference window manager on its
//! socket. `wmlink demo` connects as a client, opens a window, and prints
//! what the service reports about it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wmlink::client::Session;
use wmlink::config::Config;
use wmlink::server::ServiceHost;
use wmlink::service::WindowManagerServer;
use wmlink_ipc::types::{WindowMode, WindowStateChangeReason, WindowType, INVALID_WINDOW_ID};
use wmlink_ipc::WindowProperty;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|arg| arg == "--config" || arg == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let command = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with('-') && Some(PathBuf::from(arg.as_str())) != config_path)
        .map(String::as_str)
        .unwrap_or("serve");

    let config = Config::load(config_path.as_deref())?;

    // Initialize logging
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| config.log.filter.clone())
        .unwrap_or_else(|| "wmlink=debug,info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match command {
        "serve" => serve(config).await,
        "demo" => {
            tokio::task::spawn_blocking(move || demo(&config))
                .await
                .context("Demo task panicked")?
        }
        other => Err(anyhow::anyhow!(
            "Unknown command {:?} (expected serve or demo)",
            other
        )),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting wmlink window manager service");

    let socket_path = config.socket_path();
    let server = Arc::new(WindowManagerServer::new(config.service.clone()));
    let host = ServiceHost::bind(server, &socket_path)?;

    // Setup signal handlers for graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle SIGTERM and SIGINT
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    let _ = tx.send(()).await;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    let _ = tx.send(()).await;
                }
            }
        });
    }

    tokio::select! {
        result = host.run() => {
            if let Err(e) = result {
                error!("Service error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, cleaning up...");
        }
    }

    Ok(())
}

fn demo(config: &Config) -> Result<()> {
    let session = Session::connect(config)?;

    let mut property = WindowProperty::new("wmlink-demo", WindowType::AppMainWindow);
    property.set_mode(WindowMode::Floating);
    property.request_rect = wmlink_ipc::types::Rect::new(200, 150, 800, 600);
    let window = session
        .create_window(property, INVALID_WINDOW_ID)
        .map_err(|e| anyhow::anyhow!("create window failed: {}", e))?;
    window
        .show(WindowStateChangeReason::Normal, false)
        .map_err(|e| anyhow::anyhow!("show window failed: {}", e))?;

    // Pushes arrive on the dispatcher thread.
    std::thread::sleep(Duration::from_millis(100));
    info!("Window {} laid out at {:?}", window.id(), window.rect());

    window
        .set_window_mode(WindowMode::SplitPrimary)
        .map_err(|e| anyhow::anyhow!("mode change failed: {}", e))?;
    std::thread::sleep(Duration::from_millis(100));
    info!("Window {} split at {:?}", window.id(), window.rect());

    let infos = session
        .manager()
        .get_accessibility_window_info()
        .map_err(|e| anyhow::anyhow!("query failed: {}", e))?;
    let infos: Vec<_> = infos.iter().map(|info| info.as_ref()).collect();
    println!("{}", serde_json::to_string_pretty(&infos)?);

    window
        .hide(WindowStateChangeReason::Normal, false)
        .map_err(|e| anyhow::anyhow!("hide window failed: {}", e))?;
    window
        .destroy()
        .map_err(|e| anyhow::anyhow!("destroy window failed: {}", e))?;
    Ok(())
}
