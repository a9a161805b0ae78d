use std::sync::Arc;

use anyhow::Context;
use reelcast_scanner::MediaRoot;
use reelcast_server::config::AppConfig;
use reelcast_server::state::AppState;
use reelcast_transcoder::launcher::StreamLauncher;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if config.uses_default_secret() {
        warn!("SECRET_KEY is not set; session cookies use the built-in default key");
    }

    let media_root = MediaRoot::open(&config.movies_dir).with_context(|| {
        format!("media directory {} is not usable", config.movies_dir.display())
    })?;
    info!(root = %media_root.path().display(), "serving media root");

    std::fs::create_dir_all(&config.stream.output_dir).with_context(|| {
        format!(
            "failed to create stream directory {}",
            config.stream.output_dir.display()
        )
    })?;
    info!(
        dir = %config.stream.output_dir.display(),
        ffmpeg = %config.stream.ffmpeg_path.display(),
        "stream output ready"
    );

    let launcher = Arc::new(StreamLauncher::new(config.stream.clone(), media_root));

    // Log job transitions as they happen.
    {
        let mut transitions = launcher.subscribe();
        tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(t) => info!(job_id = %t.job_id, state = %t.state, "stream job transition"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "transition log lagged")
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    let app_state = AppState {
        launcher: launcher.clone(),
        session_secret: config.secret_key.clone(),
    };
    let app = reelcast_server::routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    launcher.shutdown().await;
    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping stream");
}
