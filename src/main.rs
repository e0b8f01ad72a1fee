use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay::config::Config;
use relay::instance::Instance;
use relay::rtsp_handler::RtspHandler;
use relay::{control, log, signal};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    log::set(&config.log_filter);

    if config.gpu {
        error!("GPU-accelerated encoding was requested with -gpu but is not implemented");
        std::process::exit(1);
    }

    if let Err(e) = probe_encoder(&config.encoder_path).await {
        error!("encoder probe failed: {}", e);
        std::process::exit(1);
    }

    let token = CancellationToken::new();
    let rtsp = Arc::new(RtspHandler::new(config.rtsp_port, config.udp, token.clone()));
    let instance = Instance::new(
        Arc::clone(&rtsp),
        config.encoder_path.clone(),
        config.rtsp_port,
        config.retry_after_seconds,
        token.clone(),
    );

    if let Err(e) = instance.start() {
        error!("failed to start instance: {}", e);
        std::process::exit(1);
    }
    info!(port = config.rtsp_port, "RTSP server started");

    let control_token = CancellationToken::new();
    let app = control::router(Arc::clone(&instance), control_token.clone());
    let http_addr = config.http_addr();
    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind control server on {}: {}", http_addr, e);
            std::process::exit(1);
        }
    };
    info!(addr = %http_addr, "control server started");

    let serve_token = control_token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await
    });

    tokio::select! {
        signal_name = signal::wait_for_stop_signal() => {
            info!(signal = signal_name, "received shutdown signal");
        }
        _ = control_token.cancelled() => {
            info!("control server cancelled itself, shutting down");
        }
    }

    control_token.cancel();
    let _ = server.await;
    let _ = instance.stop().await;

    info!("shutdown complete");
}

/// Confirms the configured encoder binary runs at all before the instance
/// is allowed to start; a missing or broken binary should fail fast rather
/// than surface as a per-unit spawn error later.
async fn probe_encoder(path: &std::path::Path) -> anyhow::Result<()> {
    let probe = Command::new(path).arg("-version").output();
    match tokio::time::timeout(Duration::from_secs(5), probe).await {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(anyhow::anyhow!(
            "encoder -version exited with {}",
            output.status
        )),
        Ok(Err(e)) => Err(anyhow::anyhow!("failed to run encoder probe: {e}")),
        Err(_) => Err(anyhow::anyhow!("encoder probe timed out after 5s")),
    }
}
