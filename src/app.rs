use crate::config::Config;
use crate::detection_backend::{DetectionBackend, RemoteDetectionBackend};
use crate::server::HttpServer;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let backend: Arc<dyn DetectionBackend> =
        match RemoteDetectionBackend::new(&config.detection_api) {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                tracing::error!("Failed to initialize detection API client: {:?}", e);
                return Err(Box::new(e));
            }
        };

    tracing::info!(
        "Relaying detections to {} (model {})",
        config.detection_api.base_url,
        config.detection_api.model_id
    );

    let server = HttpServer::new(backend, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
