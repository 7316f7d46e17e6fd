use crate::{
    config::Config, detection_backend::DetectionBackend, routes::api_routes, telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

#[derive(Clone)]
pub struct SharedState {
    pub backend: Arc<dyn DetectionBackend>,
    pub upload_timeout: Duration,
    pub frame_timeout: Duration,
    pub metrics: Arc<Metrics>,
}

/// Builds the full router: routes, state, body limit, CORS and HTTP metrics.
pub fn build_router(
    backend: Arc<dyn DetectionBackend>,
    metrics: Arc<Metrics>,
    config: &Config,
) -> anyhow::Result<Router> {
    let app_state = SharedState {
        backend,
        upload_timeout: config.detection_api.get_upload_timeout(),
        frame_timeout: config.detection_api.get_frame_timeout(),
        metrics,
    };

    let origins = config
        .cors
        .get_origins()
        .map_err(anyhow::Error::msg)?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    let router = Router::new()
        .merge(api_routes())
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(cors)
        .layer(metrics_layer);

    Ok(router)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(
        backend: Arc<dyn DetectionBackend>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let metrics = Arc::new(Metrics::new()?);
        let router = build_router(backend, metrics, config)?;

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
