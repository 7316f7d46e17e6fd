mod detect;
mod detect_frame;
mod health;
mod metrics;

use crate::{
    detection::{DetectionParameters, Prediction},
    error::RelayError,
    server::SharedState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::{Duration, Instant};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::healthcheck))
        .route("/detect", post(detect::detect))
        .route("/detect_frame", post(detect_frame::detect_frame))
        .route("/metrics", get(metrics::metrics_handler))
}

/// One call to the detection API, shared by both detection routes. Failure
/// surfacing is left to the caller's `FailurePolicy`.
pub(crate) async fn run_detection(
    state: &SharedState,
    route: &str,
    image_base64: String,
    parameters: &DetectionParameters,
    timeout: Duration,
) -> Result<Vec<Prediction>, RelayError> {
    let started = Instant::now();
    let result = state
        .backend
        .detect(image_base64, parameters, timeout)
        .await;
    state
        .metrics
        .record_upstream_duration(started.elapsed().as_millis() as u64, route);

    result.map_err(|e| {
        state.metrics.record_upstream_failure(route);
        RelayError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection_backend::{DetectionBackend, DetectionBackendError},
        telemetry::Metrics,
    };
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockBackend {
        seen: Mutex<Vec<(String, f64, f64, Duration)>>,
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl DetectionBackend for MockBackend {
        async fn detect(
            &self,
            image_base64: String,
            parameters: &DetectionParameters,
            timeout: Duration,
        ) -> Result<Vec<Prediction>, DetectionBackendError> {
            self.seen.lock().unwrap().push((
                image_base64,
                parameters.confidence_threshold,
                parameters.overlap_threshold,
                timeout,
            ));
            if let Some(code) = self.fail_with {
                return Err(DetectionBackendError::UnexpectedStatus {
                    status: StatusCode::from_u16(code).unwrap(),
                    body: String::new(),
                });
            }
            Ok(vec![Prediction {
                class: "car".into(),
                confidence: 0.8,
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            }])
        }

        fn model_id(&self) -> &str {
            "mock/1"
        }
    }

    fn state_with(backend: Arc<MockBackend>) -> SharedState {
        SharedState {
            backend,
            upload_timeout: Duration::from_secs(30),
            frame_timeout: Duration::from_secs(10),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_run_detection_passes_call_through() {
        let backend = Arc::new(MockBackend::default());
        let state = state_with(backend.clone());
        let parameters = DetectionParameters {
            confidence_threshold: 0.25,
            ..Default::default()
        };

        let predictions = run_detection(
            &state,
            "/detect",
            "QUJD".into(),
            &parameters,
            Duration::from_secs(7),
        )
        .await
        .unwrap();

        assert_eq!(predictions.len(), 1);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            ("QUJD".to_string(), 0.25, 0.5, Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn test_run_detection_wraps_backend_errors() {
        let backend = Arc::new(MockBackend {
            fail_with: Some(502),
            ..Default::default()
        });
        let state = state_with(backend);

        let err = run_detection(
            &state,
            "/detect_frame",
            "QUJD".into(),
            &DetectionParameters::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RelayError::Upstream(_)));
        assert_eq!(err.to_string(), "API error: 502");
    }
}
