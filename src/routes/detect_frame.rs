use super::run_detection;
use crate::{
    detection::{FrameDetectionResponse, FrameRequest},
    error::{FailurePolicy, RelayError},
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/detect_frame";
const POLICY: FailurePolicy = FailurePolicy::InBand;

/// Inline base64 frame, polled by the live camera view. Detection failures
/// come back in the body; only an empty image is an HTTP error.
#[instrument(skip(state, payload))]
pub async fn detect_frame(
    State(state): State<SharedState>,
    payload: Result<Json<FrameRequest>, JsonRejection>,
) -> Result<Json<FrameDetectionResponse>, RelayError> {
    state.metrics.record_request(ROUTE);
    let started = Instant::now();

    let result = async {
        let Json(request) = payload.map_err(|e| RelayError::Malformed(e.body_text()))?;
        let image_base64 = request.base64_payload();
        if image_base64.is_empty() {
            return Err(RelayError::InvalidInput("No image data provided".into()));
        }
        run_detection(
            &state,
            ROUTE,
            image_base64.to_string(),
            &request.parameters,
            state.frame_timeout,
        )
        .await
    }
    .await;

    match result {
        Ok(predictions) => {
            let processing_time = started.elapsed().as_secs_f64();
            tracing::debug!(
                "Frame detection found {} objects in {:.3}s",
                predictions.len(),
                processing_time
            );
            Ok(Json(FrameDetectionResponse::success(
                predictions,
                processing_time,
            )))
        }
        Err(e) if POLICY.surfaces(&e) => {
            tracing::warn!("Rejected frame: {}", e);
            Err(e)
        }
        Err(e) => {
            tracing::error!("Frame detection error: {}", e);
            Ok(Json(FrameDetectionResponse::failure(e.to_string())))
        }
    }
}
