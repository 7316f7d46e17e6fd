use super::run_detection;
use crate::{
    detection::{DetectionParameters, DetectionResponse},
    error::{FailurePolicy, RelayError},
    server::SharedState,
};
use axum::{
    extract::{rejection::QueryRejection, Multipart, Query, State},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/detect";
const FILE_FIELD: &str = "file";
const POLICY: FailurePolicy = FailurePolicy::Surface;

/// Multipart upload. Every failure is surfaced as an HTTP error.
#[instrument(skip(state, query, multipart))]
pub async fn detect(
    State(state): State<SharedState>,
    query: Result<Query<DetectionParameters>, QueryRejection>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, RelayError> {
    state.metrics.record_request(ROUTE);
    let started = Instant::now();

    let result = async {
        let Query(parameters) = query.map_err(|e| RelayError::Malformed(e.body_text()))?;
        let image_data = read_file_field(multipart).await?;
        let image_base64 = BASE64.encode(&image_data);
        run_detection(
            &state,
            ROUTE,
            image_base64,
            &parameters,
            state.upload_timeout,
        )
        .await
    }
    .await;

    match result {
        Ok(predictions) => {
            let processing_time = started.elapsed().as_secs_f64();
            tracing::info!(
                "Detected {} objects in {:.3}s",
                predictions.len(),
                processing_time
            );
            Ok(Json(DetectionResponse::new(predictions, processing_time)))
        }
        Err(e) if POLICY.surfaces(&e) => {
            tracing::error!("Detection error: {}", e);
            Err(e)
        }
        Err(e) => {
            tracing::error!("Detection error: {}", e);
            Err(RelayError::Internal(e.to_string()))
        }
    }
}

async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, RelayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Internal(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| RelayError::Internal(e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(RelayError::InvalidInput(format!(
        "Missing `{}` field in multipart form",
        FILE_FIELD
    )))
}
