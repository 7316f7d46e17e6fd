use crate::{
    config::DetectionApiConfig,
    detection::{DetectionParameters, Prediction, PredictionBatch},
};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DetectionBackendError {
    #[error("request to detection API failed: {0}")]
    Request(reqwest::Error),
    #[error("API error: {}", .status.as_u16())]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("invalid detection API response: {0}")]
    Decode(#[from] serde_json::Error),
}

// The request URL carries the API key, so it never makes it into an error.
impl From<reqwest::Error> for DetectionBackendError {
    fn from(err: reqwest::Error) -> Self {
        DetectionBackendError::Request(err.without_url())
    }
}

/// Anything that can turn a base64 image into predictions.
#[async_trait]
pub trait DetectionBackend: Send + Sync + 'static {
    async fn detect(
        &self,
        image_base64: String,
        parameters: &DetectionParameters,
        timeout: Duration,
    ) -> Result<Vec<Prediction>, DetectionBackendError>;

    fn model_id(&self) -> &str;
}

/// Client for the hosted detection model.
pub struct RemoteDetectionBackend {
    client: Client,
    endpoint: String,
    model_id: String,
    api_key: String,
}

impl RemoteDetectionBackend {
    pub fn new(config: &DetectionApiConfig) -> Result<Self, DetectionBackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.get_endpoint(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl DetectionBackend for RemoteDetectionBackend {
    #[instrument(skip(self, image_base64), fields(endpoint = %self.endpoint, payload_len = image_base64.len()))]
    async fn detect(
        &self,
        image_base64: String,
        parameters: &DetectionParameters,
        timeout: Duration,
    ) -> Result<Vec<Prediction>, DetectionBackendError> {
        let query = [
            ("api_key", self.api_key.clone()),
            ("confidence", parameters.confidence_threshold.to_string()),
            ("overlap", parameters.overlap_threshold.to_string()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .query(&query)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(image_base64)
            .timeout(timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let batch: PredictionBatch = serde_json::from_slice(&body)?;
                tracing::debug!("Detection API returned {} predictions", batch.predictions.len());
                Ok(batch.predictions)
            }
            status => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::debug!("Failed to read detection API error body: {}", e.without_url());
                        String::new()
                    }
                };
                tracing::warn!("Detection API error: {} - {}", status, body);
                Err(DetectionBackendError::UnexpectedStatus { status, body })
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> DetectionApiConfig {
        DetectionApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            model_id: "test-model/1".into(),
            api_key: "very-secret-key".into(),
            upload_timeout_secs: 30,
            frame_timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let backend = RemoteDetectionBackend::new(&unreachable_config()).unwrap();

        let err = backend
            .detect(
                "QUJD".into(),
                &DetectionParameters::default(),
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionBackendError::Request(_)));
        let message = err.to_string();
        assert!(!message.contains("very-secret-key"), "leaked: {message}");
        assert!(!message.contains("api_key"), "leaked: {message}");
    }
}
