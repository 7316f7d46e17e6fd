use serde::{Deserialize, Serialize};

/// Knobs a client can send along with an image. Only the confidence and
/// overlap thresholds reach the detection API; the display fields are kept
/// for the frontend and never read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_threshold")]
    pub overlap_threshold: f64,
    #[serde(default = "default_opacity_threshold")]
    pub opacity_threshold: f64,
    #[serde(default = "default_label_display_mode")]
    pub label_display_mode: String,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_opacity_threshold() -> f64 {
    0.75
}

fn default_label_display_mode() -> String {
    "Draw Confidence".to_string()
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            confidence_threshold: default_threshold(),
            overlap_threshold: default_threshold(),
            opacity_threshold: default_opacity_threshold(),
            label_display_mode: default_label_display_mode(),
        }
    }
}

/// A single box as the detection API reports it. The same shape is
/// returned verbatim by `/detect_frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Body returned by the detection API on success.
#[derive(Debug, Default, Deserialize)]
pub struct PredictionBatch {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Prediction> for Detection {
    fn from(prediction: Prediction) -> Self {
        Self {
            class_name: prediction.class,
            confidence: prediction.confidence,
            x: prediction.x,
            y: prediction.y,
            width: prediction.width,
            height: prediction.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<Detection>,
    pub total_detections: usize,
    pub processing_time: f64,
}

impl DetectionResponse {
    pub fn new(predictions: Vec<Prediction>, processing_time: f64) -> Self {
        let detections: Vec<Detection> = predictions.into_iter().map(Detection::from).collect();
        Self {
            success: true,
            total_detections: detections.len(),
            detections,
            processing_time,
        }
    }
}

/// JSON body of `/detect_frame`.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(flatten)]
    pub parameters: DetectionParameters,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl FrameRequest {
    pub fn base64_payload(&self) -> &str {
        extract_base64_payload(&self.image)
    }
}

/// Strips a `data:<mime>;base64,` prefix. Anything after the first comma
/// is the payload; a string without a comma is taken as raw base64.
pub fn extract_base64_payload(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, payload)) => payload,
        None => image,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameDetectionResponse {
    Success {
        success: bool,
        predictions: Vec<Prediction>,
        processing_time: f64,
    },
    Failure {
        success: bool,
        predictions: Vec<Prediction>,
        error: String,
    },
}

impl FrameDetectionResponse {
    pub fn success(predictions: Vec<Prediction>, processing_time: f64) -> Self {
        Self::Success {
            success: true,
            predictions,
            processing_time,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            predictions: Vec::new(),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn car(x: f64) -> Prediction {
        Prediction {
            class: "car".into(),
            confidence: 0.9,
            x,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        }
    }

    #[test]
    fn test_extract_payload_from_data_url() {
        assert_eq!(extract_base64_payload("data:image/png;base64,QUJD"), "QUJD");
    }

    #[test]
    fn test_extract_payload_raw_base64() {
        assert_eq!(extract_base64_payload("QUJD"), "QUJD");
        assert_eq!(extract_base64_payload(""), "");
    }

    #[test]
    fn test_extract_payload_splits_on_first_comma_only() {
        assert_eq!(extract_base64_payload("data:,a,b"), "a,b");
        assert_eq!(extract_base64_payload("data:image/jpeg;base64,"), "");
    }

    #[test]
    fn test_frame_request_defaults() {
        let request: FrameRequest = serde_json::from_value(json!({})).unwrap();

        assert_eq!(request.image, "");
        assert_eq!(request.parameters, DetectionParameters::default());
    }

    #[test]
    fn test_frame_request_null_image_is_empty() {
        let request: FrameRequest = serde_json::from_value(json!({"image": null})).unwrap();

        assert_eq!(request.base64_payload(), "");
    }

    #[test]
    fn test_frame_request_rejects_non_string_image() {
        let result = serde_json::from_value::<FrameRequest>(json!({"image": 42}));

        assert!(result.is_err());
    }

    #[test]
    fn test_frame_request_reads_thresholds() {
        let request: FrameRequest = serde_json::from_value(json!({
            "image": "data:image/jpeg;base64,AAAA",
            "confidence_threshold": 0.3,
            "overlap_threshold": 0.7
        }))
        .unwrap();

        assert_eq!(request.base64_payload(), "AAAA");
        assert_eq!(request.parameters.confidence_threshold, 0.3);
        assert_eq!(request.parameters.overlap_threshold, 0.7);
        assert_eq!(request.parameters.label_display_mode, "Draw Confidence");
    }

    #[test]
    fn test_batch_ignores_extra_fields_and_missing_predictions() {
        let batch: PredictionBatch = serde_json::from_value(json!({
            "time": 0.1,
            "image": {"width": 640, "height": 480}
        }))
        .unwrap();
        assert!(batch.predictions.is_empty());

        let batch: PredictionBatch = serde_json::from_value(json!({
            "predictions": [{
                "class": "truck", "class_id": 2, "detection_id": "abc",
                "confidence": 0.5, "x": 1, "y": 2, "width": 3, "height": 4
            }]
        }))
        .unwrap();
        assert_eq!(batch.predictions[0].class, "truck");
        assert_eq!(batch.predictions[0].x, 1.0);
    }

    #[test]
    fn test_batch_with_incomplete_prediction_fails() {
        let result = serde_json::from_value::<PredictionBatch>(json!({
            "predictions": [{"class": "car", "confidence": 0.5}]
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_detection_response_keeps_order_and_count() {
        let response = DetectionResponse::new(vec![car(3.0), car(1.0), car(2.0)], 0.25);

        assert!(response.success);
        assert_eq!(response.total_detections, 3);
        let xs: Vec<f64> = response.detections.iter().map(|d| d.x).collect();
        assert_eq!(xs, vec![3.0, 1.0, 2.0]);
        assert_eq!(response.detections[0].class_name, "car");
    }

    #[test]
    fn test_frame_response_wire_shapes() {
        let ok = serde_json::to_value(FrameDetectionResponse::success(vec![car(1.0)], 0.5)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["predictions"][0]["class"], "car");
        assert_eq!(ok["processing_time"], 0.5);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(FrameDetectionResponse::failure("API error: 500")).unwrap();
        assert_eq!(
            failed,
            json!({"success": false, "predictions": [], "error": "API error: 500"})
        );
    }
}
