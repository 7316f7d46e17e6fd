use crate::server::SharedState;
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Message {
    message: String,
}

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    model: String,
}

pub async fn root() -> impl IntoResponse {
    Json(Message {
        message: "Vehicle Detection API is running".into(),
    })
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    Json(Status {
        status: "healthy".into(),
        model: state.backend.model_id().to_string(),
    })
}
