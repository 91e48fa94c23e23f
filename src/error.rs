use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::request::RequestStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },

    #[error("invalid transition: {entity} {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("request {0} already has an active assignment")]
    AlreadyAssigned(Uuid),

    #[error("stale state: {entity} {id} was modified concurrently")]
    StaleState { entity: &'static str, id: Uuid },

    #[error("actual weight cannot be recorded while request is {0:?}")]
    PrematureWeightUpdate(RequestStatus),

    #[error("request is finalized ({0:?})")]
    RequestFinalized(RequestStatus),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnknownEntity { .. } => "unknown_entity",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::AlreadyAssigned(_) => "already_assigned",
            AppError::StaleState { .. } => "stale_state",
            AppError::PrematureWeightUpdate(_) => "premature_weight_update",
            AppError::RequestFinalized(_) => "request_finalized",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnknownEntity { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. }
            | AppError::AlreadyAssigned(_)
            | AppError::StaleState { .. } => StatusCode::CONFLICT,
            AppError::PrematureWeightUpdate(_) | AppError::RequestFinalized(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
