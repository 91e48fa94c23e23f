use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::coordinator::RequestOutcome;
use crate::engine::queue::enqueue_request;
use crate::error::AppError;
use crate::identity::Actor;
use crate::models::request::{MaterialLine, PickupRequest, RequestStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/status", post(transition_request))
        .route("/requests/:id/materials/:index/weight", post(record_weight))
}

#[derive(Deserialize)]
pub struct MaterialLineBody {
    pub material: String,
    pub estimated_weight_kg: f64,
    pub price_per_kg: f64,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub materials: Vec<MaterialLineBody>,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub target: RequestStatus,
}

#[derive(Deserialize)]
pub struct WeightBody {
    pub actual_weight_kg: f64,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Json(payload): Json<CreateRequestBody>,
) -> Result<Json<PickupRequest>, AppError> {
    if payload.materials.is_empty() {
        return Err(AppError::BadRequest(
            "at least one material line is required".to_string(),
        ));
    }

    let mut materials = Vec::with_capacity(payload.materials.len());
    for line in payload.materials {
        if line.material.trim().is_empty() {
            return Err(AppError::BadRequest("material cannot be empty".to_string()));
        }
        if !line.estimated_weight_kg.is_finite() || line.estimated_weight_kg <= 0.0 {
            return Err(AppError::BadRequest(
                "estimated weight must be a positive number".to_string(),
            ));
        }
        if !line.price_per_kg.is_finite() || line.price_per_kg < 0.0 {
            return Err(AppError::BadRequest(
                "price per kg cannot be negative".to_string(),
            ));
        }

        materials.push(MaterialLine {
            material: line.material,
            estimated_weight_kg: line.estimated_weight_kg,
            actual_weight_kg: None,
            price_per_kg: line.price_per_kg,
            notes: line.notes,
        });
    }

    let request = PickupRequest::new(actor, materials);
    state.store.insert_request(request.clone());
    enqueue_request(&state.match_tx, &state.metrics, request.id).await?;

    Ok(Json(request))
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Json<Vec<PickupRequest>> {
    Json(state.store.list_requests())
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PickupRequest>, AppError> {
    let request = state.store.load_request(id).ok_or(AppError::UnknownEntity {
        kind: "request",
        id: id.to_string(),
    })?;

    Ok(Json(request))
}

async fn transition_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<TransitionBody>,
) -> Result<Json<RequestOutcome>, AppError> {
    let outcome = state
        .coordinator
        .transition_request(id, payload.target, actor)
        .await?;

    Ok(Json(outcome))
}

async fn record_weight(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Actor(actor): Actor,
    Json(payload): Json<WeightBody>,
) -> Result<Json<RequestOutcome>, AppError> {
    let outcome = state
        .coordinator
        .record_actual_weight(id, index, payload.actual_weight_kg, actor)
        .await?;

    Ok(Json(outcome))
}
