use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::coordinator::{AssignmentOutcome, DriverResponse};
use crate::error::AppError;
use crate::identity::Actor;
use crate::models::assignment::{AssignmentStatus, DriverAssignment};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", post(create_assignment).get(list_assignments))
        .route("/assignments/:id/response", post(record_response))
        .route("/assignments/:id/status", post(transition_assignment))
}

/// Manual dispatch hook: an operator (or an external matching service) binds
/// a specific driver to a pending request.
#[derive(Deserialize)]
pub struct CreateAssignmentBody {
    pub request_id: Uuid,
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct ResponseBody {
    pub action: DriverResponse,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub target: AssignmentStatus,
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Json(payload): Json<CreateAssignmentBody>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = state
        .coordinator
        .create_assignment(payload.request_id, payload.driver_id, actor)
        .await?;

    Ok(Json(outcome))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<DriverAssignment>> {
    Json(state.store.list_assignments())
}

async fn record_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<ResponseBody>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = state
        .coordinator
        .record_driver_response(id, payload.action, actor)
        .await?;

    Ok(Json(outcome))
}

async fn transition_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(payload): Json<TransitionBody>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = state
        .coordinator
        .transition_assignment(id, payload.target, actor)
        .await?;

    Ok(Json(outcome))
}
