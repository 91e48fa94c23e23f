use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::queue::enqueue_request;
use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::models::driver::Driver;
use crate::models::request::{PickupRequest, RequestStatus};
use crate::state::AppState;

/// Actor identity stamped on transitions made by automated matching, where no
/// authenticated caller exists.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

/// Picks the next candidate driver for a pending request. Drivers that
/// already rejected this request are excluded by the caller.
pub trait MatchingPolicy: Send + Sync {
    fn candidate(&self, request: &PickupRequest, excluded: &[Uuid]) -> Option<Uuid>;
}

/// Default policy over the in-process roster: any available driver that has
/// not rejected the request yet. Geographic or load-aware policies plug in
/// behind the same trait.
pub struct RosterPolicy {
    drivers: Arc<DashMap<Uuid, Driver>>,
}

impl RosterPolicy {
    pub fn new(drivers: Arc<DashMap<Uuid, Driver>>) -> Self {
        Self { drivers }
    }
}

impl MatchingPolicy for RosterPolicy {
    fn candidate(&self, _request: &PickupRequest, excluded: &[Uuid]) -> Option<Uuid> {
        self.drivers
            .iter()
            .find(|entry| entry.available && !excluded.contains(&entry.id))
            .map(|entry| entry.id)
    }
}

/// Consumes newly created and rejection-released requests and asks the
/// coordinator to bind each one to a candidate driver. Requests with no
/// eligible driver are requeued after a short backoff.
pub async fn run_match_loop(state: Arc<AppState>, mut request_rx: mpsc::Receiver<Uuid>) {
    info!("match loop started");

    while let Some(request_id) = request_rx.recv().await {
        state.metrics.requests_in_queue.dec();

        let start = Instant::now();
        match process_request(&state, request_id).await {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .match_latency_seconds
                    .with_label_values(&["success"])
                    .observe(elapsed);
                state
                    .metrics
                    .dispatch_attempts_total
                    .with_label_values(&["success"])
                    .inc();
            }
            Err(err) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .match_latency_seconds
                    .with_label_values(&["error"])
                    .observe(elapsed);
                state
                    .metrics
                    .dispatch_attempts_total
                    .with_label_values(&["error"])
                    .inc();
                error!(request_id = %request_id, error = %err, "failed to match request");
            }
        }
    }

    warn!("match loop stopped: queue channel closed");
}

async fn process_request(state: &AppState, request_id: Uuid) -> Result<(), AppError> {
    let request = state
        .store
        .load_request(request_id)
        .ok_or(AppError::UnknownEntity {
            kind: "request",
            id: request_id.to_string(),
        })?;

    if request.status != RequestStatus::Pending {
        info!(request_id = %request_id, status = ?request.status, "request no longer pending; skipping");
        return Ok(());
    }

    let excluded: Vec<Uuid> = state
        .store
        .assignments_for(request_id)
        .iter()
        .filter(|a| a.status == AssignmentStatus::Rejected)
        .map(|a| a.driver_id)
        .collect();

    let Some(driver_id) = state.policy.candidate(&request, &excluded) else {
        warn!(request_id = %request_id, "no eligible drivers; re-queueing request");
        sleep(Duration::from_millis(250)).await;
        enqueue_request(&state.match_tx, &state.metrics, request_id).await?;
        return Ok(());
    };

    match state
        .coordinator
        .create_assignment(request_id, driver_id, SYSTEM_ACTOR)
        .await
    {
        Ok(outcome) => {
            info!(
                request_id = %request_id,
                driver_id = %driver_id,
                assignment_id = %outcome.assignment.id,
                "request matched"
            );
            Ok(())
        }
        // Someone dispatched the request manually in the meantime.
        Err(AppError::AlreadyAssigned(_)) | Err(AppError::StaleState { .. }) => {
            info!(request_id = %request_id, "request assigned elsewhere; skipping");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
