use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::engine::locks::LockTable;
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DriverAssignment};
use crate::models::event::NotificationEvent;
use crate::models::request::{PickupRequest, RequestStatus};
use crate::notify::{EmittedEvent, Notifier};
use crate::observability::metrics::Metrics;
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum DriverResponse {
    Accept,
    Reject,
}

/// New committed request state plus what was emitted on the way out.
#[derive(Debug, Serialize)]
pub struct RequestOutcome {
    pub request: PickupRequest,
    pub events: Vec<EmittedEvent>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentOutcome {
    pub request: PickupRequest,
    pub assignment: DriverAssignment,
    pub events: Vec<EmittedEvent>,
}

/// Serializes every status-mutating operation per request (assignments lock
/// their owning request) and persists through the optimistic store contract.
/// Events are fanned out before the guard is released: the transport only
/// enqueues to in-memory per-connection channels, so per-connection delivery
/// order follows commit order even when operations on one request race.
/// Socket writes never run under the lock, and a failed delivery never
/// unwinds a committed transition.
pub struct DispatchCoordinator {
    store: Arc<dyn EntityStore>,
    locks: LockTable,
    notifier: Arc<Notifier>,
    requeue_tx: mpsc::Sender<Uuid>,
    metrics: Metrics,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifier: Arc<Notifier>,
        requeue_tx: mpsc::Sender<Uuid>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            notifier,
            requeue_tx,
            metrics,
        }
    }

    fn load_request(&self, id: Uuid) -> Result<PickupRequest, AppError> {
        self.store.load_request(id).ok_or(AppError::UnknownEntity {
            kind: "request",
            id: id.to_string(),
        })
    }

    fn load_assignment(&self, id: Uuid) -> Result<DriverAssignment, AppError> {
        self.store.load_assignment(id).ok_or(AppError::UnknownEntity {
            kind: "assignment",
            id: id.to_string(),
        })
    }

    /// Bind a Pending request to a candidate driver. Losing a race for the
    /// same request surfaces as `AlreadyAssigned`, never as a second live
    /// assignment.
    pub async fn create_assignment(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
        actor: Uuid,
    ) -> Result<AssignmentOutcome, AppError> {
        let _guard = self.locks.acquire(request_id).await;
        let mut request = self.load_request(request_id)?;

        if request.status == RequestStatus::Assigned
            || self.store.active_assignment_for(request_id).is_some()
        {
            return Err(AppError::AlreadyAssigned(request_id));
        }

        let prior = request.status;
        let event = lifecycle::transition_request(&mut request, RequestStatus::Assigned, actor)?;
        let assignment = DriverAssignment::new(request_id, driver_id);

        self.store.save_request(&request, prior)?;
        self.store.insert_assignment(assignment.clone());

        info!(
            request_id = %request_id,
            driver_id = %driver_id,
            assignment_id = %assignment.id,
            "assignment created"
        );

        let events = vec![
            self.notifier
                .emit(&NotificationEvent::request_status(&request, &event))
                .await,
            self.notifier
                .emit(&NotificationEvent::assignment_offered(&assignment, &request))
                .await,
        ];

        Ok(AssignmentOutcome {
            request,
            assignment,
            events,
        })
    }

    pub async fn record_driver_response(
        &self,
        assignment_id: Uuid,
        response: DriverResponse,
        actor: Uuid,
    ) -> Result<AssignmentOutcome, AppError> {
        // Only the driver the offer was made to may answer it.
        let assignment = self.load_assignment(assignment_id)?;
        if actor != assignment.driver_id {
            return Err(AppError::Forbidden(format!(
                "assignment {assignment_id} belongs to another driver"
            )));
        }

        let target = match response {
            DriverResponse::Accept => AssignmentStatus::Accepted,
            DriverResponse::Reject => AssignmentStatus::Rejected,
        };
        self.transition_assignment(assignment_id, target, actor).await
    }

    /// Drive an assignment along its table. A rejection additionally releases
    /// the owning request back to Pending and hands it to the matcher.
    pub async fn transition_assignment(
        &self,
        assignment_id: Uuid,
        target: AssignmentStatus,
        actor: Uuid,
    ) -> Result<AssignmentOutcome, AppError> {
        // The request id is stable for the assignment's lifetime, so probing
        // before taking the lock is safe.
        let probe = self.load_assignment(assignment_id)?;
        let _guard = self.locks.acquire(probe.request_id).await;

        let mut assignment = self.load_assignment(assignment_id)?;
        let mut request = self.load_request(assignment.request_id)?;

        // A terminal request freezes its assignments: nothing may advance an
        // assignment whose pickup was cancelled or already settled.
        if request.status.is_terminal() {
            return Err(AppError::InvalidTransition {
                entity: "assignment",
                from: format!("{:?}", assignment.status),
                to: format!("{target:?}"),
            });
        }

        let prior_assignment = assignment.status;
        let event = lifecycle::transition_assignment(&mut assignment, target, actor)?;
        self.store.save_assignment(&assignment, prior_assignment)?;

        let released = if target == AssignmentStatus::Rejected
            && request.status == RequestStatus::Assigned
        {
            let prior_request = request.status;
            lifecycle::transition_request(&mut request, RequestStatus::Pending, actor)?;
            self.store.save_request(&request, prior_request)?;
            true
        } else {
            false
        };

        info!(
            assignment_id = %assignment_id,
            request_id = %request.id,
            status = ?target,
            "assignment transitioned"
        );

        let mut events = Vec::new();
        if released {
            events.push(
                self.notifier
                    .emit(&NotificationEvent::reassignment_pending(&request, &assignment))
                    .await,
            );
            self.requeue(request.id);
        } else {
            events.push(
                self.notifier
                    .emit(&NotificationEvent::assignment_status(&assignment, &request, &event))
                    .await,
            );
        }

        Ok(AssignmentOutcome {
            request,
            assignment,
            events,
        })
    }

    /// Drive a request along its table. Pending and Assigned are not valid
    /// external targets; those edges belong to dispatch itself.
    pub async fn transition_request(
        &self,
        request_id: Uuid,
        target: RequestStatus,
        actor: Uuid,
    ) -> Result<RequestOutcome, AppError> {
        let _guard = self.locks.acquire(request_id).await;
        let mut request = self.load_request(request_id)?;

        if matches!(target, RequestStatus::Pending | RequestStatus::Assigned) {
            return Err(AppError::InvalidTransition {
                entity: "request",
                from: format!("{:?}", request.status),
                to: format!("{target:?}"),
            });
        }

        let prior = request.status;
        let event = lifecycle::transition_request(&mut request, target, actor)?;
        self.store.save_request(&request, prior)?;

        let cancelled_assignment = if target == RequestStatus::Cancelled {
            self.store.active_assignment_for(request_id)
        } else {
            None
        };

        info!(request_id = %request_id, status = ?target, "request transitioned");

        let mut events = vec![
            self.notifier
                .emit(&NotificationEvent::request_status(&request, &event))
                .await,
        ];
        if let Some(assignment) = cancelled_assignment {
            events.push(
                self.notifier
                    .emit(&NotificationEvent::request_cancelled_for_driver(&request, &assignment))
                    .await,
            );
        }

        Ok(RequestOutcome { request, events })
    }

    /// Record the weight actually collected for one material line. Legal only
    /// while the request is InProgress or PickedUp.
    pub async fn record_actual_weight(
        &self,
        request_id: Uuid,
        line_index: usize,
        actual_weight_kg: f64,
        actor: Uuid,
    ) -> Result<RequestOutcome, AppError> {
        if !actual_weight_kg.is_finite() || actual_weight_kg <= 0.0 {
            return Err(AppError::BadRequest(
                "actual weight must be a positive number".to_string(),
            ));
        }

        let _guard = self.locks.acquire(request_id).await;
        let mut request = self.load_request(request_id)?;

        lifecycle::ensure_weight_window(request.status)?;

        let line = request
            .materials
            .get_mut(line_index)
            .ok_or(AppError::UnknownEntity {
                kind: "material line",
                id: format!("{request_id}[{line_index}]"),
            })?;
        line.actual_weight_kg = Some(actual_weight_kg);
        let line_snapshot = line.clone();
        request.updated_at = chrono::Utc::now();

        let prior = request.status;
        self.store.save_request(&request, prior)?;

        info!(
            request_id = %request_id,
            line_index,
            actual_weight_kg,
            actor = %actor,
            "actual weight recorded"
        );

        let events = vec![
            self.notifier
                .emit(&NotificationEvent::weight_recorded(&request, line_index, &line_snapshot))
                .await,
        ];

        Ok(RequestOutcome { request, events })
    }

    fn requeue(&self, request_id: Uuid) {
        match self.requeue_tx.try_send(request_id) {
            Ok(()) => {
                self.metrics.requests_in_queue.inc();
            }
            Err(err) => {
                // Dropped here means the request stays Pending until someone
                // dispatches it manually; the state itself is already safe.
                warn!(request_id = %request_id, error = %err, "failed to requeue request");
            }
        }
    }
}
