//! Status state machine for requests and assignments. Pure decisions: given
//! the current status and a target, either mutate in place and hand back the
//! single domain event for the edge, or refuse and leave the entity untouched.
//! Everything else (matching, pricing, persistence, fanout) lives elsewhere.

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DriverAssignment};
use crate::models::event::{DomainEvent, EntityKind};
use crate::models::request::{PickupRequest, RequestStatus, StatusChange};

/// Forward path Pending -> Assigned -> InProgress -> PickedUp -> Completed,
/// Cancelled reachable from any non-terminal status, plus the
/// coordinator-internal release edge Assigned -> Pending used when a driver
/// rejects.
fn request_edge_allowed(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;

    matches!(
        (from, to),
        (Pending, Assigned)
            | (Assigned, InProgress)
            | (InProgress, PickedUp)
            | (PickedUp, Completed)
            | (Pending | Assigned | InProgress, Cancelled)
            | (Assigned, Pending)
    )
}

fn assignment_edge_allowed(from: AssignmentStatus, to: AssignmentStatus) -> bool {
    use AssignmentStatus::*;

    matches!(
        (from, to),
        (Assigned, Accepted) | (Assigned, Rejected) | (Accepted, InProgress) | (InProgress, Completed)
    )
}

pub fn transition_request(
    request: &mut PickupRequest,
    to: RequestStatus,
    actor: Uuid,
) -> Result<DomainEvent, AppError> {
    let from = request.status;
    if !request_edge_allowed(from, to) {
        return Err(AppError::InvalidTransition {
            entity: "request",
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        });
    }

    let now = Utc::now();
    request.status = to;
    request.updated_at = now;
    request.history.push(StatusChange { from, to, at: now });

    Ok(DomainEvent {
        entity: EntityKind::Request,
        entity_id: request.id,
        old_status: format!("{from:?}"),
        new_status: format!("{to:?}"),
        actor,
        at: now,
    })
}

pub fn transition_assignment(
    assignment: &mut DriverAssignment,
    to: AssignmentStatus,
    actor: Uuid,
) -> Result<DomainEvent, AppError> {
    let from = assignment.status;
    if !assignment_edge_allowed(from, to) {
        return Err(AppError::InvalidTransition {
            entity: "assignment",
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        });
    }

    let now = Utc::now();
    assignment.status = to;
    assignment.updated_at = now;
    assignment.history.push(StatusChange { from, to, at: now });

    Ok(DomainEvent {
        entity: EntityKind::Assignment,
        entity_id: assignment.id,
        old_status: format!("{from:?}"),
        new_status: format!("{to:?}"),
        actor,
        at: now,
    })
}

/// Actual weight may only be recorded while the driver is on site or the
/// material has been picked up.
pub fn ensure_weight_window(status: RequestStatus) -> Result<(), AppError> {
    use RequestStatus::*;

    match status {
        InProgress | PickedUp => Ok(()),
        Pending | Assigned => Err(AppError::PrematureWeightUpdate(status)),
        Completed | Cancelled => Err(AppError::RequestFinalized(status)),
    }
}
