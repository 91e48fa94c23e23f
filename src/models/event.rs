use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::assignment::DriverAssignment;
use crate::models::request::{MaterialLine, PickupRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntityKind {
    Request,
    Assignment,
}

/// Produced by the state machine, exactly one per successful transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub old_status: String,
    pub new_status: String,
    pub actor: Uuid,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecipientRole {
    Requester,
    Driver,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    RequestStatusChanged,
    AssignmentOffered,
    AssignmentStatusChanged,
    ReassignmentPending,
    WeightRecorded,
}

/// Immutable fanout payload. Built once a transition has committed; delivery
/// is best-effort and never feeds back into the state machine.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub recipient: Uuid,
    pub role: RecipientRole,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl NotificationEvent {
    fn new(recipient: Uuid, role: RecipientRole, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            recipient,
            role,
            kind,
            payload,
            emitted_at: Utc::now(),
        }
    }

    pub fn request_status(request: &PickupRequest, event: &DomainEvent) -> Self {
        Self::new(
            request.requester_id,
            RecipientRole::Requester,
            EventKind::RequestStatusChanged,
            json!({
                "request_id": request.id,
                "old_status": event.old_status,
                "new_status": event.new_status,
            }),
        )
    }

    /// Cancellation notice for the driver holding the live assignment.
    pub fn request_cancelled_for_driver(request: &PickupRequest, assignment: &DriverAssignment) -> Self {
        Self::new(
            assignment.driver_id,
            RecipientRole::Driver,
            EventKind::RequestStatusChanged,
            json!({
                "request_id": request.id,
                "assignment_id": assignment.id,
                "new_status": format!("{:?}", request.status),
            }),
        )
    }

    pub fn assignment_offered(assignment: &DriverAssignment, request: &PickupRequest) -> Self {
        Self::new(
            assignment.driver_id,
            RecipientRole::Driver,
            EventKind::AssignmentOffered,
            json!({
                "assignment_id": assignment.id,
                "request_id": request.id,
                "materials": request.materials,
                "estimated_total": request.estimated_total(),
            }),
        )
    }

    pub fn assignment_status(assignment: &DriverAssignment, request: &PickupRequest, event: &DomainEvent) -> Self {
        Self::new(
            request.requester_id,
            RecipientRole::Requester,
            EventKind::AssignmentStatusChanged,
            json!({
                "assignment_id": assignment.id,
                "request_id": request.id,
                "old_status": event.old_status,
                "new_status": event.new_status,
            }),
        )
    }

    pub fn reassignment_pending(request: &PickupRequest, rejected: &DriverAssignment) -> Self {
        Self::new(
            request.requester_id,
            RecipientRole::Requester,
            EventKind::ReassignmentPending,
            json!({
                "request_id": request.id,
                "rejected_assignment_id": rejected.id,
            }),
        )
    }

    pub fn weight_recorded(request: &PickupRequest, line_index: usize, line: &MaterialLine) -> Self {
        Self::new(
            request.requester_id,
            RecipientRole::Requester,
            EventKind::WeightRecorded,
            json!({
                "request_id": request.id,
                "line_index": line_index,
                "material": line.material,
                "actual_weight_kg": line.actual_weight_kg,
                "final_amount": line.final_amount(),
            }),
        )
    }
}
