use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::StatusChange;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentStatus {
    Assigned,
    Accepted,
    Rejected,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Rejected | AssignmentStatus::Completed)
    }
}

/// One matching attempt binding a request to a candidate driver. A request
/// accumulates one of these per attempt; at most one may be non-terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<StatusChange<AssignmentStatus>>,
}

impl DriverAssignment {
    pub fn new(request_id: Uuid, driver_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request_id,
            driver_id,
            status: AssignmentStatus::Assigned,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }
}
