use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One committed status transition, kept on the entity itself so callers can
/// reconstruct the timeline without a separate audit store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Assigned,
    InProgress,
    PickedUp,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

/// A single requested material: reference into an external catalog, weights,
/// and the price snapshot taken when the request was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLine {
    pub material: String,
    pub estimated_weight_kg: f64,
    pub actual_weight_kg: Option<f64>,
    pub price_per_kg: f64,
    pub notes: Option<String>,
}

impl MaterialLine {
    pub fn estimated_amount(&self) -> f64 {
        self.estimated_weight_kg * self.price_per_kg
    }

    /// Present only once the driver has reported the actual weight.
    pub fn final_amount(&self) -> Option<f64> {
        self.actual_weight_kg.map(|kg| kg * self.price_per_kg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub materials: Vec<MaterialLine>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<StatusChange<RequestStatus>>,
}

impl PickupRequest {
    pub fn new(requester_id: Uuid, materials: Vec<MaterialLine>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requester_id,
            materials,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    pub fn estimated_total(&self) -> f64 {
        self.materials.iter().map(MaterialLine::estimated_amount).sum()
    }
}
