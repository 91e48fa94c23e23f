use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roster entry feeding the matching policy. Availability is toggled by the
/// driver (or an operator) over the API; matching never offers a request to
/// an unavailable driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub available: bool,
    pub updated_at: DateTime<Utc>,
}
