use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DriverAssignment};
use crate::models::request::{PickupRequest, RequestStatus};

/// Durable-store collaborator. Saves carry the status the caller last read;
/// a mismatch means another writer got there first and surfaces as
/// `StaleState`. The coordinator always checks status under the entity lock,
/// so in-process the check cannot fail, but the contract keeps the core
/// honest against any store implementation that is shared across processes.
pub trait EntityStore: Send + Sync {
    fn insert_request(&self, request: PickupRequest);
    fn load_request(&self, id: Uuid) -> Option<PickupRequest>;
    fn save_request(&self, request: &PickupRequest, expected: RequestStatus) -> Result<(), AppError>;
    fn list_requests(&self) -> Vec<PickupRequest>;

    fn insert_assignment(&self, assignment: DriverAssignment);
    fn load_assignment(&self, id: Uuid) -> Option<DriverAssignment>;
    fn save_assignment(
        &self,
        assignment: &DriverAssignment,
        expected: AssignmentStatus,
    ) -> Result<(), AppError>;
    fn list_assignments(&self) -> Vec<DriverAssignment>;

    /// The at-most-one non-terminal assignment for a request, if any.
    fn active_assignment_for(&self, request_id: Uuid) -> Option<DriverAssignment>;
    fn assignments_for(&self, request_id: Uuid) -> Vec<DriverAssignment>;

    fn request_count(&self) -> usize;
    fn assignment_count(&self) -> usize;
}

#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<Uuid, PickupRequest>,
    assignments: DashMap<Uuid, DriverAssignment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryStore {
    fn insert_request(&self, request: PickupRequest) {
        self.requests.insert(request.id, request);
    }

    fn load_request(&self, id: Uuid) -> Option<PickupRequest> {
        self.requests.get(&id).map(|entry| entry.value().clone())
    }

    fn save_request(&self, request: &PickupRequest, expected: RequestStatus) -> Result<(), AppError> {
        let mut stored = self.requests.get_mut(&request.id).ok_or(AppError::UnknownEntity {
            kind: "request",
            id: request.id.to_string(),
        })?;

        if stored.status != expected {
            return Err(AppError::StaleState {
                entity: "request",
                id: request.id,
            });
        }

        *stored = request.clone();
        Ok(())
    }

    fn list_requests(&self) -> Vec<PickupRequest> {
        self.requests.iter().map(|entry| entry.value().clone()).collect()
    }

    fn insert_assignment(&self, assignment: DriverAssignment) {
        self.assignments.insert(assignment.id, assignment);
    }

    fn load_assignment(&self, id: Uuid) -> Option<DriverAssignment> {
        self.assignments.get(&id).map(|entry| entry.value().clone())
    }

    fn save_assignment(
        &self,
        assignment: &DriverAssignment,
        expected: AssignmentStatus,
    ) -> Result<(), AppError> {
        let mut stored = self
            .assignments
            .get_mut(&assignment.id)
            .ok_or(AppError::UnknownEntity {
                kind: "assignment",
                id: assignment.id.to_string(),
            })?;

        if stored.status != expected {
            return Err(AppError::StaleState {
                entity: "assignment",
                id: assignment.id,
            });
        }

        *stored = assignment.clone();
        Ok(())
    }

    fn list_assignments(&self) -> Vec<DriverAssignment> {
        self.assignments.iter().map(|entry| entry.value().clone()).collect()
    }

    fn active_assignment_for(&self, request_id: Uuid) -> Option<DriverAssignment> {
        self.assignments
            .iter()
            .find(|entry| entry.request_id == request_id && !entry.status.is_terminal())
            .map(|entry| entry.value().clone())
    }

    fn assignments_for(&self, request_id: Uuid) -> Vec<DriverAssignment> {
        self.assignments
            .iter()
            .filter(|entry| entry.request_id == request_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn request_count(&self) -> usize {
        self.requests.len()
    }

    fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_request_rejects_stale_expected_status() {
        let store = MemoryStore::new();
        let request = PickupRequest::new(Uuid::new_v4(), Vec::new());
        let id = request.id;
        store.insert_request(request);

        let mut copy = store.load_request(id).unwrap();
        copy.status = RequestStatus::Assigned;

        // Saving against the status we actually read succeeds.
        store.save_request(&copy, RequestStatus::Pending).unwrap();

        // A second writer still holding the Pending read loses.
        let mut second = copy.clone();
        second.status = RequestStatus::Cancelled;
        let err = store.save_request(&second, RequestStatus::Pending).unwrap_err();
        assert!(matches!(err, AppError::StaleState { .. }));
    }

    #[test]
    fn active_assignment_ignores_terminal_records() {
        let store = MemoryStore::new();
        let request_id = Uuid::new_v4();

        let mut rejected = DriverAssignment::new(request_id, Uuid::new_v4());
        rejected.status = AssignmentStatus::Rejected;
        store.insert_assignment(rejected);

        assert!(store.active_assignment_for(request_id).is_none());

        let live = DriverAssignment::new(request_id, Uuid::new_v4());
        let live_id = live.id;
        store.insert_assignment(live);

        assert_eq!(store.active_assignment_for(request_id).unwrap().id, live_id);
        assert_eq!(store.assignments_for(request_id).len(), 2);
    }
}
