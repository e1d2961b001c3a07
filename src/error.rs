use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Domain error taxonomy. Every variant carries enough context to render
/// an actionable message; infrastructure failures are kept apart under
/// `Store` so callers can apply their own retry policy.
#[derive(Error, Debug)]
pub enum GymError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("schedule conflict with existing entry {blocking_id}")]
    ScheduleConflict { blocking_id: String },

    #[error("no seats left: capacity of {capacity} reached")]
    CapacityExceeded { capacity: i32 },

    #[error("no visits available for client {client_id} in zone {gym_zone_id}")]
    InsufficientBalance { client_id: Uuid, gym_zone_id: i32 },

    #[error("client {client_id} already holds locker {locker_id}")]
    AlreadyHoldingResource { client_id: Uuid, locker_id: i32 },

    #[error("client {client_id} is already checked in")]
    AlreadyInside { client_id: Uuid },

    #[error("client {client_id} has no open visit")]
    NoOpenVisit { client_id: Uuid },

    #[error("session {session_id} is already completed")]
    AlreadyCompleted { session_id: Uuid },

    #[error("entry {id} is already cancelled")]
    AlreadyCancelled { id: String },

    #[error("session {session_id} has no participants to complete")]
    NothingToComplete { session_id: Uuid },

    #[error("operation not permitted: {reason}")]
    Forbidden { reason: &'static str },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GymError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        GymError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
