use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VisitType {
    /// Direct entry onto the gym floor; closed by check-out.
    Gym,
    /// Derived from a completed session; written already closed.
    Training,
}

/// Attendance record. `client_id` and `trainer_id` are two independent
/// references to the principal table and never share an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub client_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub training_session_id: Option<Uuid>,
    pub visit_type: VisitType,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
}

impl Visit {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    /// Duration in seconds for a closed visit.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.check_out_time
            .map(|out| (out - self.check_in_time).num_seconds())
    }
}

/// What a client gets back when walking in: the open visit, the assigned
/// locker when one was free, and the pass the entry was charged to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymEntry {
    pub visit: Visit,
    pub locker: Option<crate::models::Locker>,
    pub consumed: crate::models::ConsumedVisit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymExit {
    pub visit: Visit,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymStatus {
    pub in_gym: bool,
    pub locker: Option<crate::models::Locker>,
    /// Visit-based balance summed across the client's passes.
    pub visits_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVisit {
    pub client_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub training_session_id: Option<Uuid>,
    pub visit_type: VisitType,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
}
