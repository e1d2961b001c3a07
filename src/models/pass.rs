use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    VisitBased,
    TimeBased,
}

/// A client's prepaid entitlement for one zone: either a countdown of
/// visits or an unlimited pass until `end_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ZonePass {
    pub id: Uuid,
    pub client_id: Uuid,
    pub gym_zone_id: i32,
    pub kind: PassKind,
    pub remaining_visits: i32,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ZonePass {
    /// Whether this pass can currently cover one visit.
    pub fn is_eligible(&self, today: NaiveDate) -> bool {
        match self.kind {
            PassKind::VisitBased => self.remaining_visits > 0,
            PassKind::TimeBased => self.end_date.map_or(true, |end| end >= today),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateZonePass {
    pub client_id: Uuid,
    pub gym_zone_id: i32,
    pub kind: PassKind,
    pub remaining_visits: i32,
    pub end_date: Option<NaiveDate>,
}

/// Result of a successful ledger consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedVisit {
    pub pass_id: Uuid,
    pub kind: PassKind,
    /// Balance left after the decrement; unchanged for time-based passes.
    pub remaining_visits: i32,
}
