use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recurring weekly availability slot owned by a trainer.
/// `day_of_week` is 0-6, Monday first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrainerSchedule {
    pub id: i32,
    pub trainer_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub gym_zone_id: Option<i32>,
    pub is_working: bool,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrainerSchedule {
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub gym_zone_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTrainerSchedule {
    pub day_of_week: Option<i16>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub gym_zone_id: Option<i32>,
}

/// One-off session scheduled by a trainer on a concrete date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrainingSession {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub gym_zone_id: Option<i32>,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_cancelled: bool,
    pub is_completed: bool,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrainingSession {
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub gym_zone_id: Option<i32>,
}

/// A client's signup record for a session. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub session_id: Uuid,
    pub client_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Session listing entry with its current roster size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithRoster {
    pub session: TrainingSession,
    pub participants_count: i64,
    /// Client ids, only populated for the owning trainer.
    pub participants: Vec<Uuid>,
}

/// Outcome of a session completion run. `failed_clients` lists the
/// participants whose balance could not cover the visit; they are
/// reported, not fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub session_id: Uuid,
    /// Participants charged and written to the attendance log this run.
    pub charged: u32,
    /// Participants skipped because an attendance record already existed.
    pub skipped: u32,
    pub failed_clients: Vec<Uuid>,
}

/// Half-open interval overlap: [a_start, a_end) intersects [b_start, b_end).
/// Back-to-back slots do not overlap.
pub fn overlaps(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Returns the id of the first existing interval that conflicts with the
/// candidate, skipping cancelled entries and the excluded id (used when
/// re-checking an update against all other rows).
pub fn find_conflict<I, T>(
    start: NaiveTime,
    end: NaiveTime,
    existing: T,
    exclude: Option<I>,
) -> Option<I>
where
    I: PartialEq + Copy,
    T: IntoIterator<Item = (I, NaiveTime, NaiveTime, bool)>,
{
    existing.into_iter().find_map(|(id, s, e, cancelled)| {
        if cancelled || exclude == Some(id) {
            return None;
        }
        overlaps(start, end, s, e).then_some(id)
    })
}
