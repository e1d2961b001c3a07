// Transactional repository boundary.
//
// Every service operation opens one transaction, works through the
// `StoreTx` trait and then commits or rolls back. The trait surfaces a
// few deliberately atomic primitives (conditional pass decrement, free
// locker claim, session row lock) so that race-sensitive checks happen
// inside the backend that can actually serialize them.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CreateGymZone, CreateLocker, CreateTrainerSchedule, CreateVisit, CreateZonePass, GymZone,
    Locker, LockerRoom, Participant, TrainerSchedule, TrainingSession, Visit, ZonePass,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store invariant violated: {0}")]
    Corrupted(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open transaction. Dropping without `commit` rolls back.
#[async_trait]
pub trait StoreTx: Send {
    // --- zones ---
    async fn insert_zone(&mut self, zone: &CreateGymZone) -> Result<GymZone, StoreError>;
    async fn zone_by_id(&mut self, id: i32) -> Result<Option<GymZone>, StoreError>;
    async fn list_zones(&mut self) -> Result<Vec<GymZone>, StoreError>;

    // --- recurring weekly slots ---
    async fn insert_slot(
        &mut self,
        trainer_id: Uuid,
        slot: &CreateTrainerSchedule,
    ) -> Result<TrainerSchedule, StoreError>;
    async fn slot_by_id(&mut self, id: i32) -> Result<Option<TrainerSchedule>, StoreError>;
    async fn update_slot(&mut self, slot: &TrainerSchedule) -> Result<(), StoreError>;
    async fn slots_for_trainer(
        &mut self,
        trainer_id: Uuid,
    ) -> Result<Vec<TrainerSchedule>, StoreError>;
    async fn slots_on_day(&mut self, day_of_week: i16) -> Result<Vec<TrainerSchedule>, StoreError>;

    // --- one-off sessions ---
    async fn insert_session(
        &mut self,
        session: &TrainingSession,
    ) -> Result<TrainingSession, StoreError>;
    async fn session_by_id(&mut self, id: Uuid) -> Result<Option<TrainingSession>, StoreError>;
    /// Same lookup but taking an exclusive row lock for the remainder of
    /// the transaction. Serializes capacity checks and completion.
    async fn session_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<TrainingSession>, StoreError>;
    async fn sessions_for_trainer_on(
        &mut self,
        trainer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError>;
    async fn sessions_in_zone_on(
        &mut self,
        gym_zone_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError>;
    /// Non-cancelled sessions on a date, optionally filtered by zone,
    /// ordered by start time.
    async fn sessions_on(
        &mut self,
        date: NaiveDate,
        gym_zone_id: Option<i32>,
    ) -> Result<Vec<TrainingSession>, StoreError>;
    async fn set_session_cancelled(
        &mut self,
        id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn set_session_completed(
        &mut self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // --- participants ---
    async fn insert_participant(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError>;
    async fn participant_exists(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, StoreError>;
    async fn count_participants(&mut self, session_id: Uuid) -> Result<i64, StoreError>;
    async fn participants_of(&mut self, session_id: Uuid) -> Result<Vec<Participant>, StoreError>;

    // --- zone passes ---
    async fn insert_pass(
        &mut self,
        pass: &CreateZonePass,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError>;
    async fn passes_for_client(&mut self, client_id: Uuid) -> Result<Vec<ZonePass>, StoreError>;
    async fn passes_for_client_zone(
        &mut self,
        client_id: Uuid,
        gym_zone_id: i32,
    ) -> Result<Vec<ZonePass>, StoreError>;
    /// Conditional decrement: succeeds only while the balance is positive.
    /// Returns the new balance, or `None` when the pass had none left (or
    /// is not visit-based). Atomic with respect to concurrent callers.
    async fn try_decrement_pass(
        &mut self,
        pass_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError>;
    async fn credit_pass(
        &mut self,
        pass_id: Uuid,
        count: i32,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError>;

    // --- lockers ---
    async fn insert_locker(&mut self, locker: &CreateLocker, code: i32)
        -> Result<Locker, StoreError>;
    async fn locker_by_id(&mut self, id: i32) -> Result<Option<Locker>, StoreError>;
    async fn list_lockers(&mut self, room: Option<LockerRoom>) -> Result<Vec<Locker>, StoreError>;
    async fn locker_held_by(&mut self, client_id: Uuid) -> Result<Option<Locker>, StoreError>;
    /// Atomically claims the lowest-id free locker of the room for the
    /// client, stamping the new access code. `None` when the room is full.
    async fn claim_free_locker(
        &mut self,
        room: LockerRoom,
        client_id: Uuid,
        code: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<Locker>, StoreError>;
    /// Frees the locker and stamps a fresh code regardless of current
    /// status. `None` when no such locker exists.
    async fn release_locker(&mut self, id: i32, code: i32) -> Result<Option<Locker>, StoreError>;

    // --- visits ---
    async fn insert_visit(&mut self, visit: &CreateVisit) -> Result<Visit, StoreError>;
    async fn open_direct_visit(&mut self, client_id: Uuid) -> Result<Option<Visit>, StoreError>;
    async fn close_visit(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Visit, StoreError>;
    async fn session_visit_exists(
        &mut self,
        client_id: Uuid,
        session_id: Uuid,
    ) -> Result<bool, StoreError>;
    async fn visits_for_client(&mut self, client_id: Uuid) -> Result<Vec<Visit>, StoreError>;
    async fn visits_for_trainer(&mut self, trainer_id: Uuid) -> Result<Vec<Visit>, StoreError>;

    // --- lifecycle ---
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
