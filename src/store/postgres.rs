//! Postgres store backend.
//!
//! Queries are runtime-checked `query_as` calls over a `sqlx`
//! transaction. Row locks (`FOR UPDATE`, `SKIP LOCKED`) and conditional
//! updates implement the atomic primitives the services rely on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    CreateGymZone, CreateLocker, CreateTrainerSchedule, CreateVisit, CreateZonePass, GymZone,
    Locker, LockerRoom, Participant, TrainerSchedule, TrainingSession, Visit, ZonePass,
};
use crate::store::{Store, StoreError, StoreTx};

const ZONE_COLUMNS: &str = "id, name, description, capacity, is_active";

const SLOT_COLUMNS: &str = "id, trainer_id, day_of_week, start_time, end_time, gym_zone_id, \
                            is_working, is_cancelled, cancelled_at, cancellation_reason";

const SESSION_COLUMNS: &str = "id, trainer_id, gym_zone_id, session_date, start_time, end_time, \
                               is_cancelled, is_completed, cancellation_reason, cancelled_at, \
                               completed_at, created_at";

const PASS_COLUMNS: &str =
    "id, client_id, gym_zone_id, kind, remaining_visits, end_date, created_at, updated_at";

const LOCKER_COLUMNS: &str = "id, locker_number, gender, status, code, occupied_by, occupied_at";

const VISIT_COLUMNS: &str =
    "id, client_id, trainer_id, training_session_id, visit_type, check_in_time, check_out_time";

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_zone(&mut self, zone: &CreateGymZone) -> Result<GymZone, StoreError> {
        let query = format!(
            "INSERT INTO gym_zones (name, description, capacity, is_active)
             VALUES ($1, $2, $3, TRUE)
             RETURNING {ZONE_COLUMNS}"
        );
        let zone = sqlx::query_as::<_, GymZone>(&query)
            .bind(&zone.name)
            .bind(&zone.description)
            .bind(zone.capacity)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(zone)
    }

    async fn zone_by_id(&mut self, id: i32) -> Result<Option<GymZone>, StoreError> {
        let query = format!("SELECT {ZONE_COLUMNS} FROM gym_zones WHERE id = $1");
        Ok(sqlx::query_as::<_, GymZone>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn list_zones(&mut self) -> Result<Vec<GymZone>, StoreError> {
        let query = format!("SELECT {ZONE_COLUMNS} FROM gym_zones ORDER BY id");
        Ok(sqlx::query_as::<_, GymZone>(&query)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn insert_slot(
        &mut self,
        trainer_id: Uuid,
        slot: &CreateTrainerSchedule,
    ) -> Result<TrainerSchedule, StoreError> {
        let query = format!(
            "INSERT INTO trainer_schedules
                 (trainer_id, day_of_week, start_time, end_time, gym_zone_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SLOT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TrainerSchedule>(&query)
            .bind(trainer_id)
            .bind(slot.day_of_week)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.gym_zone_id)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn slot_by_id(&mut self, id: i32) -> Result<Option<TrainerSchedule>, StoreError> {
        let query = format!("SELECT {SLOT_COLUMNS} FROM trainer_schedules WHERE id = $1");
        Ok(sqlx::query_as::<_, TrainerSchedule>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn update_slot(&mut self, slot: &TrainerSchedule) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE trainer_schedules
             SET day_of_week = $2, start_time = $3, end_time = $4, gym_zone_id = $5,
                 is_working = $6, is_cancelled = $7, cancelled_at = $8, cancellation_reason = $9
             WHERE id = $1",
        )
        .bind(slot.id)
        .bind(slot.day_of_week)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.gym_zone_id)
        .bind(slot.is_working)
        .bind(slot.is_cancelled)
        .bind(slot.cancelled_at)
        .bind(&slot.cancellation_reason)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn slots_for_trainer(
        &mut self,
        trainer_id: Uuid,
    ) -> Result<Vec<TrainerSchedule>, StoreError> {
        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM trainer_schedules
             WHERE trainer_id = $1
             ORDER BY day_of_week, start_time"
        );
        Ok(sqlx::query_as::<_, TrainerSchedule>(&query)
            .bind(trainer_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn slots_on_day(&mut self, day_of_week: i16) -> Result<Vec<TrainerSchedule>, StoreError> {
        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM trainer_schedules
             WHERE day_of_week = $1
             ORDER BY start_time"
        );
        Ok(sqlx::query_as::<_, TrainerSchedule>(&query)
            .bind(day_of_week)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn insert_session(
        &mut self,
        session: &TrainingSession,
    ) -> Result<TrainingSession, StoreError> {
        let query = format!(
            "INSERT INTO training_sessions
                 (id, trainer_id, gym_zone_id, session_date, start_time, end_time,
                  is_cancelled, is_completed, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE, $7)
             RETURNING {SESSION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(session.id)
            .bind(session.trainer_id)
            .bind(session.gym_zone_id)
            .bind(session.session_date)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.created_at)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn session_by_id(&mut self, id: Uuid) -> Result<Option<TrainingSession>, StoreError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = $1");
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn session_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<TrainingSession>, StoreError> {
        let query =
            format!("SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn sessions_for_trainer_on(
        &mut self,
        trainer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions
             WHERE trainer_id = $1 AND session_date = $2
             ORDER BY start_time"
        );
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(trainer_id)
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn sessions_in_zone_on(
        &mut self,
        gym_zone_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions
             WHERE gym_zone_id = $1 AND session_date = $2
             ORDER BY start_time"
        );
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(gym_zone_id)
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn sessions_on(
        &mut self,
        date: NaiveDate,
        gym_zone_id: Option<i32>,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions
             WHERE session_date = $1
               AND is_cancelled = FALSE
               AND ($2::INTEGER IS NULL OR gym_zone_id = $2)
             ORDER BY start_time"
        );
        Ok(sqlx::query_as::<_, TrainingSession>(&query)
            .bind(date)
            .bind(gym_zone_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn set_session_cancelled(
        &mut self,
        id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE training_sessions
             SET is_cancelled = TRUE, cancellation_reason = $2, cancelled_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_session_completed(
        &mut self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE training_sessions SET is_completed = TRUE, completed_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_participant(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        Ok(sqlx::query_as::<_, Participant>(
            "INSERT INTO training_session_participants (session_id, client_id, created_at)
             VALUES ($1, $2, $3)
             RETURNING session_id, client_id, created_at",
        )
        .bind(session_id)
        .bind(client_id)
        .bind(at)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn participant_exists(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM training_session_participants
                 WHERE session_id = $1 AND client_id = $2
             )",
        )
        .bind(session_id)
        .bind(client_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn count_participants(&mut self, session_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_session_participants WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn participants_of(&mut self, session_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        Ok(sqlx::query_as::<_, Participant>(
            "SELECT session_id, client_id, created_at
             FROM training_session_participants
             WHERE session_id = $1
             ORDER BY created_at",
        )
        .bind(session_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn insert_pass(
        &mut self,
        pass: &CreateZonePass,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError> {
        let query = format!(
            "INSERT INTO zone_passes
                 (id, client_id, gym_zone_id, kind, remaining_visits, end_date,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {PASS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ZonePass>(&query)
            .bind(Uuid::new_v4())
            .bind(pass.client_id)
            .bind(pass.gym_zone_id)
            .bind(pass.kind)
            .bind(pass.remaining_visits)
            .bind(pass.end_date)
            .bind(at)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn passes_for_client(&mut self, client_id: Uuid) -> Result<Vec<ZonePass>, StoreError> {
        let query = format!(
            "SELECT {PASS_COLUMNS} FROM zone_passes
             WHERE client_id = $1
             ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, ZonePass>(&query)
            .bind(client_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn passes_for_client_zone(
        &mut self,
        client_id: Uuid,
        gym_zone_id: i32,
    ) -> Result<Vec<ZonePass>, StoreError> {
        let query = format!(
            "SELECT {PASS_COLUMNS} FROM zone_passes
             WHERE client_id = $1 AND gym_zone_id = $2
             ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, ZonePass>(&query)
            .bind(client_id)
            .bind(gym_zone_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn try_decrement_pass(
        &mut self,
        pass_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError> {
        // Single conditional update: of two concurrent callers racing over
        // a balance of one, exactly one sees a row to update.
        let remaining: Option<i32> = sqlx::query_scalar(
            "UPDATE zone_passes
             SET remaining_visits = remaining_visits - 1, updated_at = $2
             WHERE id = $1 AND kind = 'visit_based' AND remaining_visits > 0
             RETURNING remaining_visits",
        )
        .bind(pass_id)
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(remaining)
    }

    async fn credit_pass(
        &mut self,
        pass_id: Uuid,
        count: i32,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError> {
        let query = format!(
            "UPDATE zone_passes
             SET remaining_visits = remaining_visits + $2, updated_at = $3
             WHERE id = $1
             RETURNING {PASS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ZonePass>(&query)
            .bind(pass_id)
            .bind(count)
            .bind(at)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn insert_locker(
        &mut self,
        locker: &CreateLocker,
        code: i32,
    ) -> Result<Locker, StoreError> {
        let query = format!(
            "INSERT INTO lockers (locker_number, gender, status, code)
             VALUES ($1, $2, 'free', $3)
             RETURNING {LOCKER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(&locker.locker_number)
            .bind(locker.gender)
            .bind(code)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn locker_by_id(&mut self, id: i32) -> Result<Option<Locker>, StoreError> {
        let query = format!("SELECT {LOCKER_COLUMNS} FROM lockers WHERE id = $1");
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn list_lockers(&mut self, room: Option<LockerRoom>) -> Result<Vec<Locker>, StoreError> {
        let query = format!(
            "SELECT {LOCKER_COLUMNS} FROM lockers
             WHERE ($1::TEXT IS NULL OR gender = $1)
             ORDER BY id"
        );
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(room)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn locker_held_by(&mut self, client_id: Uuid) -> Result<Option<Locker>, StoreError> {
        let query = format!(
            "SELECT {LOCKER_COLUMNS} FROM lockers
             WHERE occupied_by = $1 AND status = 'occupied'
             LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(client_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn claim_free_locker(
        &mut self,
        room: LockerRoom,
        client_id: Uuid,
        code: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<Locker>, StoreError> {
        // SKIP LOCKED keeps two concurrent entries from fighting over the
        // same row; each claims a different free locker or none.
        let query = format!(
            "UPDATE lockers
             SET status = 'occupied', occupied_by = $2, code = $3, occupied_at = $4
             WHERE id = (
                 SELECT id FROM lockers
                 WHERE gender = $1 AND status = 'free'
                 ORDER BY id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {LOCKER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(room)
            .bind(client_id)
            .bind(code)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn release_locker(&mut self, id: i32, code: i32) -> Result<Option<Locker>, StoreError> {
        let query = format!(
            "UPDATE lockers
             SET status = 'free', occupied_by = NULL, occupied_at = NULL, code = $2
             WHERE id = $1
             RETURNING {LOCKER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Locker>(&query)
            .bind(id)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_visit(&mut self, visit: &CreateVisit) -> Result<Visit, StoreError> {
        let query = format!(
            "INSERT INTO visits
                 (id, client_id, trainer_id, training_session_id, visit_type,
                  check_in_time, check_out_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {VISIT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Visit>(&query)
            .bind(Uuid::new_v4())
            .bind(visit.client_id)
            .bind(visit.trainer_id)
            .bind(visit.training_session_id)
            .bind(visit.visit_type)
            .bind(visit.check_in_time)
            .bind(visit.check_out_time)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn open_direct_visit(&mut self, client_id: Uuid) -> Result<Option<Visit>, StoreError> {
        let query = format!(
            "SELECT {VISIT_COLUMNS} FROM visits
             WHERE client_id = $1 AND check_out_time IS NULL AND visit_type = 'gym'
             LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Visit>(&query)
            .bind(client_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn close_visit(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Visit, StoreError> {
        let query = format!(
            "UPDATE visits SET check_out_time = $2 WHERE id = $1 RETURNING {VISIT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Visit>(&query)
            .bind(id)
            .bind(at)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn session_visit_exists(
        &mut self,
        client_id: Uuid,
        session_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM visits WHERE client_id = $1 AND training_session_id = $2
             )",
        )
        .bind(client_id)
        .bind(session_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn visits_for_client(&mut self, client_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let query = format!(
            "SELECT {VISIT_COLUMNS} FROM visits
             WHERE client_id = $1
             ORDER BY check_in_time"
        );
        Ok(sqlx::query_as::<_, Visit>(&query)
            .bind(client_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn visits_for_trainer(&mut self, trainer_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let query = format!(
            "SELECT {VISIT_COLUMNS} FROM visits
             WHERE trainer_id = $1
             ORDER BY check_in_time"
        );
        Ok(sqlx::query_as::<_, Visit>(&query)
            .bind(trainer_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
