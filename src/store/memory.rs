//! In-memory store backend.
//!
//! Transactions are serialized behind a single async mutex; a snapshot of
//! the state is taken at `begin` and restored when the transaction is
//! dropped without commit. That gives the same observable transactional
//! guarantees as the Postgres backend, which is what the service-level
//! tests rely on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{
    CreateGymZone, CreateLocker, CreateTrainerSchedule, CreateVisit, CreateZonePass, GymZone,
    Locker, LockerRoom, LockerStatus, Participant, PassKind, TrainerSchedule, TrainingSession,
    Visit, VisitType, ZonePass,
};
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    zones: Vec<GymZone>,
    next_zone_id: i32,
    slots: Vec<TrainerSchedule>,
    next_slot_id: i32,
    sessions: Vec<TrainingSession>,
    participants: Vec<Participant>,
    passes: Vec<ZonePass>,
    lockers: Vec<Locker>,
    next_locker_id: i32,
    visits: Vec<Visit>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot,
            committed: false,
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: MemoryState,
    committed: bool,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.committed {
            *self.guard = std::mem::take(&mut self.snapshot);
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_zone(&mut self, zone: &CreateGymZone) -> Result<GymZone, StoreError> {
        self.guard.next_zone_id += 1;
        let zone = GymZone {
            id: self.guard.next_zone_id,
            name: zone.name.clone(),
            description: zone.description.clone(),
            capacity: zone.capacity,
            is_active: true,
        };
        self.guard.zones.push(zone.clone());
        Ok(zone)
    }

    async fn zone_by_id(&mut self, id: i32) -> Result<Option<GymZone>, StoreError> {
        Ok(self.guard.zones.iter().find(|z| z.id == id).cloned())
    }

    async fn list_zones(&mut self) -> Result<Vec<GymZone>, StoreError> {
        Ok(self.guard.zones.clone())
    }

    async fn insert_slot(
        &mut self,
        trainer_id: Uuid,
        slot: &CreateTrainerSchedule,
    ) -> Result<TrainerSchedule, StoreError> {
        self.guard.next_slot_id += 1;
        let slot = TrainerSchedule {
            id: self.guard.next_slot_id,
            trainer_id,
            day_of_week: slot.day_of_week,
            start_time: slot.start_time,
            end_time: slot.end_time,
            gym_zone_id: slot.gym_zone_id,
            is_working: true,
            is_cancelled: false,
            cancelled_at: None,
            cancellation_reason: None,
        };
        self.guard.slots.push(slot.clone());
        Ok(slot)
    }

    async fn slot_by_id(&mut self, id: i32) -> Result<Option<TrainerSchedule>, StoreError> {
        Ok(self.guard.slots.iter().find(|s| s.id == id).cloned())
    }

    async fn update_slot(&mut self, slot: &TrainerSchedule) -> Result<(), StoreError> {
        let existing = self
            .guard
            .slots
            .iter_mut()
            .find(|s| s.id == slot.id)
            .ok_or_else(|| StoreError::Corrupted(format!("slot {} vanished", slot.id)))?;
        *existing = slot.clone();
        Ok(())
    }

    async fn slots_for_trainer(
        &mut self,
        trainer_id: Uuid,
    ) -> Result<Vec<TrainerSchedule>, StoreError> {
        let mut slots: Vec<_> = self
            .guard
            .slots
            .iter()
            .filter(|s| s.trainer_id == trainer_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.day_of_week, s.start_time));
        Ok(slots)
    }

    async fn slots_on_day(&mut self, day_of_week: i16) -> Result<Vec<TrainerSchedule>, StoreError> {
        let mut slots: Vec<_> = self
            .guard
            .slots
            .iter()
            .filter(|s| s.day_of_week == day_of_week)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn insert_session(
        &mut self,
        session: &TrainingSession,
    ) -> Result<TrainingSession, StoreError> {
        self.guard.sessions.push(session.clone());
        Ok(session.clone())
    }

    async fn session_by_id(&mut self, id: Uuid) -> Result<Option<TrainingSession>, StoreError> {
        Ok(self.guard.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn session_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<TrainingSession>, StoreError> {
        // The store-wide mutex already serializes transactions.
        self.session_by_id(id).await
    }

    async fn sessions_for_trainer_on(
        &mut self,
        trainer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        Ok(self
            .guard
            .sessions
            .iter()
            .filter(|s| s.trainer_id == trainer_id && s.session_date == date)
            .cloned()
            .collect())
    }

    async fn sessions_in_zone_on(
        &mut self,
        gym_zone_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        Ok(self
            .guard
            .sessions
            .iter()
            .filter(|s| s.gym_zone_id == Some(gym_zone_id) && s.session_date == date)
            .cloned()
            .collect())
    }

    async fn sessions_on(
        &mut self,
        date: NaiveDate,
        gym_zone_id: Option<i32>,
    ) -> Result<Vec<TrainingSession>, StoreError> {
        let mut sessions: Vec<_> = self
            .guard
            .sessions
            .iter()
            .filter(|s| {
                s.session_date == date
                    && !s.is_cancelled
                    && gym_zone_id.map_or(true, |z| s.gym_zone_id == Some(z))
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    async fn set_session_cancelled(
        &mut self,
        id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let session = self
            .guard
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::Corrupted(format!("session {id} vanished")))?;
        session.is_cancelled = true;
        session.cancellation_reason = Some(reason.to_string());
        session.cancelled_at = Some(at);
        Ok(())
    }

    async fn set_session_completed(
        &mut self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let session = self
            .guard
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::Corrupted(format!("session {id} vanished")))?;
        session.is_completed = true;
        session.completed_at = Some(at);
        Ok(())
    }

    async fn insert_participant(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        let participant = Participant {
            session_id,
            client_id,
            created_at: at,
        };
        self.guard.participants.push(participant.clone());
        Ok(participant)
    }

    async fn participant_exists(
        &mut self,
        session_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .guard
            .participants
            .iter()
            .any(|p| p.session_id == session_id && p.client_id == client_id))
    }

    async fn count_participants(&mut self, session_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .guard
            .participants
            .iter()
            .filter(|p| p.session_id == session_id)
            .count() as i64)
    }

    async fn participants_of(&mut self, session_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<_> = self
            .guard
            .participants
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.created_at);
        Ok(participants)
    }

    async fn insert_pass(
        &mut self,
        pass: &CreateZonePass,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError> {
        let pass = ZonePass {
            id: Uuid::new_v4(),
            client_id: pass.client_id,
            gym_zone_id: pass.gym_zone_id,
            kind: pass.kind,
            remaining_visits: pass.remaining_visits,
            end_date: pass.end_date,
            created_at: at,
            updated_at: at,
        };
        self.guard.passes.push(pass.clone());
        Ok(pass)
    }

    async fn passes_for_client(&mut self, client_id: Uuid) -> Result<Vec<ZonePass>, StoreError> {
        let mut passes: Vec<_> = self
            .guard
            .passes
            .iter()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect();
        passes.sort_by_key(|p| (p.created_at, p.id));
        Ok(passes)
    }

    async fn passes_for_client_zone(
        &mut self,
        client_id: Uuid,
        gym_zone_id: i32,
    ) -> Result<Vec<ZonePass>, StoreError> {
        let mut passes: Vec<_> = self
            .guard
            .passes
            .iter()
            .filter(|p| p.client_id == client_id && p.gym_zone_id == gym_zone_id)
            .cloned()
            .collect();
        passes.sort_by_key(|p| (p.created_at, p.id));
        Ok(passes)
    }

    async fn try_decrement_pass(
        &mut self,
        pass_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError> {
        let pass = self.guard.passes.iter_mut().find(|p| p.id == pass_id);
        match pass {
            Some(p) if p.kind == PassKind::VisitBased && p.remaining_visits > 0 => {
                p.remaining_visits -= 1;
                p.updated_at = at;
                Ok(Some(p.remaining_visits))
            }
            _ => Ok(None),
        }
    }

    async fn credit_pass(
        &mut self,
        pass_id: Uuid,
        count: i32,
        at: DateTime<Utc>,
    ) -> Result<ZonePass, StoreError> {
        let pass = self
            .guard
            .passes
            .iter_mut()
            .find(|p| p.id == pass_id)
            .ok_or_else(|| StoreError::Corrupted(format!("pass {pass_id} vanished")))?;
        pass.remaining_visits += count;
        pass.updated_at = at;
        Ok(pass.clone())
    }

    async fn insert_locker(
        &mut self,
        locker: &CreateLocker,
        code: i32,
    ) -> Result<Locker, StoreError> {
        self.guard.next_locker_id += 1;
        let locker = Locker {
            id: self.guard.next_locker_id,
            locker_number: locker.locker_number.clone(),
            gender: locker.gender,
            status: LockerStatus::Free,
            code,
            occupied_by: None,
            occupied_at: None,
        };
        self.guard.lockers.push(locker.clone());
        Ok(locker)
    }

    async fn locker_by_id(&mut self, id: i32) -> Result<Option<Locker>, StoreError> {
        Ok(self.guard.lockers.iter().find(|l| l.id == id).cloned())
    }

    async fn list_lockers(&mut self, room: Option<LockerRoom>) -> Result<Vec<Locker>, StoreError> {
        let mut lockers: Vec<_> = self
            .guard
            .lockers
            .iter()
            .filter(|l| room.map_or(true, |r| l.gender == r))
            .cloned()
            .collect();
        lockers.sort_by_key(|l| l.id);
        Ok(lockers)
    }

    async fn locker_held_by(&mut self, client_id: Uuid) -> Result<Option<Locker>, StoreError> {
        Ok(self
            .guard
            .lockers
            .iter()
            .find(|l| l.status == LockerStatus::Occupied && l.occupied_by == Some(client_id))
            .cloned())
    }

    async fn claim_free_locker(
        &mut self,
        room: LockerRoom,
        client_id: Uuid,
        code: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<Locker>, StoreError> {
        let free = self
            .guard
            .lockers
            .iter_mut()
            .filter(|l| l.gender == room && l.status == LockerStatus::Free)
            .min_by_key(|l| l.id);
        Ok(free.map(|locker| {
            locker.status = LockerStatus::Occupied;
            locker.occupied_by = Some(client_id);
            locker.occupied_at = Some(at);
            locker.code = code;
            locker.clone()
        }))
    }

    async fn release_locker(&mut self, id: i32, code: i32) -> Result<Option<Locker>, StoreError> {
        let locker = self.guard.lockers.iter_mut().find(|l| l.id == id);
        Ok(locker.map(|locker| {
            locker.status = LockerStatus::Free;
            locker.occupied_by = None;
            locker.occupied_at = None;
            locker.code = code;
            locker.clone()
        }))
    }

    async fn insert_visit(&mut self, visit: &CreateVisit) -> Result<Visit, StoreError> {
        let visit = Visit {
            id: Uuid::new_v4(),
            client_id: visit.client_id,
            trainer_id: visit.trainer_id,
            training_session_id: visit.training_session_id,
            visit_type: visit.visit_type,
            check_in_time: visit.check_in_time,
            check_out_time: visit.check_out_time,
        };
        self.guard.visits.push(visit.clone());
        Ok(visit)
    }

    async fn open_direct_visit(&mut self, client_id: Uuid) -> Result<Option<Visit>, StoreError> {
        Ok(self
            .guard
            .visits
            .iter()
            .find(|v| {
                v.client_id == client_id
                    && v.check_out_time.is_none()
                    && v.visit_type == VisitType::Gym
            })
            .cloned())
    }

    async fn close_visit(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<Visit, StoreError> {
        let visit = self
            .guard
            .visits
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| StoreError::Corrupted(format!("visit {id} vanished")))?;
        visit.check_out_time = Some(at);
        Ok(visit.clone())
    }

    async fn session_visit_exists(
        &mut self,
        client_id: Uuid,
        session_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .guard
            .visits
            .iter()
            .any(|v| v.client_id == client_id && v.training_session_id == Some(session_id)))
    }

    async fn visits_for_client(&mut self, client_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let mut visits: Vec<_> = self
            .guard
            .visits
            .iter()
            .filter(|v| v.client_id == client_id)
            .cloned()
            .collect();
        visits.sort_by_key(|v| v.check_in_time);
        Ok(visits)
    }

    async fn visits_for_trainer(&mut self, trainer_id: Uuid) -> Result<Vec<Visit>, StoreError> {
        let mut visits: Vec<_> = self
            .guard
            .visits
            .iter()
            .filter(|v| v.trainer_id == Some(trainer_id))
            .cloned()
            .collect();
        visits.sort_by_key(|v| v.check_in_time);
        Ok(visits)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.committed = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Drop restores the snapshot.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_zone(&CreateGymZone {
            name: "pool".into(),
            description: None,
            capacity: 10,
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_zones().await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn commit_persists_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_zone(&CreateGymZone {
            name: "pool".into(),
            description: None,
            capacity: 10,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.list_zones().await.unwrap().len(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn decrement_stops_at_zero() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let pass = tx
            .insert_pass(
                &CreateZonePass {
                    client_id: Uuid::new_v4(),
                    gym_zone_id: 1,
                    kind: PassKind::VisitBased,
                    remaining_visits: 1,
                    end_date: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(
            tx.try_decrement_pass(pass.id, Utc::now()).await.unwrap(),
            Some(0)
        );
        assert_eq!(
            tx.try_decrement_pass(pass.id, Utc::now()).await.unwrap(),
            None
        );
        tx.commit().await.unwrap();
    }
}
