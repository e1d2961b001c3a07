use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::GymError;
use crate::models::{
    find_conflict, CreateTrainerSchedule, Principal, TrainerSchedule, UpdateTrainerSchedule,
};
use crate::store::{Store, StoreTx};

/// Trainer recurring weekly availability.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn Store>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_slot(
        &self,
        principal: &Principal,
        slot: CreateTrainerSchedule,
    ) -> Result<TrainerSchedule, GymError> {
        if !principal.is_trainer() {
            return Err(GymError::Forbidden {
                reason: "only trainers may create availability slots",
            });
        }
        validate_slot_times(slot.day_of_week, slot.start_time, slot.end_time)?;

        let mut tx = self.store.begin().await?;
        if let Some(zone_id) = slot.gym_zone_id {
            tx.zone_by_id(zone_id)
                .await?
                .filter(|z| z.is_active)
                .ok_or_else(|| GymError::not_found("gym zone", zone_id))?;
        }

        check_slot_conflicts(tx.as_mut(), principal.id, &slot, None).await?;

        let created = tx.insert_slot(principal.id, &slot).await?;
        tx.commit().await?;

        tracing::info!(slot_id = created.id, trainer_id = %principal.id, "availability slot created");
        Ok(created)
    }

    pub async fn update_slot(
        &self,
        principal: &Principal,
        slot_id: i32,
        update: UpdateTrainerSchedule,
    ) -> Result<TrainerSchedule, GymError> {
        let mut tx = self.store.begin().await?;
        let mut slot = tx
            .slot_by_id(slot_id)
            .await?
            .ok_or_else(|| GymError::not_found("schedule slot", slot_id))?;

        if slot.trainer_id != principal.id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only the owning trainer may update a slot",
            });
        }
        if slot.is_cancelled {
            return Err(GymError::AlreadyCancelled {
                id: slot_id.to_string(),
            });
        }

        if let Some(day) = update.day_of_week {
            slot.day_of_week = day;
        }
        if let Some(start) = update.start_time {
            slot.start_time = start;
        }
        if let Some(end) = update.end_time {
            slot.end_time = end;
        }
        if let Some(zone_id) = update.gym_zone_id {
            tx.zone_by_id(zone_id)
                .await?
                .filter(|z| z.is_active)
                .ok_or_else(|| GymError::not_found("gym zone", zone_id))?;
            slot.gym_zone_id = Some(zone_id);
        }
        validate_slot_times(slot.day_of_week, slot.start_time, slot.end_time)?;

        // Re-check against all other slots.
        let candidate = CreateTrainerSchedule {
            day_of_week: slot.day_of_week,
            start_time: slot.start_time,
            end_time: slot.end_time,
            gym_zone_id: slot.gym_zone_id,
        };
        check_slot_conflicts(tx.as_mut(), slot.trainer_id, &candidate, Some(slot_id)).await?;

        tx.update_slot(&slot).await?;
        tx.commit().await?;
        Ok(slot)
    }

    pub async fn cancel_slot(
        &self,
        principal: &Principal,
        slot_id: i32,
        reason: &str,
    ) -> Result<TrainerSchedule, GymError> {
        let mut tx = self.store.begin().await?;
        let mut slot = tx
            .slot_by_id(slot_id)
            .await?
            .ok_or_else(|| GymError::not_found("schedule slot", slot_id))?;

        if slot.trainer_id != principal.id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only the owning trainer may cancel a slot",
            });
        }
        if slot.is_cancelled {
            return Err(GymError::AlreadyCancelled {
                id: slot_id.to_string(),
            });
        }

        slot.is_cancelled = true;
        slot.cancelled_at = Some(Utc::now());
        slot.cancellation_reason = Some(reason.to_string());
        tx.update_slot(&slot).await?;
        tx.commit().await?;

        tracing::info!(slot_id, trainer_id = %slot.trainer_id, "availability slot cancelled");
        Ok(slot)
    }

    pub async fn slots_for_trainer(
        &self,
        trainer_id: Uuid,
    ) -> Result<Vec<TrainerSchedule>, GymError> {
        let mut tx = self.store.begin().await?;
        let slots = tx.slots_for_trainer(trainer_id).await?;
        tx.commit().await?;
        Ok(slots)
    }

    /// Working, non-cancelled slots that apply on a calendar date,
    /// optionally narrowed to one zone. Ordered by start time.
    pub async fn available_slots_for_date(
        &self,
        date: NaiveDate,
        gym_zone_id: Option<i32>,
    ) -> Result<Vec<TrainerSchedule>, GymError> {
        let day_of_week = date.weekday().num_days_from_monday() as i16;

        let mut tx = self.store.begin().await?;
        let slots = tx.slots_on_day(day_of_week).await?;
        tx.commit().await?;

        Ok(slots
            .into_iter()
            .filter(|s| {
                s.is_working
                    && !s.is_cancelled
                    && gym_zone_id.map_or(true, |z| s.gym_zone_id == Some(z))
            })
            .collect())
    }
}

fn validate_slot_times(
    day_of_week: i16,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
) -> Result<(), GymError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(GymError::InvalidInput(format!(
            "day_of_week must be 0-6, got {day_of_week}"
        )));
    }
    if start >= end {
        return Err(GymError::InvalidInput(
            "start time must be before end time".into(),
        ));
    }
    Ok(())
}

/// Reject the candidate slot when it overlaps another non-cancelled slot
/// on the trainer axis, or on the zone axis when a zone is set.
async fn check_slot_conflicts(
    tx: &mut dyn StoreTx,
    trainer_id: Uuid,
    candidate: &CreateTrainerSchedule,
    exclude: Option<i32>,
) -> Result<(), GymError> {
    let same_day = tx.slots_on_day(candidate.day_of_week).await?;

    let trainer_axis = same_day
        .iter()
        .filter(|s| s.trainer_id == trainer_id)
        .map(|s| (s.id, s.start_time, s.end_time, s.is_cancelled));
    if let Some(blocking) = find_conflict(
        candidate.start_time,
        candidate.end_time,
        trainer_axis,
        exclude,
    ) {
        return Err(GymError::ScheduleConflict {
            blocking_id: blocking.to_string(),
        });
    }

    if let Some(zone_id) = candidate.gym_zone_id {
        let zone_axis = same_day
            .iter()
            .filter(|s| s.gym_zone_id == Some(zone_id))
            .map(|s| (s.id, s.start_time, s.end_time, s.is_cancelled));
        if let Some(blocking) = find_conflict(
            candidate.start_time,
            candidate.end_time,
            zone_axis,
            exclude,
        ) {
            return Err(GymError::ScheduleConflict {
                blocking_id: blocking.to_string(),
            });
        }
    }

    Ok(())
}
