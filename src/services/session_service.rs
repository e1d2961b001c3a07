use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::error::GymError;
use crate::models::{
    find_conflict, CompletionSummary, CreateTrainingSession, CreateVisit, Principal, Role,
    SessionWithRoster, TrainingSession, VisitType,
};
use crate::services::pass_service;
use crate::store::{Store, StoreTx};

/// Lifecycle of one-off training sessions: create (conflict-checked),
/// signup (capacity- and balance-gated), cancel, and one-time completion
/// that settles the ledger and the attendance log for every participant.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        data: CreateTrainingSession,
    ) -> Result<TrainingSession, GymError> {
        if !principal.is_trainer() {
            return Err(GymError::Forbidden {
                reason: "only trainers may schedule sessions",
            });
        }
        if data.start_time >= data.end_time {
            return Err(GymError::InvalidInput(
                "start time must be before end time".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        if let Some(zone_id) = data.gym_zone_id {
            tx.zone_by_id(zone_id)
                .await?
                .filter(|z| z.is_active)
                .ok_or_else(|| GymError::not_found("gym zone", zone_id))?;
        }

        check_session_conflicts(tx.as_mut(), principal.id, &data, None).await?;

        let session = TrainingSession {
            id: Uuid::new_v4(),
            trainer_id: principal.id,
            gym_zone_id: data.gym_zone_id,
            session_date: data.session_date,
            start_time: data.start_time,
            end_time: data.end_time,
            is_cancelled: false,
            is_completed: false,
            cancellation_reason: None,
            cancelled_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        let session = tx.insert_session(&session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            trainer_id = %principal.id,
            date = %session.session_date,
            "session scheduled"
        );
        Ok(session)
    }

    /// Sessions on a date, start time ascending. Trainers see only their
    /// own sessions along with the roster; clients see every session with
    /// the participant count only.
    pub async fn list_on(
        &self,
        principal: &Principal,
        date: NaiveDate,
        gym_zone_id: Option<i32>,
    ) -> Result<Vec<SessionWithRoster>, GymError> {
        let mut tx = self.store.begin().await?;
        let sessions = tx.sessions_on(date, gym_zone_id).await?;

        let mut result = Vec::with_capacity(sessions.len());
        for session in sessions {
            if principal.role == Role::Trainer && session.trainer_id != principal.id {
                continue;
            }
            let participants = tx.participants_of(session.id).await?;
            let participants_count = participants.len() as i64;
            let roster = if principal.role == Role::Trainer || principal.role == Role::Admin {
                participants.iter().map(|p| p.client_id).collect()
            } else {
                Vec::new()
            };
            result.push(SessionWithRoster {
                session,
                participants_count,
                participants: roster,
            });
        }
        tx.commit().await?;
        Ok(result)
    }

    /// Enroll the client. The capacity check and the insert share one
    /// transaction holding the session row lock, so two signups racing
    /// for the last seat serialize.
    pub async fn signup(&self, principal: &Principal, session_id: Uuid) -> Result<(), GymError> {
        if !principal.is_client() {
            return Err(GymError::Forbidden {
                reason: "only clients may sign up for sessions",
            });
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let session = tx
            .session_for_update(session_id)
            .await?
            .ok_or_else(|| GymError::not_found("session", session_id))?;

        if session.is_cancelled {
            return Err(GymError::AlreadyCancelled {
                id: session_id.to_string(),
            });
        }
        if session.is_completed {
            return Err(GymError::AlreadyCompleted { session_id });
        }
        if tx.participant_exists(session_id, principal.id).await? {
            return Err(GymError::InvalidInput(
                "client is already signed up for this session".into(),
            ));
        }

        if let Some(zone_id) = session.gym_zone_id {
            let zone = tx
                .zone_by_id(zone_id)
                .await?
                .ok_or_else(|| GymError::not_found("gym zone", zone_id))?;
            if !zone.is_unlimited() {
                let count = tx.count_participants(session_id).await?;
                if count >= i64::from(zone.capacity) {
                    return Err(GymError::CapacityExceeded {
                        capacity: zone.capacity,
                    });
                }
            }

            // The ledger only validates here; the deduction happens at
            // completion time.
            if !pass_service::has_eligible_balance(
                tx.as_mut(),
                principal.id,
                zone_id,
                now.date_naive(),
            )
            .await?
            {
                return Err(GymError::InsufficientBalance {
                    client_id: principal.id,
                    gym_zone_id: zone_id,
                });
            }
        }

        tx.insert_participant(session_id, principal.id, now).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, client_id = %principal.id, "client signed up");
        Ok(())
    }

    pub async fn cancel(
        &self,
        principal: &Principal,
        session_id: Uuid,
        reason: &str,
    ) -> Result<TrainingSession, GymError> {
        let mut tx = self.store.begin().await?;
        let session = tx
            .session_for_update(session_id)
            .await?
            .ok_or_else(|| GymError::not_found("session", session_id))?;

        if session.trainer_id != principal.id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only the owning trainer may cancel a session",
            });
        }
        if session.is_cancelled {
            return Err(GymError::AlreadyCancelled {
                id: session_id.to_string(),
            });
        }
        if session.is_completed {
            return Err(GymError::AlreadyCompleted { session_id });
        }

        let now = Utc::now();
        tx.set_session_cancelled(session_id, reason, now).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, "session cancelled");
        Ok(TrainingSession {
            is_cancelled: true,
            cancellation_reason: Some(reason.to_string()),
            cancelled_at: Some(now),
            ..session
        })
    }

    /// Complete a session once: charge every signed-up participant one
    /// visit and write their attendance records, then seal the session.
    ///
    /// The session row lock plus the re-check of `is_completed` make a
    /// concurrent second call wait and then fail; the per-participant
    /// attendance guard makes a re-run after a partial historical state
    /// skip clients who were already charged. Participants whose balance
    /// cannot cover the visit are collected and reported, never fatal.
    pub async fn complete(
        &self,
        principal: &Principal,
        session_id: Uuid,
    ) -> Result<CompletionSummary, GymError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let session = tx
            .session_for_update(session_id)
            .await?
            .ok_or_else(|| GymError::not_found("session", session_id))?;

        if session.trainer_id != principal.id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only the owning trainer may complete a session",
            });
        }
        if session.is_cancelled {
            return Err(GymError::AlreadyCancelled {
                id: session_id.to_string(),
            });
        }
        if session.is_completed {
            return Err(GymError::AlreadyCompleted { session_id });
        }

        let participants = tx.participants_of(session_id).await?;
        if participants.is_empty() {
            return Err(GymError::NothingToComplete { session_id });
        }

        let check_in = session_instant(session.session_date, session.start_time);
        let check_out = session_instant(session.session_date, session.end_time);

        let mut summary = CompletionSummary {
            session_id,
            charged: 0,
            skipped: 0,
            failed_clients: Vec::new(),
        };

        for participant in &participants {
            if tx
                .session_visit_exists(participant.client_id, session_id)
                .await?
            {
                summary.skipped += 1;
                continue;
            }

            if let Some(zone_id) = session.gym_zone_id {
                match pass_service::consume_visit(
                    tx.as_mut(),
                    participant.client_id,
                    zone_id,
                    session.session_date,
                    now,
                )
                .await
                {
                    Ok(_) => {}
                    Err(GymError::InsufficientBalance { .. }) => {
                        summary.failed_clients.push(participant.client_id);
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            }

            tx.insert_visit(&CreateVisit {
                client_id: participant.client_id,
                trainer_id: Some(session.trainer_id),
                training_session_id: Some(session_id),
                visit_type: VisitType::Training,
                check_in_time: check_in,
                check_out_time: Some(check_out),
            })
            .await?;
            summary.charged += 1;
        }

        tx.set_session_completed(session_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            charged = summary.charged,
            skipped = summary.skipped,
            failed = summary.failed_clients.len(),
            "session completed"
        );
        if !summary.failed_clients.is_empty() {
            tracing::warn!(
                session_id = %session_id,
                clients = ?summary.failed_clients,
                "participants could not be charged"
            );
        }
        Ok(summary)
    }
}

/// The session's own date and times are authoritative for the derived
/// attendance records.
fn session_instant(date: NaiveDate, time: NaiveTime) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// A session must not overlap another non-cancelled session of the same
/// trainer, nor (when bound to a zone) another session in that zone.
async fn check_session_conflicts(
    tx: &mut dyn StoreTx,
    trainer_id: Uuid,
    data: &CreateTrainingSession,
    exclude: Option<Uuid>,
) -> Result<(), GymError> {
    let trainer_sessions = tx
        .sessions_for_trainer_on(trainer_id, data.session_date)
        .await?;
    let trainer_axis = trainer_sessions
        .iter()
        .map(|s| (s.id, s.start_time, s.end_time, s.is_cancelled));
    if let Some(blocking) = find_conflict(data.start_time, data.end_time, trainer_axis, exclude) {
        return Err(GymError::ScheduleConflict {
            blocking_id: blocking.to_string(),
        });
    }

    if let Some(zone_id) = data.gym_zone_id {
        let zone_sessions = tx.sessions_in_zone_on(zone_id, data.session_date).await?;
        let zone_axis = zone_sessions
            .iter()
            .map(|s| (s.id, s.start_time, s.end_time, s.is_cancelled));
        if let Some(blocking) = find_conflict(data.start_time, data.end_time, zone_axis, exclude) {
            return Err(GymError::ScheduleConflict {
                blocking_id: blocking.to_string(),
            });
        }
    }

    Ok(())
}
