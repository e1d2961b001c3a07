use std::sync::Arc;

use chrono::Utc;

use crate::error::GymError;
use crate::models::{GymEntry, GymExit, GymStatus, PassKind, Principal};
use crate::services::{attendance_service, locker_service, pass_service};
use crate::store::Store;

/// Direct gym entry and exit: one transaction ties together the ledger
/// deduction, the locker claim and the attendance record, so a failed
/// step leaves nothing behind.
#[derive(Clone)]
pub struct GymService {
    store: Arc<dyn Store>,
}

impl GymService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn enter(&self, principal: &Principal, gym_zone_id: i32) -> Result<GymEntry, GymError> {
        if !principal.is_client() {
            return Err(GymError::Forbidden {
                reason: "only clients may enter the gym",
            });
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let zone = tx
            .zone_by_id(gym_zone_id)
            .await?
            .filter(|z| z.is_active)
            .ok_or_else(|| GymError::not_found("gym zone", gym_zone_id))?;

        if tx.open_direct_visit(principal.id).await?.is_some() {
            return Err(GymError::AlreadyInside {
                client_id: principal.id,
            });
        }

        let consumed = pass_service::consume_visit(
            tx.as_mut(),
            principal.id,
            zone.id,
            now.date_naive(),
            now,
        )
        .await?;

        // No free locker is not a failure; the client enters without one.
        let locker = match principal.gender {
            Some(gender) => {
                locker_service::assign_in_tx(tx.as_mut(), principal.id, gender.locker_room())
                    .await?
            }
            None => None,
        };

        let visit = attendance_service::record_check_in(tx.as_mut(), principal.id, now).await?;
        tx.commit().await?;

        tracing::info!(
            client_id = %principal.id,
            gym_zone_id,
            locker_id = locker.as_ref().map(|l| l.id),
            remaining = consumed.remaining_visits,
            "client entered"
        );
        Ok(GymEntry {
            visit,
            locker,
            consumed,
        })
    }

    pub async fn exit(&self, principal: &Principal) -> Result<GymExit, GymError> {
        if !principal.is_client() {
            return Err(GymError::Forbidden {
                reason: "only clients may exit the gym",
            });
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        // Closing the visit fails with NoOpenVisit when the client is not
        // inside; the rollback then also undoes the locker release.
        if let Some(held) = tx.locker_held_by(principal.id).await? {
            tx.release_locker(held.id, locker_service::generate_code())
                .await?;
        }

        let visit = attendance_service::record_check_out(tx.as_mut(), principal.id, now).await?;
        tx.commit().await?;

        let duration_seconds = visit.duration_seconds().unwrap_or(0);
        tracing::info!(client_id = %principal.id, duration_seconds, "client left");
        Ok(GymExit {
            visit,
            duration_seconds,
        })
    }

    pub async fn status(&self, principal: &Principal) -> Result<GymStatus, GymError> {
        if !principal.is_client() {
            return Err(GymError::Forbidden {
                reason: "only clients have a gym status",
            });
        }

        let mut tx = self.store.begin().await?;
        let in_gym = tx.open_direct_visit(principal.id).await?.is_some();
        let locker = tx.locker_held_by(principal.id).await?;
        let visits_remaining = tx
            .passes_for_client(principal.id)
            .await?
            .iter()
            .filter(|p| p.kind == PassKind::VisitBased)
            .map(|p| i64::from(p.remaining_visits))
            .sum();
        tx.commit().await?;

        Ok(GymStatus {
            in_gym,
            locker,
            visits_remaining,
        })
    }
}
