use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GymError;
use crate::models::{CreateVisit, Principal, Visit, VisitType};
use crate::store::{Store, StoreTx};

/// Append-only attendance log. Direct-entry records are opened by
/// check-in and closed exactly once by check-out; session-derived
/// records are written closed by session completion and never change.
#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn Store>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Visit history of a client, check-in time ascending.
    pub async fn history_for_client(
        &self,
        principal: &Principal,
        client_id: Uuid,
    ) -> Result<Vec<Visit>, GymError> {
        if principal.id != client_id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "clients may only view their own attendance history",
            });
        }

        let mut tx = self.store.begin().await?;
        let visits = tx.visits_for_client(client_id).await?;
        tx.commit().await?;
        Ok(visits)
    }

    /// Visits conducted by a trainer, check-in time ascending.
    pub async fn history_for_trainer(
        &self,
        principal: &Principal,
        trainer_id: Uuid,
    ) -> Result<Vec<Visit>, GymError> {
        if principal.id != trainer_id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "trainers may only view their own attendance history",
            });
        }

        let mut tx = self.store.begin().await?;
        let visits = tx.visits_for_trainer(trainer_id).await?;
        tx.commit().await?;
        Ok(visits)
    }
}

/// Open a direct-entry record for the client. At most one can be open at
/// a time.
pub(crate) async fn record_check_in(
    tx: &mut dyn StoreTx,
    client_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Visit, GymError> {
    if tx.open_direct_visit(client_id).await?.is_some() {
        return Err(GymError::AlreadyInside { client_id });
    }
    Ok(tx
        .insert_visit(&CreateVisit {
            client_id,
            trainer_id: None,
            training_session_id: None,
            visit_type: VisitType::Gym,
            check_in_time: now,
            check_out_time: None,
        })
        .await?)
}

/// Close the client's open direct-entry record.
pub(crate) async fn record_check_out(
    tx: &mut dyn StoreTx,
    client_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Visit, GymError> {
    let open = tx
        .open_direct_visit(client_id)
        .await?
        .ok_or(GymError::NoOpenVisit { client_id })?;
    Ok(tx.close_visit(open.id, now).await?)
}
