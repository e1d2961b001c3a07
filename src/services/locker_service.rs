use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::error::GymError;
use crate::models::{CreateLocker, Locker, LockerRoom, Principal};
use crate::store::{Store, StoreTx};

/// Exclusive locker pool, partitioned by changing room.
#[derive(Clone)]
pub struct LockerService {
    store: Arc<dyn Store>,
}

impl LockerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Assign the lowest-numbered free locker of the room to the client.
    /// Returns `None` when the room is full; the caller treats that as
    /// entry without a locker, not as a failure.
    pub async fn assign(
        &self,
        principal: &Principal,
        room: LockerRoom,
    ) -> Result<Option<Locker>, GymError> {
        if !principal.is_client() {
            return Err(GymError::Forbidden {
                reason: "only clients are assigned lockers",
            });
        }

        let mut tx = self.store.begin().await?;
        let locker = assign_in_tx(tx.as_mut(), principal.id, room).await?;
        tx.commit().await?;

        if let Some(locker) = &locker {
            tracing::info!(locker_id = locker.id, client_id = %principal.id, "locker assigned");
        }
        Ok(locker)
    }

    /// Free a locker. Idempotent: releasing a free locker just rotates
    /// its code again, so a leaked old code cannot reopen it.
    pub async fn release(&self, principal: &Principal, locker_id: i32) -> Result<Locker, GymError> {
        let mut tx = self.store.begin().await?;
        let locker = tx
            .locker_by_id(locker_id)
            .await?
            .ok_or_else(|| GymError::not_found("locker", locker_id))?;

        let holder = locker.occupied_by;
        if !principal.is_admin() && holder != Some(principal.id) {
            return Err(GymError::Forbidden {
                reason: "only the holder or an administrator may release a locker",
            });
        }

        let released = tx
            .release_locker(locker_id, generate_code())
            .await?
            .ok_or_else(|| GymError::not_found("locker", locker_id))?;
        tx.commit().await?;

        tracing::info!(locker_id, "locker released");
        Ok(released)
    }

    /// The locker currently held by the client, if any.
    pub async fn held_by(&self, principal: &Principal, client_id: Uuid) -> Result<Option<Locker>, GymError> {
        if principal.id != client_id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "clients may only view their own locker",
            });
        }

        let mut tx = self.store.begin().await?;
        let locker = tx.locker_held_by(client_id).await?;
        tx.commit().await?;
        Ok(locker)
    }

    pub async fn list(&self, room: Option<LockerRoom>) -> Result<Vec<Locker>, GymError> {
        let mut tx = self.store.begin().await?;
        let lockers = tx.list_lockers(room).await?;
        tx.commit().await?;
        Ok(lockers)
    }

    /// Provision a new locker (done once, at setup time).
    pub async fn provision(
        &self,
        principal: &Principal,
        locker: CreateLocker,
    ) -> Result<Locker, GymError> {
        if !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only administrators may provision lockers",
            });
        }

        let mut tx = self.store.begin().await?;
        let created = tx.insert_locker(&locker, generate_code()).await?;
        tx.commit().await?;
        Ok(created)
    }
}

/// Claim a locker inside the caller's transaction. Enforces the
/// one-locker-per-client rule before touching the pool.
pub(crate) async fn assign_in_tx(
    tx: &mut dyn StoreTx,
    client_id: Uuid,
    room: LockerRoom,
) -> Result<Option<Locker>, GymError> {
    if let Some(held) = tx.locker_held_by(client_id).await? {
        return Err(GymError::AlreadyHoldingResource {
            client_id,
            locker_id: held.id,
        });
    }
    Ok(tx
        .claim_free_locker(room, client_id, generate_code(), Utc::now())
        .await?)
}

/// Fresh 4-digit access code. Codes are rotated on every assign and
/// release; collisions across different lockers are tolerated since a
/// code is only ever presented together with its locker number.
pub(crate) fn generate_code() -> i32 {
    rand::thread_rng().gen_range(1000..=9999)
}
