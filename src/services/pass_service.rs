use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::GymError;
use crate::models::{ConsumedVisit, CreateZonePass, PassKind, Principal, ZonePass};
use crate::store::{Store, StoreTx};

/// Consumption ledger: prepaid visit balances per (client, zone).
#[derive(Clone)]
pub struct PassService {
    store: Arc<dyn Store>,
}

impl PassService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Balances of a client, in the order they would be consumed.
    /// Clients may only read their own; admins may read anyone's.
    pub async fn balances(
        &self,
        principal: &Principal,
        client_id: Uuid,
    ) -> Result<Vec<ZonePass>, GymError> {
        if principal.id != client_id && !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "clients may only view their own balances",
            });
        }

        let mut tx = self.store.begin().await?;
        let passes = tx.passes_for_client(client_id).await?;
        tx.commit().await?;
        Ok(in_consumption_order(passes))
    }

    /// Administrator creation of a pass (visit-based or time-based).
    pub async fn grant(
        &self,
        principal: &Principal,
        pass: CreateZonePass,
    ) -> Result<ZonePass, GymError> {
        if !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only administrators may grant passes",
            });
        }
        if pass.remaining_visits < 0 {
            return Err(GymError::InvalidInput(
                "remaining_visits must not be negative".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        if tx.zone_by_id(pass.gym_zone_id).await?.is_none() {
            return Err(GymError::not_found("gym zone", pass.gym_zone_id));
        }
        let created = tx.insert_pass(&pass, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            client_id = %created.client_id,
            gym_zone_id = created.gym_zone_id,
            "pass granted"
        );
        Ok(created)
    }

    /// Administrator top-up of a visit-based balance.
    pub async fn top_up(
        &self,
        principal: &Principal,
        client_id: Uuid,
        gym_zone_id: i32,
        count: i32,
    ) -> Result<ZonePass, GymError> {
        if !principal.is_admin() {
            return Err(GymError::Forbidden {
                reason: "only administrators may top up balances",
            });
        }
        self.credit(client_id, gym_zone_id, count).await
    }

    /// Consume one visit for the client in the zone: the turnstile-style
    /// entry point for collaborators that meter access themselves. Picks
    /// the pass per the fixed consumption order and decrements it
    /// atomically.
    pub async fn consume(
        &self,
        client_id: Uuid,
        gym_zone_id: i32,
    ) -> Result<ConsumedVisit, GymError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let consumed =
            consume_visit(tx.as_mut(), client_id, gym_zone_id, now.date_naive(), now).await?;
        tx.commit().await?;
        Ok(consumed)
    }

    /// Credit a visit-based balance, creating the row at zero first when
    /// the client has none for the zone. This is the entry point the
    /// payment collaborator calls on confirmed payment; the caller is
    /// already trusted.
    pub async fn credit(
        &self,
        client_id: Uuid,
        gym_zone_id: i32,
        count: i32,
    ) -> Result<ZonePass, GymError> {
        if count <= 0 {
            return Err(GymError::InvalidInput("credit must be positive".into()));
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        if tx.zone_by_id(gym_zone_id).await?.is_none() {
            return Err(GymError::not_found("gym zone", gym_zone_id));
        }

        let existing = tx
            .passes_for_client_zone(client_id, gym_zone_id)
            .await?
            .into_iter()
            .find(|p| p.kind == PassKind::VisitBased);

        let pass = match existing {
            Some(pass) => tx.credit_pass(pass.id, count, now).await?,
            None => {
                let created = tx
                    .insert_pass(
                        &CreateZonePass {
                            client_id,
                            gym_zone_id,
                            kind: PassKind::VisitBased,
                            remaining_visits: 0,
                            end_date: None,
                        },
                        now,
                    )
                    .await?;
                tx.credit_pass(created.id, count, now).await?
            }
        };
        tx.commit().await?;

        tracing::info!(
            client_id = %client_id,
            gym_zone_id,
            count,
            remaining = pass.remaining_visits,
            "balance credited"
        );
        Ok(pass)
    }
}

fn kind_rank(kind: PassKind) -> u8 {
    match kind {
        PassKind::VisitBased => 0,
        PassKind::TimeBased => 1,
    }
}

/// Fixed consumption order: visit-based before time-based, then oldest
/// first, then id as the final tie-break.
fn in_consumption_order(mut passes: Vec<ZonePass>) -> Vec<ZonePass> {
    passes.sort_by_key(|p| (kind_rank(p.kind), p.created_at, p.id));
    passes
}

/// Consume one visit for the client in the zone, inside the caller's
/// transaction. Walks the client's passes in consumption order; the
/// decrement itself is conditional, so a concurrent consumer of the same
/// pass cannot make the balance go negative.
pub(crate) async fn consume_visit(
    tx: &mut dyn StoreTx,
    client_id: Uuid,
    gym_zone_id: i32,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<ConsumedVisit, GymError> {
    let passes = in_consumption_order(tx.passes_for_client_zone(client_id, gym_zone_id).await?);

    for pass in passes {
        match pass.kind {
            PassKind::VisitBased => {
                if let Some(remaining) = tx.try_decrement_pass(pass.id, now).await? {
                    return Ok(ConsumedVisit {
                        pass_id: pass.id,
                        kind: pass.kind,
                        remaining_visits: remaining,
                    });
                }
            }
            PassKind::TimeBased => {
                if pass.end_date.map_or(true, |end| end >= today) {
                    // Time-based passes admit without a decrement.
                    return Ok(ConsumedVisit {
                        pass_id: pass.id,
                        kind: pass.kind,
                        remaining_visits: pass.remaining_visits,
                    });
                }
            }
        }
    }

    Err(GymError::InsufficientBalance {
        client_id,
        gym_zone_id,
    })
}

/// Non-consuming eligibility check used at signup time.
pub(crate) async fn has_eligible_balance(
    tx: &mut dyn StoreTx,
    client_id: Uuid,
    gym_zone_id: i32,
    today: NaiveDate,
) -> Result<bool, GymError> {
    let passes = tx.passes_for_client_zone(client_id, gym_zone_id).await?;
    Ok(passes.iter().any(|p| p.is_eligible(today)))
}
