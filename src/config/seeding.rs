use std::sync::Arc;

use anyhow::Result;

use crate::models::{CreateGymZone, CreateLocker, LockerRoom};
use crate::services::locker_service;
use crate::store::Store;

/// Seeds the reference data the facility needs before it can operate:
/// the zone catalogue and the locker bank. Safe to run repeatedly.
pub struct DatabaseSeeder {
    store: Arc<dyn Store>,
}

impl DatabaseSeeder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        self.seed_zones().await?;
        self.seed_lockers().await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_zones(&self) -> Result<()> {
        let default_zones = vec![
            CreateGymZone {
                name: "Gym floor".to_string(),
                description: Some("Free weights and machines".to_string()),
                capacity: 0,
            },
            CreateGymZone {
                name: "Group room".to_string(),
                description: Some("Group classes".to_string()),
                capacity: 15,
            },
            CreateGymZone {
                name: "Pool".to_string(),
                description: None,
                capacity: 10,
            },
        ];

        let mut tx = self.store.begin().await?;
        let existing = tx.list_zones().await?;
        for zone in default_zones {
            if existing.iter().any(|z| z.name == zone.name) {
                continue;
            }
            tx.insert_zone(&zone).await?;
            tracing::info!(name = %zone.name, "Created zone");
        }
        tx.commit().await?;

        Ok(())
    }

    async fn seed_lockers(&self) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if !tx.list_lockers(None).await?.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        for n in 1..=10 {
            tx.insert_locker(
                &CreateLocker {
                    locker_number: format!("M{n:02}"),
                    gender: LockerRoom::Men,
                },
                locker_service::generate_code(),
            )
            .await?;
            tx.insert_locker(
                &CreateLocker {
                    locker_number: format!("W{n:02}"),
                    gender: LockerRoom::Women,
                },
                locker_service::generate_code(),
            )
            .await?;
        }
        tx.commit().await?;
        tracing::info!("Created locker bank");

        Ok(())
    }
}
