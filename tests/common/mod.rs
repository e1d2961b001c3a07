// Shared test fixture: every service wired over one in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use gymkeeper::models::{
    CreateGymZone, CreateLocker, CreateZonePass, GymZone, Locker, LockerRoom, PassKind, Principal,
    ZonePass,
};
use gymkeeper::services::{
    AttendanceService, GymService, LockerService, PassService, ScheduleService, SessionService,
};
use gymkeeper::store::{MemoryStore, Store};

pub struct TestGym {
    pub store: Arc<dyn Store>,
    pub sessions: SessionService,
    pub passes: PassService,
    pub lockers: LockerService,
    pub gym: GymService,
    pub schedule: ScheduleService,
    pub attendance: AttendanceService,
    pub admin: Principal,
}

impl TestGym {
    pub fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        Self {
            sessions: SessionService::new(store.clone()),
            passes: PassService::new(store.clone()),
            lockers: LockerService::new(store.clone()),
            gym: GymService::new(store.clone()),
            schedule: ScheduleService::new(store.clone()),
            attendance: AttendanceService::new(store.clone()),
            admin: Principal::admin(Uuid::new_v4()),
            store,
        }
    }

    pub async fn add_zone(&self, name: &str, capacity: i32) -> GymZone {
        let mut tx = self.store.begin().await.unwrap();
        let zone = tx
            .insert_zone(&CreateGymZone {
                name: name.to_string(),
                description: None,
                capacity,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        zone
    }

    pub async fn add_lockers(&self, room: LockerRoom, count: usize) -> Vec<Locker> {
        let mut lockers = Vec::with_capacity(count);
        for n in 0..count {
            let locker = self
                .lockers
                .provision(
                    &self.admin,
                    CreateLocker {
                        locker_number: format!("{room:?}-{n}"),
                        gender: room,
                    },
                )
                .await
                .unwrap();
            lockers.push(locker);
        }
        lockers
    }

    pub async fn give_visits(&self, client_id: Uuid, gym_zone_id: i32, count: i32) -> ZonePass {
        self.passes
            .credit(client_id, gym_zone_id, count)
            .await
            .unwrap()
    }

    pub async fn give_time_pass(
        &self,
        client_id: Uuid,
        gym_zone_id: i32,
        end_date: Option<NaiveDate>,
    ) -> ZonePass {
        self.passes
            .grant(
                &self.admin,
                CreateZonePass {
                    client_id,
                    gym_zone_id,
                    kind: PassKind::TimeBased,
                    remaining_visits: 0,
                    end_date,
                },
            )
            .await
            .unwrap()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> chrono::NaiveTime {
    chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap()
}
