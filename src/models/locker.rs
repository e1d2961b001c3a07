use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Changing-room partition a locker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LockerRoom {
    Men,
    Women,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LockerStatus {
    Free,
    Occupied,
}

/// Exclusive physical locker, held by at most one client at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Locker {
    pub id: i32,
    pub locker_number: String,
    pub gender: LockerRoom,
    pub status: LockerStatus,
    pub code: i32,
    pub occupied_by: Option<Uuid>,
    pub occupied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLocker {
    pub locker_number: String,
    pub gender: LockerRoom,
}
