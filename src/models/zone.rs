use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A physical area of the facility with its own capacity limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GymZone {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub is_active: bool,
}

impl GymZone {
    /// Capacity of zero or less means the zone is not seat-limited.
    pub fn is_unlimited(&self) -> bool {
        self.capacity <= 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGymZone {
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
}
