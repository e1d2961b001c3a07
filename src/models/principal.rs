use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::LockerRoom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Trainer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Which changing room this client uses.
    pub fn locker_room(self) -> LockerRoom {
        match self {
            Gender::Male => LockerRoom::Men,
            Gender::Female => LockerRoom::Women,
        }
    }
}

/// Authenticated caller, produced by the auth layer outside this crate.
/// Services only check role and ownership against it; they never derive
/// permissions themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub gender: Option<Gender>,
}

impl Principal {
    pub fn client(id: Uuid, gender: Option<Gender>) -> Self {
        Self {
            id,
            role: Role::Client,
            gender,
        }
    }

    pub fn trainer(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Trainer,
            gender: None,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Admin,
            gender: None,
        }
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    pub fn is_trainer(&self) -> bool {
        self.role == Role::Trainer
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
