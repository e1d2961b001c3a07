//! Resource scheduling and consumption-ledger core of the gym platform:
//! conflict-checked session scheduling, capacity-gated signup, prepaid
//! visit balances, exclusive locker allocation and append-only
//! attendance records, all coordinated through one transactional store
//! boundary.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::GymError;
