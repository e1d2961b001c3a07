// Data models shared by the services and the store backends

pub mod locker;
pub mod pass;
pub mod principal;
pub mod schedule;
pub mod visit;
pub mod zone;

pub use locker::*;
pub use pass::*;
pub use principal::*;
pub use schedule::*;
pub use visit::*;
pub use zone::*;
