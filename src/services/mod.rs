// Business logic services

pub mod attendance_service;
pub mod gym_service;
pub mod locker_service;
pub mod pass_service;
pub mod schedule_service;
pub mod session_service;

pub use attendance_service::AttendanceService;
pub use gym_service::GymService;
pub use locker_service::LockerService;
pub use pass_service::PassService;
pub use schedule_service::ScheduleService;
pub use session_service::SessionService;
