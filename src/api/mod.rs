pub mod attendance;
pub mod reconcile;
pub mod student;
