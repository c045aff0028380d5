pub mod snapshot;
pub mod tracker;
pub mod runner;
pub mod controller;

pub use snapshot::{DepartureStatus, EnemyStatus, EntryStatus, NextEvent, SessionState, Snapshot, TargetStatus};
pub use tracker::DepartureTracker;
pub use runner::run_session;
pub use controller::RallyController;
