pub mod types;
pub mod impact;
pub mod builder;
pub mod allocator;
pub mod planner;

pub use types::{Mode, Participant, Plan, Role, ScheduleEntry, Target, DEFENSE_BUFFER_SECS};
pub use impact::{compute_impact, target_impact};
pub use builder::{build_plan, CapacityPolicy};
pub use allocator::{allocate, retain_live_overrides, Allocation, Overrides, TargetAssignment};
pub use planner::{plan_targets, PlanRequest, PlanSet};
