//! Serializable per-tick view of a session, handed to whatever renders it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{Mode, Plan, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Pre-countdown before the start locks; nothing advances yet
    Armed { countdown: u32 },
    Running,
    Complete,
    Cancelled,
}

impl SessionState {
    /// Whether a run task is (or should be) driving the session
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Armed { .. } | SessionState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureStatus {
    Waiting,
    Departed,
    Late,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStatus {
    pub participant: String,
    pub role: Role,
    pub travel_seconds: u32,
    pub wait_seconds: i64,
    pub status: DepartureStatus,
    /// Whole seconds until departure, rounded up; 0 once departed or late
    pub remaining_seconds: i64,
    /// Wall-clock departure, known once the start has locked
    pub departs_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyStatus {
    pub remaining_seconds: i64,
    pub impacted: bool,
    pub impacts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub target_name: String,
    pub mode: Mode,
    pub impact_seconds: u32,
    pub entries: Vec<EntryStatus>,
    pub enemy_status: Option<EnemyStatus>,
}

/// The departure due soonest across all targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextEvent {
    pub participant: String,
    pub target: String,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_state: SessionState,
    pub per_target: Vec<TargetStatus>,
    pub overall_next_event: Option<NextEvent>,
    pub locked_at: Option<DateTime<Utc>>,
    /// Time since lock; 0 before the session runs
    pub elapsed_ms: u64,
}

impl Snapshot {
    /// Static view of the plans: everyone waiting their full wait (late entries as Late)
    pub fn preview(plans: &[Plan], session_state: SessionState) -> Self {
        let per_target: Vec<TargetStatus> = plans
            .iter()
            .map(|plan| TargetStatus {
                target_name: plan.target.name.clone(),
                mode: plan.target.mode,
                impact_seconds: plan.impact_seconds,
                entries: plan
                    .entries
                    .iter()
                    .map(|e| EntryStatus {
                        participant: e.participant_id.clone(),
                        role: e.role,
                        travel_seconds: e.travel_seconds,
                        wait_seconds: e.wait_seconds,
                        status: DepartureStatus::Waiting,
                        remaining_seconds: e.wait_seconds,
                        departs_at: None,
                    })
                    .chain(plan.late.iter().map(late_status))
                    .collect(),
                enemy_status: plan.enemy_impact_seconds().map(|secs| EnemyStatus {
                    remaining_seconds: i64::from(secs),
                    impacted: false,
                    impacts_at: None,
                }),
            })
            .collect();

        let overall_next_event = next_event(&per_target);
        Self {
            session_state,
            per_target,
            overall_next_event,
            locked_at: None,
            elapsed_ms: 0,
        }
    }

    /// Same content with a different state (used for the cancelled frame)
    pub fn with_state(mut self, session_state: SessionState) -> Self {
        self.session_state = session_state;
        self
    }

    pub fn departed_count(&self) -> usize {
        self.per_target
            .iter()
            .flat_map(|t| &t.entries)
            .filter(|e| e.status == DepartureStatus::Departed)
            .count()
    }
}

pub(crate) fn late_status(entry: &crate::schedule::ScheduleEntry) -> EntryStatus {
    EntryStatus {
        participant: entry.participant_id.clone(),
        role: entry.role,
        travel_seconds: entry.travel_seconds,
        wait_seconds: entry.wait_seconds,
        status: DepartureStatus::Late,
        remaining_seconds: 0,
        departs_at: None,
    }
}

/// Minimum remaining among waiting entries; ties go to the earlier target, then the earlier entry
pub(crate) fn next_event(per_target: &[TargetStatus]) -> Option<NextEvent> {
    let mut best: Option<NextEvent> = None;
    for target in per_target {
        for entry in target.entries.iter().filter(|e| e.status == DepartureStatus::Waiting) {
            if best
                .as_ref()
                .map_or(true, |b| entry.remaining_seconds < b.remaining_seconds)
            {
                best = Some(NextEvent {
                    participant: entry.participant.clone(),
                    target: target.target_name.clone(),
                    remaining_seconds: entry.remaining_seconds,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{build_plan, CapacityPolicy, Participant, Target};

    #[test]
    fn test_preview_lists_late_entries_last() {
        let participants = vec![Participant::new("near", 45), Participant::new("far", 400)];
        let plan = build_plan(&Target::defense("Keep", 300, 30), &participants, None, CapacityPolicy::default()).unwrap();

        let snapshot = Snapshot::preview(&[plan], SessionState::Idle);
        let keep = &snapshot.per_target[0];
        assert_eq!(keep.entries.len(), 2);
        assert_eq!(keep.entries[0].status, DepartureStatus::Waiting);
        assert_eq!(keep.entries[0].remaining_seconds, 286);
        assert_eq!(keep.entries[1].status, DepartureStatus::Late);
        assert_eq!(
            keep.enemy_status,
            Some(EnemyStatus {
                remaining_seconds: 331,
                impacted: false,
                impacts_at: None
            })
        );
        assert_eq!(snapshot.overall_next_event.unwrap().participant, "near");
    }

    #[test]
    fn test_next_event_ties_prefer_earlier_target() {
        let a = build_plan(&Target::attack("A"), &[Participant::new("a1", 30)], None, CapacityPolicy::default()).unwrap();
        let b = build_plan(&Target::attack("B"), &[Participant::new("b1", 90)], None, CapacityPolicy::default()).unwrap();

        let snapshot = Snapshot::preview(&[a, b], SessionState::Idle);
        let next = snapshot.overall_next_event.unwrap();
        assert_eq!(next.target, "A");
        assert_eq!(next.remaining_seconds, 0);
    }

    #[test]
    fn test_session_state_serializes_with_tag() {
        let json = serde_json::to_value(SessionState::Armed { countdown: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "armed", "countdown": 3}));
    }
}
