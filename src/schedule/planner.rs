use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RallyError, ScheduleError};
use super::allocator::{allocate, Allocation, Overrides};
use super::builder::{build_plan, CapacityPolicy};
use super::types::{Participant, Plan, Target};

/// Inputs of one recomputation pass. The roster is a snapshot; it is never re-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub targets: Vec<Target>,
    pub roster: Vec<Participant>,
    #[serde(default)]
    pub overrides: Overrides,
    /// Auto-pick count (single target) or per-target cap (waterfall)
    #[serde(default)]
    pub per_target_cap: Option<usize>,
}

/// Every plan of a recomputation, plus who was left out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSet {
    pub plans: Vec<Plan>,
    /// Present when the waterfall allocator partitioned the roster
    pub allocation: Option<Allocation>,
    /// Roster ids not assigned to any plan (reserves)
    pub unassigned: Vec<String>,
}

impl PlanSet {
    /// Number of entries that will actually march
    pub fn scheduled_count(&self) -> usize {
        self.plans.iter().map(|p| p.entries.len()).sum()
    }
}

/// Resolves targets against the roster
///
/// A lone target with no saved override is built straight from the roster with
/// the capacity rule. Anything else goes through the waterfall allocator and
/// each target is built from its assigned set.
pub fn plan_targets(request: &PlanRequest, policy: CapacityPolicy) -> Result<PlanSet, RallyError> {
    let targets = &request.targets;
    if targets.is_empty() {
        return Err(ScheduleError::NoTargets.into());
    }
    let mut names = HashSet::new();
    for target in targets {
        if !names.insert(target.name.as_str()) {
            return Err(ScheduleError::DuplicateTarget {
                name: target.name.clone(),
            }
            .into());
        }
    }

    // Ids must be unique across the shared roster before anything is picked from it
    let mut ids = HashSet::new();
    for p in &request.roster {
        if !ids.insert(p.id.as_str()) {
            let target = targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
            return Err(ScheduleError::DuplicateParticipant {
                target,
                participant: p.id.clone(),
            }
            .into());
        }
    }

    if let [target] = targets.as_slice() {
        if !request.overrides.contains_key(&target.name) {
            let plan = build_plan(target, &request.roster, request.per_target_cap, policy)?;
            let unassigned = plan.reserves.iter().map(|p| p.id.clone()).collect();
            return Ok(PlanSet {
                plans: vec![plan],
                allocation: None,
                unassigned,
            });
        }
    }

    let cap = request.per_target_cap.unwrap_or(request.roster.len());
    let allocation = allocate(targets, &request.roster, &request.overrides, cap)?;

    let by_id: HashMap<&str, &Participant> = request
        .roster
        .iter()
        .map(|p| (p.id.as_str(), p))
        .collect();

    let mut plans = Vec::with_capacity(targets.len());
    for (target, assignment) in targets.iter().zip(&allocation.targets) {
        let participants: Vec<Participant> = assignment
            .participants
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|p| (*p).clone()))
            .collect();
        plans.push(build_plan(target, &participants, None, policy)?);
    }

    let assigned = allocation.assigned_ids();
    let unassigned: Vec<String> = request
        .roster
        .iter()
        .filter(|p| !assigned.contains(p.id.as_str()))
        .map(|p| p.id.clone())
        .collect();

    debug!(
        targets = plans.len(),
        unassigned = unassigned.len(),
        "waterfall recomputed"
    );

    Ok(PlanSet {
        plans,
        allocation: Some(allocation),
        unassigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("A", 10),
            Participant::new("B", 20),
            Participant::new("C", 30),
        ]
    }

    #[test]
    fn test_single_target_uses_capacity_rule() {
        let request = PlanRequest {
            targets: vec![Target::attack("Fort")],
            roster: roster(),
            overrides: Overrides::new(),
            per_target_cap: Some(2),
        };
        let set = plan_targets(&request, CapacityPolicy::default()).unwrap();
        assert!(set.allocation.is_none());
        assert_eq!(set.plans[0].entries.len(), 2);
        assert_eq!(set.plans[0].impact_seconds, 30);
        assert_eq!(set.unassigned, vec!["A".to_string()]);
        assert_eq!(set.scheduled_count(), 2);
    }

    #[test]
    fn test_waterfall_builds_each_target() {
        let request = PlanRequest {
            targets: vec![Target::attack("T1"), Target::defense("T2", 0, 0)],
            roster: roster(),
            overrides: Overrides::new(),
            per_target_cap: Some(2),
        };
        let set = plan_targets(&request, CapacityPolicy::default()).unwrap();
        let t1: Vec<&str> = set.plans[0].entries.iter().map(|e| e.participant_id.as_str()).collect();
        assert_eq!(t1, vec!["C", "B"]);
        assert_eq!(set.plans[0].entries[1].wait_seconds, 10);
        assert_eq!(set.plans[1].impact_seconds, 10);
        assert_eq!(set.plans[1].entries[0].participant_id, "A");
        assert!(set.unassigned.is_empty());
    }

    #[test]
    fn test_waterfall_with_empty_attack_target_fails() {
        let request = PlanRequest {
            targets: vec![Target::attack("T1"), Target::attack("T2")],
            roster: roster(),
            overrides: Overrides::new(),
            per_target_cap: Some(3),
        };
        let err = plan_targets(&request, CapacityPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            RallyError::Schedule(ScheduleError::NoParticipants { ref target }) if target == "T2"
        ));
    }

    #[test]
    fn test_rejects_bad_target_lists() {
        let mut request = PlanRequest {
            targets: vec![],
            roster: roster(),
            overrides: Overrides::new(),
            per_target_cap: None,
        };
        assert!(matches!(
            plan_targets(&request, CapacityPolicy::default()),
            Err(RallyError::Schedule(ScheduleError::NoTargets))
        ));

        request.targets = vec![Target::attack("T"), Target::attack("T")];
        assert!(matches!(
            plan_targets(&request, CapacityPolicy::default()),
            Err(RallyError::Schedule(ScheduleError::DuplicateTarget { .. }))
        ));
    }

    #[test]
    fn test_single_target_override_goes_through_allocator() {
        let mut overrides = Overrides::new();
        overrides.insert("Fort".to_string(), vec!["A".to_string()]);
        let request = PlanRequest {
            targets: vec![Target::attack("Fort")],
            roster: roster(),
            overrides,
            per_target_cap: Some(2),
        };
        let set = plan_targets(&request, CapacityPolicy::default()).unwrap();
        assert!(set.allocation.is_some());
        assert_eq!(set.plans[0].entries.len(), 1);
        assert_eq!(set.plans[0].impact_seconds, 10);
        assert_eq!(set.unassigned, vec!["B".to_string(), "C".to_string()]);
    }

    fn duplicated_roster() -> Vec<Participant> {
        vec![
            Participant::new("A", 30),
            Participant::new("A", 20),
            Participant::new("B", 10),
        ]
    }

    #[test]
    fn test_duplicate_roster_id_rejected_before_allocation() {
        let request = PlanRequest {
            targets: vec![Target::attack("T1"), Target::attack("T2")],
            roster: duplicated_roster(),
            overrides: Overrides::new(),
            per_target_cap: Some(2),
        };
        let err = plan_targets(&request, CapacityPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            RallyError::Schedule(ScheduleError::DuplicateParticipant { ref participant, .. }) if participant == "A"
        ));
    }

    #[test]
    fn test_duplicate_roster_id_rejected_with_override() {
        let mut overrides = Overrides::new();
        overrides.insert("T1".to_string(), vec!["A".to_string()]);
        let request = PlanRequest {
            targets: vec![Target::attack("T1")],
            roster: duplicated_roster(),
            overrides,
            per_target_cap: None,
        };
        let err = plan_targets(&request, CapacityPolicy::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "participant 'A' listed twice for target 'T1'"
        );
    }
}
