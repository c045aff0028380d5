use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AllocationError;
use super::types::{Participant, Target};

/// Operator's saved manual picks: target name -> participant ids
pub type Overrides = HashMap<String, Vec<String>>;

/// Participants assigned to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAssignment {
    pub target: String,
    pub participants: Vec<String>,
    /// Whether the set came from a saved override rather than the default pick
    pub from_override: bool,
}

/// Per-target participant sets, in target declaration order.
/// No participant id appears in more than one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub targets: Vec<TargetAssignment>,
}

impl Allocation {
    pub fn get(&self, target: &str) -> Option<&[String]> {
        self.targets
            .iter()
            .find(|a| a.target == target)
            .map(|a| a.participants.as_slice())
    }

    pub fn assigned_ids(&self) -> HashSet<&str> {
        self.targets
            .iter()
            .flat_map(|a| a.participants.iter().map(String::as_str))
            .collect()
    }
}

/// Drops saved overrides whose target no longer exists
pub fn retain_live_overrides(overrides: &mut Overrides, targets: &[Target]) {
    overrides.retain(|name, _| {
        let live = targets.iter().any(|t| &t.name == name);
        if !live {
            debug!(target_name = %name, "discarding override for removed target");
        }
        live
    });
}

/// Waterfall allocation of a shared roster across targets
///
/// Targets are processed in declaration order. A target with a saved override
/// keeps exactly those picks (still on the roster, not yet claimed by an earlier
/// target). Otherwise it takes the first `per_target_cap` slowest participants
/// that are neither claimed earlier nor held by another target's override.
/// Overrides naming removed targets are ignored.
pub fn allocate(
    targets: &[Target],
    roster: &[Participant],
    prior_overrides: &Overrides,
    per_target_cap: usize,
) -> Result<Allocation, AllocationError> {
    let on_roster: HashSet<&str> = roster.iter().map(|p| p.id.as_str()).collect();

    // Slowest first; stable so equal marches keep roster order
    let mut by_travel: Vec<&Participant> = roster.iter().collect();
    by_travel.sort_by(|a, b| b.travel_seconds.cmp(&a.travel_seconds));

    let live_overrides: Vec<(&str, &Vec<String>)> = targets
        .iter()
        .filter_map(|t| prior_overrides.get(&t.name).map(|ids| (t.name.as_str(), ids)))
        .collect();

    let mut owner: HashMap<String, String> = HashMap::new();
    let mut allocation = Allocation::default();

    for target in targets {
        let picks: Vec<String> = match prior_overrides.get(&target.name) {
            Some(saved) => {
                let mut seen = HashSet::new();
                let picks: Vec<String> = saved
                    .iter()
                    .filter(|id| on_roster.contains(id.as_str()))
                    .filter(|id| !owner.contains_key(id.as_str()))
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect();
                if picks.len() < saved.len() {
                    debug!(
                        target_name = %target.name,
                        saved = saved.len(),
                        kept = picks.len(),
                        "dropped stale or already-claimed override picks"
                    );
                }
                picks
            }
            None => {
                let held_elsewhere: HashSet<&str> = live_overrides
                    .iter()
                    .filter(|(name, _)| *name != target.name)
                    .flat_map(|(_, ids)| ids.iter().map(String::as_str))
                    .collect();
                by_travel
                    .iter()
                    .filter(|p| !owner.contains_key(&p.id))
                    .filter(|p| !held_elsewhere.contains(p.id.as_str()))
                    .take(per_target_cap)
                    .map(|p| p.id.clone())
                    .collect()
            }
        };

        for id in &picks {
            if let Some(first) = owner.insert(id.clone(), target.name.clone()) {
                error!(participant = %id, first = %first, second = %target.name, "allocation conflict");
                return Err(AllocationError::Conflict {
                    participant: id.clone(),
                    first,
                    second: target.name.clone(),
                });
            }
        }

        allocation.targets.push(TargetAssignment {
            target: target.name.clone(),
            participants: picks,
            from_override: prior_overrides.contains_key(&target.name),
        });
    }

    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("A", 10),
            Participant::new("B", 20),
            Participant::new("C", 30),
        ]
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names.iter().map(|n| Target::attack(*n)).collect()
    }

    #[test]
    fn test_default_pick_is_slowest_first() {
        let allocation = allocate(&targets(&["T1", "T2"]), &roster(), &Overrides::new(), 2).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["C", "B"]);
        assert_eq!(allocation.get("T2").unwrap(), ["A"]);
    }

    #[test]
    fn test_thinned_override_frees_participants_for_next_target() {
        let mut overrides = Overrides::new();
        overrides.insert("T1".to_string(), vec!["C".to_string()]);

        let allocation = allocate(&targets(&["T1", "T2"]), &roster(), &overrides, 2).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["C"]);
        assert_eq!(allocation.get("T2").unwrap(), ["B", "A"]);
        assert!(allocation.targets[0].from_override);
        assert!(!allocation.targets[1].from_override);
    }

    #[test]
    fn test_later_override_is_held_from_earlier_defaults() {
        let mut overrides = Overrides::new();
        overrides.insert("T2".to_string(), vec!["C".to_string()]);

        let allocation = allocate(&targets(&["T1", "T2"]), &roster(), &overrides, 2).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["B", "A"]);
        assert_eq!(allocation.get("T2").unwrap(), ["C"]);
    }

    #[test]
    fn test_override_loses_ids_claimed_earlier() {
        let mut overrides = Overrides::new();
        overrides.insert("T1".to_string(), vec!["C".to_string(), "B".to_string()]);
        overrides.insert("T2".to_string(), vec!["B".to_string(), "A".to_string()]);

        let allocation = allocate(&targets(&["T1", "T2"]), &roster(), &overrides, 3).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["C", "B"]);
        assert_eq!(allocation.get("T2").unwrap(), ["A"]);
    }

    #[test]
    fn test_override_filters_removed_roster_ids() {
        let mut overrides = Overrides::new();
        overrides.insert("T1".to_string(), vec!["Z".to_string(), "A".to_string(), "A".to_string()]);

        let allocation = allocate(&targets(&["T1"]), &roster(), &overrides, 2).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["A"]);
    }

    #[test]
    fn test_overrides_for_removed_targets_are_ignored() {
        let mut overrides = Overrides::new();
        overrides.insert("Gone".to_string(), vec!["C".to_string()]);

        let allocation = allocate(&targets(&["T1"]), &roster(), &overrides, 1).unwrap();
        assert_eq!(allocation.get("T1").unwrap(), ["C"]);

        retain_live_overrides(&mut overrides, &targets(&["T1"]));
        assert!(overrides.is_empty());
    }

    proptest! {
        #[test]
        fn prop_allocation_is_a_partition(
            travel in prop::collection::vec(1u32..600, 0..12),
            target_count in 1usize..5,
            cap in 0usize..6,
            override_picks in prop::collection::vec((0usize..5, 0usize..14), 0..10),
        ) {
            let roster: Vec<Participant> = travel
                .iter()
                .enumerate()
                .map(|(i, t)| Participant::new(format!("p{}", i), *t))
                .collect();
            let names: Vec<String> = (0..target_count).map(|i| format!("T{}", i)).collect();
            let targets: Vec<Target> = names.iter().map(|n| Target::attack(n.clone())).collect();

            let mut overrides = Overrides::new();
            for (t, p) in override_picks {
                overrides
                    .entry(format!("T{}", t))
                    .or_default()
                    .push(format!("p{}", p));
            }

            let allocation = allocate(&targets, &roster, &overrides, cap).unwrap();
            let mut seen = HashSet::new();
            for assignment in &allocation.targets {
                for id in &assignment.participants {
                    prop_assert!(seen.insert(id.clone()), "{} assigned twice", id);
                    prop_assert!(roster.iter().any(|p| &p.id == id));
                }
            }
        }
    }
}
