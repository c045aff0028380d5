use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::schedule::Plan;
use super::snapshot::{
    late_status, next_event, DepartureStatus, EnemyStatus, EntryStatus, SessionState, Snapshot,
    TargetStatus,
};

/// Clock-free state of a running session
///
/// Fed the monotonic time elapsed since the locked start; departures and enemy
/// impacts latch, so a later observation can never move an entry back to
/// waiting. Completes once everything has resolved and the grace period has
/// passed since that moment.
#[derive(Debug)]
pub struct DepartureTracker {
    plans: Vec<Plan>,
    departed: Vec<Vec<bool>>,
    impacted: Vec<bool>,
    grace_period: Duration,
    settled_at: Option<Duration>,
    locked_at: Option<DateTime<Utc>>,
}

impl DepartureTracker {
    pub fn new(plans: Vec<Plan>, grace_period: Duration) -> Self {
        let departed = plans.iter().map(|p| vec![false; p.entries.len()]).collect();
        let impacted = vec![false; plans.len()];
        Self {
            plans,
            departed,
            impacted,
            grace_period,
            settled_at: None,
            locked_at: None,
        }
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Records the wall-clock instant of the lock, for absolute times in snapshots only
    pub fn lock(&mut self, wall_clock: DateTime<Utc>) {
        self.locked_at = Some(wall_clock);
    }

    /// Advances to `elapsed` after the lock and returns the resulting snapshot
    pub fn observe(&mut self, elapsed: Duration) -> Snapshot {
        let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        let mut per_target = Vec::with_capacity(self.plans.len());

        for (p, plan) in self.plans.iter().enumerate() {
            let mut entries = Vec::with_capacity(plan.entries.len() + plan.late.len());
            for (e, entry) in plan.entries.iter().enumerate() {
                let remaining_ms = entry.wait_seconds.saturating_mul(1000).saturating_sub(elapsed_ms);
                if !self.departed[p][e] && remaining_ms <= 0 {
                    self.departed[p][e] = true;
                    info!(
                        participant = %entry.participant_id,
                        target_name = %plan.target.name,
                        wait_seconds = entry.wait_seconds,
                        "march now"
                    );
                }
                let departed = self.departed[p][e];
                entries.push(EntryStatus {
                    participant: entry.participant_id.clone(),
                    role: entry.role,
                    travel_seconds: entry.travel_seconds,
                    wait_seconds: entry.wait_seconds,
                    status: if departed {
                        DepartureStatus::Departed
                    } else {
                        DepartureStatus::Waiting
                    },
                    remaining_seconds: if departed { 0 } else { ceil_seconds(remaining_ms) },
                    departs_at: self.at_offset(entry.wait_seconds),
                });
            }
            entries.extend(plan.late.iter().map(late_status));

            let enemy_status = match plan.enemy_impact_seconds() {
                Some(impact) => {
                    let remaining_ms = i64::from(impact) * 1000 - elapsed_ms;
                    if !self.impacted[p] && remaining_ms <= 0 {
                        self.impacted[p] = true;
                        info!(target_name = %plan.target.name, "enemy impact");
                    }
                    Some(EnemyStatus {
                        remaining_seconds: if self.impacted[p] { 0 } else { ceil_seconds(remaining_ms) },
                        impacted: self.impacted[p],
                        impacts_at: self.at_offset(i64::from(impact)),
                    })
                }
                None => None,
            };

            per_target.push(TargetStatus {
                target_name: plan.target.name.clone(),
                mode: plan.target.mode,
                impact_seconds: plan.impact_seconds,
                entries,
                enemy_status,
            });
        }

        if self.settled_at.is_none() && self.all_resolved() {
            info!(elapsed_ms, "all marches sent");
            self.settled_at = Some(elapsed);
        }
        let session_state = match self.settled_at {
            Some(at) if elapsed.saturating_sub(at) >= self.grace_period => SessionState::Complete,
            _ => SessionState::Running,
        };

        let overall_next_event = next_event(&per_target);
        Snapshot {
            session_state,
            per_target,
            overall_next_event,
            locked_at: self.locked_at,
            elapsed_ms: u64::try_from(elapsed_ms).unwrap_or(u64::MAX),
        }
    }

    fn all_resolved(&self) -> bool {
        let departed = self.departed.iter().flatten().all(|&d| d);
        let impacted = self
            .plans
            .iter()
            .zip(&self.impacted)
            .all(|(plan, &hit)| hit || plan.enemy_impact_seconds().is_none());
        departed && impacted
    }

    fn at_offset(&self, seconds: i64) -> Option<DateTime<Utc>> {
        self.locked_at
            .map(|locked| locked + chrono::Duration::seconds(seconds))
    }
}

/// Rounds a positive millisecond count up to whole seconds
fn ceil_seconds(ms: i64) -> i64 {
    if ms <= 0 {
        0
    } else {
        (ms + 999) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{build_plan, CapacityPolicy, Participant, Target};

    fn attack_plan() -> Plan {
        let participants = vec![
            Participant::new("a", 45),
            Participant::new("b", 30),
            Participant::new("c", 60),
        ];
        build_plan(&Target::attack("Enemy"), &participants, None, CapacityPolicy::default()).unwrap()
    }

    fn statuses(snapshot: &Snapshot) -> Vec<(String, DepartureStatus, i64)> {
        snapshot.per_target[0]
            .entries
            .iter()
            .map(|e| (e.participant.clone(), e.status, e.remaining_seconds))
            .collect()
    }

    #[test]
    fn test_starter_departs_at_lock() {
        let mut tracker = DepartureTracker::new(vec![attack_plan()], Duration::from_secs(3));
        let snapshot = tracker.observe(Duration::ZERO);

        assert_eq!(snapshot.session_state, SessionState::Running);
        assert_eq!(
            statuses(&snapshot),
            vec![
                ("c".to_string(), DepartureStatus::Departed, 0),
                ("a".to_string(), DepartureStatus::Waiting, 15),
                ("b".to_string(), DepartureStatus::Waiting, 30),
            ]
        );
        let next = snapshot.overall_next_event.unwrap();
        assert_eq!(next.participant, "a");
        assert_eq!(next.remaining_seconds, 15);
    }

    #[test]
    fn test_remaining_rounds_up() {
        let mut tracker = DepartureTracker::new(vec![attack_plan()], Duration::from_secs(3));
        let snapshot = tracker.observe(Duration::from_millis(14_100));
        assert_eq!(statuses(&snapshot)[1].2, 1);

        let snapshot = tracker.observe(Duration::from_millis(15_000));
        assert_eq!(statuses(&snapshot)[1].1, DepartureStatus::Departed);
    }

    #[test]
    fn test_departure_latches() {
        let mut tracker = DepartureTracker::new(vec![attack_plan()], Duration::from_secs(3));
        tracker.observe(Duration::from_secs(16));
        // an earlier reading must not un-depart anyone
        let snapshot = tracker.observe(Duration::from_secs(10));
        assert_eq!(statuses(&snapshot)[1].1, DepartureStatus::Departed);
    }

    #[test]
    fn test_completes_after_grace() {
        let mut tracker = DepartureTracker::new(vec![attack_plan()], Duration::from_secs(3));
        assert_eq!(tracker.observe(Duration::from_secs(30)).session_state, SessionState::Running);
        assert_eq!(tracker.observe(Duration::from_millis(32_900)).session_state, SessionState::Running);
        let done = tracker.observe(Duration::from_secs(33));
        assert_eq!(done.session_state, SessionState::Complete);
        assert!(done.overall_next_event.is_none());
    }

    #[test]
    fn test_defense_waits_for_enemy_impact() {
        let participants = vec![Participant::new("near", 45), Participant::new("far", 400)];
        let plan = build_plan(&Target::defense("Keep", 300, 30), &participants, None, CapacityPolicy::default()).unwrap();
        let mut tracker = DepartureTracker::new(vec![plan], Duration::from_secs(2));

        let snapshot = tracker.observe(Duration::from_secs(286));
        assert_eq!(snapshot.departed_count(), 1);
        let enemy = snapshot.per_target[0].enemy_status.clone().unwrap();
        assert_eq!(enemy.remaining_seconds, 45);
        assert!(!enemy.impacted);
        assert_eq!(snapshot.per_target[0].entries[1].status, DepartureStatus::Late);

        assert_eq!(tracker.observe(Duration::from_secs(330)).session_state, SessionState::Running);
        let snapshot = tracker.observe(Duration::from_secs(331));
        assert!(snapshot.per_target[0].enemy_status.as_ref().unwrap().impacted);
        assert_eq!(snapshot.session_state, SessionState::Running);
        assert_eq!(tracker.observe(Duration::from_secs(333)).session_state, SessionState::Complete);
    }

    #[test]
    fn test_absolute_times_follow_lock() {
        let mut tracker = DepartureTracker::new(vec![attack_plan()], Duration::from_secs(3));
        let locked = DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        tracker.lock(locked);

        let snapshot = tracker.observe(Duration::ZERO);
        assert_eq!(snapshot.locked_at, Some(locked));
        assert_eq!(
            snapshot.per_target[0].entries[2].departs_at,
            Some(locked + chrono::Duration::seconds(30))
        );
    }
}
