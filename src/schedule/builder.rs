use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScheduleError;
use super::impact::target_impact;
use super::types::{Mode, Participant, Plan, Role, ScheduleEntry, Target};

/// How a capacity limit picks who marches when more participants are available than slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Keep the K marches closest to the slowest one, before late filtering.
    /// Keeps the wave tight instead of favouring the fastest marchers.
    #[default]
    ClosestToSlowest,
    /// Keep the first K non-late entries by ascending wait (applied after late filtering).
    FirstByWait,
}

/// Builds the departure plan for one target
///
/// Wait is `impact - travel` for every participant. Late defense entries are
/// split out, the rest sorted by wait (stable, so ties keep input order) and
/// tagged Starter / Follower in departure order. With a capacity, the cut
/// participants are returned as reserves.
pub fn build_plan(
    target: &Target,
    participants: &[Participant],
    capacity: Option<usize>,
    policy: CapacityPolicy,
) -> Result<Plan, ScheduleError> {
    let mut seen = HashSet::new();
    for p in participants {
        if !seen.insert(p.id.as_str()) {
            return Err(ScheduleError::DuplicateParticipant {
                target: target.name.clone(),
                participant: p.id.clone(),
            });
        }
    }

    let travel_times: Vec<u32> = participants.iter().map(|p| p.travel_seconds).collect();
    let impact_seconds = target_impact(target, &travel_times)?;

    let (selected, mut reserves) = match (capacity, policy) {
        (Some(k), CapacityPolicy::ClosestToSlowest) => select_closest_to_slowest(participants, k),
        _ => (participants.iter().collect(), Vec::new()),
    };

    let (mut late, mut on_time): (Vec<ScheduleEntry>, Vec<ScheduleEntry>) = selected
        .into_iter()
        .map(|p| {
            let wait_seconds = i64::from(impact_seconds) - i64::from(p.travel_seconds);
            ScheduleEntry {
                participant_id: p.id.clone(),
                travel_seconds: p.travel_seconds,
                wait_seconds,
                is_late: target.mode == Mode::Defense && wait_seconds < 0,
                role: Role::Starter,
            }
        })
        .partition(|e| e.is_late);

    on_time.sort_by_key(|e| e.wait_seconds);

    if let (Some(k), CapacityPolicy::FirstByWait) = (capacity, policy) {
        if on_time.len() > k {
            reserves.extend(
                on_time
                    .drain(k..)
                    .map(|e| Participant::new(e.participant_id, e.travel_seconds)),
            );
        }
    }

    for (index, entry) in on_time.iter_mut().enumerate() {
        entry.role = departure_role(index);
    }

    // Late entries keep numbering after the scheduled ones
    late.sort_by_key(|e| e.wait_seconds);
    for (index, entry) in late.iter_mut().enumerate() {
        entry.role = Role::Follower(ordinal(on_time.len() + index));
    }

    debug!(
        target_name = %target.name,
        mode = %target.mode,
        impact_seconds,
        scheduled = on_time.len(),
        late = late.len(),
        reserves = reserves.len(),
        "built plan"
    );

    Ok(Plan {
        target: target.clone(),
        impact_seconds,
        entries: on_time,
        late,
        reserves,
    })
}

/// 1-based departure position, saturating at `u32::MAX`
fn ordinal(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1))
}

fn departure_role(index: usize) -> Role {
    if index == 0 {
        Role::Starter
    } else {
        Role::Follower(ordinal(index))
    }
}

/// Splits participants into the `k` whose march is closest to the slowest one and the rest.
/// Both halves keep input order.
fn select_closest_to_slowest(participants: &[Participant], k: usize) -> (Vec<&Participant>, Vec<Participant>) {
    let slowest = participants.iter().map(|p| p.travel_seconds).max().unwrap_or(0);

    let mut ranked: Vec<usize> = (0..participants.len()).collect();
    ranked.sort_by_key(|&i| (slowest - participants[i].travel_seconds, i));
    let keep: HashSet<usize> = ranked.into_iter().take(k).collect();

    let mut selected = Vec::new();
    let mut reserves = Vec::new();
    for (i, p) in participants.iter().enumerate() {
        if keep.contains(&i) {
            selected.push(p);
        } else {
            reserves.push(p.clone());
        }
    }
    (selected, reserves)
}
