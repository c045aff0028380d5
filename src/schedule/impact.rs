use crate::error::ScheduleError;
use super::types::{Mode, Target, DEFENSE_BUFFER_SECS};

/// Computes the impact offset (seconds after the locked start) for a target.
///
/// Attack: the slowest march. Defense: enemy rally + enemy march + buffer, or the
/// slowest march without buffer when no enemy timing was given (pure sync).
/// Pure and clock-free; the result is relative to a start that is not fixed yet.
pub fn compute_impact(
    mode: Mode,
    travel_times: &[u32],
    enemy_march: u32,
    enemy_rally: u32,
) -> Result<u32, NoParticipants> {
    let slowest = || travel_times.iter().max().copied().ok_or(NoParticipants);

    match mode {
        Mode::Attack => slowest(),
        Mode::Defense => {
            let raw = enemy_rally.saturating_add(enemy_march);
            if raw == 0 {
                slowest()
            } else {
                Ok(raw.saturating_add(DEFENSE_BUFFER_SECS))
            }
        }
    }
}

/// The participant set was empty where impact depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoParticipants;

/// Impact for a target given the march times of its assigned participants
pub fn target_impact(target: &Target, travel_times: &[u32]) -> Result<u32, ScheduleError> {
    compute_impact(
        target.mode,
        travel_times,
        target.enemy_march_seconds,
        target.enemy_rally_seconds,
    )
    .map_err(|NoParticipants| ScheduleError::NoParticipants {
        target: target.name.clone(),
    })
}
