use std::time::Duration;

use chrono::Utc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::schedule::Plan;
use super::snapshot::{SessionState, Snapshot};
use super::tracker::DepartureTracker;

/// Drives one live session to completion or cancellation.
///
/// Publishes an `Armed` frame per pre-countdown second, locks the start on
/// tokio's monotonic clock, then publishes a `Running` frame every tick until
/// the tracker reports `Complete`. Cancellation is checked before every wait;
/// when observed the last published frame is `Cancelled`.
///
/// Uses `tokio::time`, so tests with a paused runtime drive it deterministically.
pub async fn run_session<F>(
    plans: Vec<Plan>,
    config: EngineConfig,
    cancel: CancellationToken,
    mut publish: F,
) -> SessionState
where
    F: FnMut(Snapshot) + Send,
{
    let mut tracker = DepartureTracker::new(plans, config.grace_period);

    for countdown in (1..=config.pre_countdown_secs).rev() {
        publish(Snapshot::preview(tracker.plans(), SessionState::Armed { countdown }));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!(countdown, "session cancelled before lock");
                publish(Snapshot::preview(tracker.plans(), SessionState::Cancelled));
                return SessionState::Cancelled;
            }
            () = time::sleep(Duration::from_secs(1)) => {}
        }
    }

    let locked_start = Instant::now();
    tracker.lock(Utc::now());
    info!(targets = tracker.plans().len(), "start locked");

    let mut ticker = time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let elapsed_ms = u64::try_from(locked_start.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!(elapsed_ms, "session cancelled");
                let frame = last
                    .take()
                    .unwrap_or_else(|| Snapshot::preview(tracker.plans(), SessionState::Running));
                publish(Snapshot::with_state(frame, SessionState::Cancelled));
                return SessionState::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        let snapshot = tracker.observe(locked_start.elapsed());
        let state = snapshot.session_state;
        last = Some(snapshot.clone());
        publish(snapshot);

        if state == SessionState::Complete {
            debug!("session complete");
            return state;
        }
    }
}
