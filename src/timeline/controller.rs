//! Operator-facing handle for one rally session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{RallyError, SessionError};
use crate::schedule::{plan_targets, PlanRequest, PlanSet};
use super::runner::run_session;
use super::snapshot::{SessionState, Snapshot};

#[derive(Debug)]
struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<SessionState>,
}

/// Owns one session: its current plans, the live run task and the snapshot feed.
///
/// Every published snapshot is tagged with the run generation it belongs to;
/// `reset`, `recompute_schedule` and `start` bump the generation, so frames from
/// a superseded run are dropped instead of overwriting newer state.
#[derive(Debug)]
pub struct RallyController {
    config: EngineConfig,
    plan_set: PlanSet,
    snapshots: Arc<watch::Sender<Snapshot>>,
    generation: Arc<AtomicU64>,
    active: Option<ActiveRun>,
}

impl RallyController {
    pub fn new(config: EngineConfig) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::preview(&[], SessionState::Idle));
        Self {
            config,
            plan_set: PlanSet::default(),
            snapshots: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plan_set(&self) -> &PlanSet {
        &self.plan_set
    }

    /// Receiver that sees every snapshot published from now on
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Whether a run task is still armed or running
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished() && !run.cancel.is_cancelled())
    }

    /// Rebuilds every plan from a fresh roster snapshot and publishes an Idle preview.
    ///
    /// # Errors
    ///
    /// `SessionError::AlreadyRunning` while a session is live, otherwise any
    /// schedule or allocation error from planning.
    pub fn recompute_schedule(&mut self, request: &PlanRequest) -> Result<&PlanSet, RallyError> {
        if self.is_running() {
            warn!("recompute rejected while a session is live");
            return Err(SessionError::AlreadyRunning.into());
        }
        let plan_set = plan_targets(request, self.config.capacity_policy)?;
        debug!(
            plans = plan_set.plans.len(),
            scheduled = plan_set.scheduled_count(),
            "schedule recomputed"
        );
        self.plan_set = plan_set;
        self.publish_idle();
        Ok(&self.plan_set)
    }

    /// Arms the session: pre-countdown, lock, then live ticks on a spawned task.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if a session is live, `NothingScheduled` when no entry
    /// would march and no enemy timer would run.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            warn!("start rejected: sequence already running");
            return Err(SessionError::AlreadyRunning);
        }
        let has_enemy_timer = self
            .plan_set
            .plans
            .iter()
            .any(|p| p.enemy_impact_seconds().is_some());
        if self.plan_set.scheduled_count() == 0 && !has_enemy_timer {
            return Err(SessionError::NothingScheduled);
        }

        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_session(
            self.plan_set.plans.clone(),
            self.config,
            cancel.clone(),
            self.publisher(run),
        ));
        info!(run, countdown = self.config.pre_countdown_secs, "session armed");
        self.active = Some(ActiveRun { cancel, handle });
        Ok(())
    }

    /// Aborts a live session. The run publishes a final Cancelled frame and the
    /// controller is idle again. Returns whether anything was live.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(run) if !run.handle.is_finished() => {
                run.cancel.cancel();
                warn!("session cancel requested");
                true
            }
            _ => false,
        }
    }

    /// Stops any run and returns to an Idle preview of the current plans.
    pub fn reset(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
        }
        self.publish_idle();
        debug!("session reset");
    }

    /// Waits for the current run (if any) to finish and returns how it ended
    pub async fn wait(&mut self) -> Option<SessionState> {
        let run = self.active.take()?;
        match run.handle.await {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(error = %err, "session task failed");
                None
            }
        }
    }

    fn publish_idle(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .send_replace(Snapshot::preview(&self.plan_set.plans, SessionState::Idle));
    }

    fn publisher(&self, run: u64) -> impl FnMut(Snapshot) + Send + 'static {
        let tx = Arc::clone(&self.snapshots);
        let generation = Arc::clone(&self.generation);
        move |snapshot: Snapshot| {
            tx.send_if_modified(|current| {
                // checked under the channel lock, so a newer generation always wins
                if generation.load(Ordering::SeqCst) != run {
                    return false;
                }
                *current = snapshot;
                true
            });
        }
    }
}

impl Drop for RallyController {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}
