//! Observe → decide → act control loop
//!
//! A [`Pilot`] is bound to one automation surface and runs at most one
//! session at a time. Each session is a single tokio task that walks
//! `Observing → Deciding → Acting → Observing …` until the oracle says
//! `done`, a step fails, or the host stops it. Hosts observe progress only
//! through the returned [`SessionHandle`]; nothing is raised across
//! `start`/`stop`.

use crate::config::{AgentConfig, CoordinatePolicy, PilotConfig};
use crate::decision::DecisionClient;
use crate::executor::{ActionExecutor, ExecutionResult};
use crate::observation::ObservationBuilder;
use crate::oracle::DecisionOracle;
use crate::platforms::AutomationSurface;
use crate::{
    Action, Decision, FailureReason, Observation, PilotError, SessionState, StepOutcome,
    StepRecord,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

struct SessionInner {
    id: Uuid,
    task: String,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    steps: Mutex<Vec<StepRecord>>,
    /// Single-flight flag of the owning pilot
    busy: Arc<AtomicBool>,
}

/// Host-side handle to one session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("task", &self.inner.task)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    fn new(task: String, busy: Arc<AtomicBool>) -> Self {
        let (state, _) = watch::channel(SessionState::Observing);
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                task,
                state,
                cancel: CancellationToken::new(),
                steps: Mutex::new(Vec::new()),
                busy,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn task(&self) -> &str {
        &self.inner.task
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Steps decided so far, oldest first.
    pub fn steps(&self) -> Vec<StepRecord> {
        self.inner
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait until the session leaves the running states.
    pub async fn wait(&self) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(|state| !state.is_running()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    /// Stop the session. A decision still in flight is discarded when it
    /// returns. No-op once the session has ended.
    pub fn stop(&self) {
        // cancel before releasing the flag so the old task never dispatches
        // alongside a newer session
        self.inner.cancel.cancel();
        if self.finish(SessionState::Idle) {
            info!(session = %self.inner.id, "Session stopped");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Move to `next` if the session is still running. Returns false for a
    /// session that has already ended, whose task must then bail out.
    fn advance(&self, next: SessionState) -> bool {
        let moved = self.inner.state.send_if_modified(|current| {
            if !current.is_running() {
                return false;
            }
            *current = next;
            true
        });
        if moved {
            debug!(session = %self.inner.id, "state -> {}", next);
        }
        moved
    }

    /// End the session in `state` and release the single-flight flag.
    fn finish(&self, state: SessionState) -> bool {
        if !self.advance(state) {
            return false;
        }
        self.inner.busy.store(false, Ordering::Release);
        true
    }

    /// Append a step. Ignored once the session has ended.
    fn record(&self, cycle: u32, decision: &Decision, action: Action, outcome: StepOutcome) {
        if !self.state().is_running() {
            return;
        }
        self.inner
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(StepRecord {
                cycle,
                action,
                thought: decision.thought.clone(),
                outcome,
                timestamp: Utc::now(),
            });
    }
}

/// The pieces one cycle needs, cloned into each session task.
#[derive(Clone)]
struct CycleRunner {
    observer: ObservationBuilder,
    decider: DecisionClient,
    executor: ActionExecutor,
    config: AgentConfig,
}

impl CycleRunner {
    async fn run(self, session: SessionHandle) {
        let mut cycle: u32 = 0;
        loop {
            if session.is_cancelled() {
                debug!("Session cancelled before cycle {}", cycle + 1);
                return;
            }
            if let Some(max) = self.config.max_cycles {
                if cycle >= max {
                    warn!("Reached cycle limit of {}", max);
                    session.finish(SessionState::Failed(FailureReason::CycleLimit));
                    return;
                }
            }
            cycle += 1;

            info!(cycle, "Capturing screen for next step");
            if !session.advance(SessionState::Observing) {
                return;
            }
            let observation = match self.observer.capture().await {
                Ok(observation) => observation,
                Err(e) => {
                    error!("Failed to capture screen: {}", e);
                    session.finish(SessionState::Failed(FailureReason::CaptureFailed));
                    return;
                }
            };

            if session.is_cancelled() || !session.advance(SessionState::Deciding) {
                return;
            }
            let decision = self.decider.decide(session.task(), &observation).await;
            if session.is_cancelled() {
                info!("Session stopped while the oracle was busy; discarding its decision");
                return;
            }
            let decision = match decision {
                Ok(decision) => decision,
                Err(e) => {
                    let reason = match e {
                        PilotError::MalformedAction(_) => FailureReason::MalformedAction,
                        _ => FailureReason::OracleUnavailable,
                    };
                    error!("No usable decision: {}", e);
                    session.finish(SessionState::Failed(reason));
                    return;
                }
            };

            match &decision.action {
                Action::Done => {
                    info!("Task completed!");
                    session.record(cycle, &decision, Action::Done, StepOutcome::Completed);
                    session.finish(SessionState::Completed);
                    return;
                }
                Action::Unknown { raw } => {
                    warn!("Unknown action: {:?}", raw);
                    session.record(
                        cycle,
                        &decision,
                        decision.action.clone(),
                        StepOutcome::Rejected,
                    );
                    session.finish(SessionState::Failed(FailureReason::UnknownAction));
                    return;
                }
                _ => {}
            }

            let action = apply_coordinate_policy(
                decision.action.clone(),
                &observation,
                self.config.coordinate_policy,
            );
            if !session.advance(SessionState::Acting) {
                return;
            }
            let result = self.executor.execute(&action, &session.inner.cancel).await;
            if session.is_cancelled() {
                info!("Session stopped while acting; dropping the step");
                return;
            }
            match result {
                Ok(ExecutionResult::Cancelled) => return,
                Ok(ExecutionResult::Dispatched) => {
                    session.record(cycle, &decision, action, StepOutcome::Dispatched);
                }
                Ok(ExecutionResult::NoFocusedElement) => {
                    session.record(cycle, &decision, action, StepOutcome::NoFocusedElement);
                }
                Err(e) => {
                    error!("Failed to execute {}: {}", action.name(), e);
                    session.record(
                        cycle,
                        &decision,
                        action,
                        StepOutcome::DispatchFailed(e.to_string()),
                    );
                    session.finish(SessionState::Failed(FailureReason::DispatchFailed));
                    return;
                }
            }

            tokio::select! {
                _ = session.inner.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.settle_delay()) => {}
            }
        }
    }
}

/// Clamp click/swipe coordinates into the raw screen when asked to.
pub fn apply_coordinate_policy(
    action: Action,
    observation: &Observation,
    policy: CoordinatePolicy,
) -> Action {
    if policy == CoordinatePolicy::PassThrough {
        return action;
    }
    let max_x = observation.screen_width.saturating_sub(1) as f64;
    let max_y = observation.screen_height.saturating_sub(1) as f64;
    let cx = |x: f64| x.clamp(0.0, max_x);
    let cy = |y: f64| y.clamp(0.0, max_y);
    match action {
        Action::Click { x, y } => Action::Click { x: cx(x), y: cy(y) },
        Action::Swipe {
            start_x,
            start_y,
            end_x,
            end_y,
        } => Action::Swipe {
            start_x: cx(start_x),
            start_y: cy(start_y),
            end_x: cx(end_x),
            end_y: cy(end_y),
        },
        other => other,
    }
}

/// Drives one automation surface with decisions from one oracle.
pub struct Pilot {
    runner: CycleRunner,
    busy: Arc<AtomicBool>,
    current: Mutex<Option<SessionHandle>>,
}

impl Pilot {
    pub fn new(
        surface: Arc<dyn AutomationSurface>,
        oracle: Arc<dyn DecisionOracle>,
        config: PilotConfig,
    ) -> Self {
        let runner = CycleRunner {
            observer: ObservationBuilder::new(surface.clone(), config.observation),
            decider: DecisionClient::new(oracle, config.prompt, config.oracle),
            executor: ActionExecutor::new(surface, config.executor),
            config: config.agent,
        };
        Self {
            runner,
            busy: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Start a session for `task` on the current tokio runtime.
    ///
    /// Returns `None` without side effects while another session is running
    /// or when called outside a runtime.
    #[instrument(skip(self, task))]
    pub fn start(&self, task: impl Into<String>) -> Option<SessionHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Cannot start a session outside a tokio runtime: {}", e);
                return None;
            }
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Already processing a task, ignoring start request");
            return None;
        }

        let session = SessionHandle::new(task.into(), self.busy.clone());
        info!(session = %session.id(), "Starting session: {}", session.task());
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());

        let span = info_span!("session", id = %session.id());
        runtime.spawn(
            self.runner
                .clone()
                .run(session.clone())
                .instrument(span),
        );
        Some(session)
    }

    /// Stop the current session, if any.
    pub fn stop(&self) {
        if let Some(session) = self.current_session() {
            session.stop();
        }
    }

    pub fn current_session(&self) -> Option<SessionHandle> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// State of the most recent session, `Idle` before the first one.
    pub fn current_state(&self) -> SessionState {
        self.current_session()
            .map(|session| session.state())
            .unwrap_or(SessionState::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}
