#![allow(dead_code)]

use pilot::{
    AutomationSurface, Bounds, DecisionOracle, OracleRequest, PilotError, PointerPath,
    ScreenshotResult, SessionHandle, SessionState, TextCommit, UINode,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Capture(u32),
    Gesture(PointerPath, Duration),
    Text(String),
}

/// Surface with a fixed screen whose capture can be made to fail.
pub struct ScriptedSurface {
    tree: Option<UINode>,
    focused: AtomicBool,
    fail_capture_on: Option<u32>,
    fail_dispatch: bool,
    captures: AtomicU32,
    log: Mutex<Vec<(Instant, Recorded)>>,
}

impl ScriptedSurface {
    pub fn new(tree: Option<UINode>) -> Self {
        Self {
            tree,
            focused: AtomicBool::new(false),
            fail_capture_on: None,
            fail_dispatch: false,
            captures: AtomicU32::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `n`-th capture (1-based, counted across sessions).
    pub fn failing_capture(mut self, n: u32) -> Self {
        self.fail_capture_on = Some(n);
        self
    }

    /// Reject every gesture.
    pub fn failing_dispatch(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<(Instant, Recorded)> {
        self.log.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.log().into_iter().map(|(_, event)| event).collect()
    }

    pub fn gestures(&self) -> Vec<(PointerPath, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Gesture(path, duration) => Some((path, duration)),
                _ => None,
            })
            .collect()
    }

    pub fn capture_count(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }

    fn push(&self, event: Recorded) {
        self.log.lock().unwrap().push((Instant::now(), event));
    }
}

#[async_trait::async_trait]
impl AutomationSurface for ScriptedSurface {
    async fn capture_screen(&self) -> Result<ScreenshotResult, PilotError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        self.push(Recorded::Capture(n));
        if self.fail_capture_on == Some(n) {
            return Err(PilotError::CaptureFailed("screenshot error code 1".into()));
        }
        Ok(ScreenshotResult {
            image_data: vec![255; 8 * 8 * 4],
            width: 8,
            height: 8,
        })
    }

    fn interactive_tree(&self) -> Option<UINode> {
        self.tree.clone()
    }

    async fn dispatch_gesture(
        &self,
        path: &PointerPath,
        duration: Duration,
    ) -> Result<(), PilotError> {
        if self.fail_dispatch {
            return Err(PilotError::DispatchFailed("gesture cancelled by system".into()));
        }
        self.push(Recorded::Gesture(path.clone(), duration));
        Ok(())
    }

    async fn set_text_on_focused(&self, text: &str) -> Result<TextCommit, PilotError> {
        if !self.focused.load(Ordering::SeqCst) {
            return Ok(TextCommit::NoFocusedElement);
        }
        self.push(Recorded::Text(text.to_string()));
        Ok(TextCommit::Committed)
    }
}

/// Oracle that replays canned replies and remembers every prompt.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, PilotError>>>,
    fallback: String,
    hold_next: Mutex<Option<oneshot::Receiver<()>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: r#"{"action":"done"}"#.to_string(),
            hold_next: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(replies: Vec<Result<String, PilotError>>) -> Self {
        let oracle = Self::new(Vec::<String>::new());
        *oracle.replies.lock().unwrap() = replies.into();
        oracle
    }

    /// Reply used once the script runs out.
    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    /// Block the next call until the returned sender fires (or forever if
    /// it is kept and never used).
    pub fn hold_next_call(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold_next.lock().unwrap() = Some(rx);
        tx
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, PilotError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let hold = self.hold_next.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub fn settings_tree() -> UINode {
    UINode {
        children: vec![UINode {
            text: "Settings".into(),
            accessible_label: "Open settings".into(),
            bounds: Bounds::new(100, 200, 300, 260),
            clickable: true,
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Yield until the session reaches `state`.
pub async fn wait_for_state(session: &SessionHandle, state: SessionState) {
    for _ in 0..10_000 {
        if session.state() == state {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "session never reached {state}, stuck in {}",
        session.state()
    );
}
