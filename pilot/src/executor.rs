//! Maps decided actions onto surface gestures

use crate::config::{ExecutorConfig, MarkerTiming};
use crate::platforms::AutomationSurface;
use crate::{Action, MarkerColor, MarkerId, PilotError, PointerPath, TextCommit};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Gesture or text commit was submitted to the surface
    Dispatched,
    /// A type action found nothing focused; nothing was sent
    NoFocusedElement,
    /// Cancelled during a marker lead; nothing was sent
    Cancelled,
}

/// Removes its marker when dropped, whatever happens to the gesture.
struct MarkerGuard<'a> {
    surface: &'a dyn AutomationSurface,
    id: Option<MarkerId>,
}

impl<'a> MarkerGuard<'a> {
    fn show(surface: &'a dyn AutomationSurface, x: f64, y: f64, color: MarkerColor) -> Self {
        let id = match surface.show_marker(x, y, color) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("marker not shown: {}", e);
                None
            }
        };
        Self { surface, id }
    }
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.surface.remove_marker(id);
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    surface: Arc<dyn AutomationSurface>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(surface: Arc<dyn AutomationSurface>, config: ExecutorConfig) -> Self {
        Self { surface, config }
    }

    /// Execute a click, type or swipe. `Done` and `Unknown` are handled by
    /// the controller and rejected here.
    ///
    /// Once `cancel` fires nothing more is sent to the surface.
    #[instrument(level = "debug", skip(self, cancel))]
    pub async fn execute(
        &self,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, PilotError> {
        match action {
            Action::Click { x, y } => {
                let _marker = self
                    .marker(*x, *y, MarkerColor::Red, |m| m.click_lead_ms, cancel)
                    .await;
                if cancel.is_cancelled() {
                    return Ok(ExecutionResult::Cancelled);
                }
                self.surface
                    .dispatch_gesture(
                        &PointerPath::tap(*x, *y),
                        Duration::from_millis(self.config.click_hold_ms),
                    )
                    .await?;
                Ok(ExecutionResult::Dispatched)
            }
            Action::TypeText { text } => {
                let _marker = match self.surface.focused_bounds() {
                    Some(bounds) => {
                        let (cx, cy) = bounds.center();
                        self.marker(cx, cy, MarkerColor::Blue, |m| m.type_lead_ms, cancel)
                            .await
                    }
                    None => None,
                };
                if cancel.is_cancelled() {
                    return Ok(ExecutionResult::Cancelled);
                }
                match self.surface.set_text_on_focused(text).await {
                    Ok(TextCommit::Committed) => Ok(ExecutionResult::Dispatched),
                    Ok(TextCommit::NoFocusedElement) | Err(PilotError::NoFocusedElement) => {
                        warn!("No focused element found to type text into");
                        Ok(ExecutionResult::NoFocusedElement)
                    }
                    Err(e) => Err(e),
                }
            }
            Action::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
            } => {
                let _start = self
                    .marker(
                        *start_x,
                        *start_y,
                        MarkerColor::Green,
                        |m| m.swipe_start_lead_ms,
                        cancel,
                    )
                    .await;
                if cancel.is_cancelled() {
                    return Ok(ExecutionResult::Cancelled);
                }
                let _end = self
                    .marker(
                        *end_x,
                        *end_y,
                        MarkerColor::Yellow,
                        |m| m.swipe_end_lead_ms,
                        cancel,
                    )
                    .await;
                if cancel.is_cancelled() {
                    return Ok(ExecutionResult::Cancelled);
                }
                self.surface
                    .dispatch_gesture(
                        &PointerPath::line(*start_x, *start_y, *end_x, *end_y),
                        Duration::from_millis(self.config.swipe_duration_ms),
                    )
                    .await?;
                Ok(ExecutionResult::Dispatched)
            }
            Action::Done | Action::Unknown { .. } => Err(PilotError::InvalidArgument(format!(
                "{} is not an executable action",
                action.name()
            ))),
        }
    }

    /// Show a marker and wait out its lead time, or until `cancel` fires.
    /// No-op when markers are off.
    async fn marker(
        &self,
        x: f64,
        y: f64,
        color: MarkerColor,
        lead: impl Fn(&MarkerTiming) -> u64,
        cancel: &CancellationToken,
    ) -> Option<MarkerGuard<'_>> {
        let timing = self.config.markers.as_ref()?;
        let guard = MarkerGuard::show(self.surface.as_ref(), x, y, color);
        tokio::select! {
            _ = cancel.cancelled() => debug!("Marker lead cut short by cancellation"),
            _ = tokio::time::sleep(Duration::from_millis(lead(timing))) => {}
        }
        Some(guard)
    }
}
