use crate::{
    Bounds, MarkerColor, MarkerId, PilotError, PointerPath, ScreenshotResult, TextCommit, UINode,
};
use std::time::Duration;

pub mod fixture;

pub use fixture::{FixtureSurface, SurfaceEvent};

/// Capabilities the control loop needs from the device it drives.
///
/// Implementations own whatever native handles back these calls and must
/// release them before returning; everything handed back is an owned
/// snapshot.
#[async_trait::async_trait]
pub trait AutomationSurface: Send + Sync {
    /// Capture the current screen as RGBA pixels
    async fn capture_screen(&self) -> Result<ScreenshotResult, PilotError>;

    /// Snapshot of the interactive UI hierarchy, `None` when nothing is on screen
    fn interactive_tree(&self) -> Option<UINode>;

    /// Submit a single continuous stroke. Returns once the gesture is
    /// submitted, not when its effect becomes visible.
    async fn dispatch_gesture(
        &self,
        path: &PointerPath,
        duration: Duration,
    ) -> Result<(), PilotError>;

    /// Replace the content of the focused input with `text`
    async fn set_text_on_focused(&self, text: &str) -> Result<TextCommit, PilotError>;

    /// Bounds of the focused element, if the surface can tell
    fn focused_bounds(&self) -> Option<Bounds> {
        None
    }

    /// Show a short-lived position indicator
    fn show_marker(&self, _x: f64, _y: f64, _color: MarkerColor) -> Result<MarkerId, PilotError> {
        Err(PilotError::InvalidArgument(
            "markers are not supported by this surface".to_string(),
        ))
    }

    fn remove_marker(&self, _id: MarkerId) {}
}
