//! File-backed surface for dry runs
//!
//! Serves one fixed screenshot and UI tree on every capture and records the
//! gestures, text commits and markers the executor emits instead of touching
//! a real device.

use super::AutomationSurface;
use crate::{
    Bounds, MarkerColor, MarkerId, PilotError, PointerPath, ScreenshotResult, TextCommit, UINode,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Gesture {
        path: PointerPath,
        duration: Duration,
    },
    Text(String),
    MarkerShown {
        id: MarkerId,
        x: f64,
        y: f64,
        color: MarkerColor,
    },
    MarkerRemoved(MarkerId),
}

pub struct FixtureSurface {
    screenshot: ScreenshotResult,
    tree: Option<UINode>,
    events: Mutex<Vec<SurfaceEvent>>,
    next_marker: AtomicU64,
}

impl FixtureSurface {
    pub fn new(screenshot: ScreenshotResult, tree: Option<UINode>) -> Self {
        Self {
            screenshot,
            tree,
            events: Mutex::new(Vec::new()),
            next_marker: AtomicU64::new(1),
        }
    }

    /// Load a PNG/JPEG screenshot and an optional JSON tree from disk.
    pub fn from_files(
        screenshot_path: &Path,
        tree_path: Option<&Path>,
    ) -> Result<Self, PilotError> {
        let image = image::open(screenshot_path).map_err(|e| {
            PilotError::InvalidArgument(format!(
                "Failed to read screenshot {}: {e}",
                screenshot_path.display()
            ))
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let screenshot = ScreenshotResult {
            image_data: rgba.into_raw(),
            width,
            height,
        };

        let tree = match tree_path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    PilotError::InvalidArgument(format!(
                        "Failed to read tree {}: {e}",
                        path.display()
                    ))
                })?;
                let node: UINode = serde_json::from_str(&raw).map_err(|e| {
                    PilotError::InvalidArgument(format!(
                        "Failed to parse tree {}: {e}",
                        path.display()
                    ))
                })?;
                Some(node)
            }
            None => None,
        };

        info!(
            "Loaded fixture screen {}x{} (tree: {})",
            width,
            height,
            tree.is_some()
        );
        Ok(Self::new(screenshot, tree))
    }

    /// Everything the executor has done to this surface so far.
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, event: SurfaceEvent) {
        debug!("fixture surface event: {:?}", event);
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    fn focused_node(&self) -> Option<&UINode> {
        let mut stack: Vec<&UINode> = self.tree.iter().collect();
        while let Some(node) = stack.pop() {
            if node.focused {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

#[async_trait::async_trait]
impl AutomationSurface for FixtureSurface {
    async fn capture_screen(&self) -> Result<ScreenshotResult, PilotError> {
        Ok(self.screenshot.clone())
    }

    fn interactive_tree(&self) -> Option<UINode> {
        self.tree.clone()
    }

    async fn dispatch_gesture(
        &self,
        path: &PointerPath,
        duration: Duration,
    ) -> Result<(), PilotError> {
        if path.points.is_empty() {
            return Err(PilotError::InvalidArgument(
                "gesture path has no points".to_string(),
            ));
        }
        self.record(SurfaceEvent::Gesture {
            path: path.clone(),
            duration,
        });
        Ok(())
    }

    async fn set_text_on_focused(&self, text: &str) -> Result<TextCommit, PilotError> {
        if self.focused_node().is_none() {
            return Ok(TextCommit::NoFocusedElement);
        }
        self.record(SurfaceEvent::Text(text.to_string()));
        Ok(TextCommit::Committed)
    }

    fn focused_bounds(&self) -> Option<Bounds> {
        self.focused_node().map(|node| node.bounds)
    }

    fn show_marker(&self, x: f64, y: f64, color: MarkerColor) -> Result<MarkerId, PilotError> {
        let id = MarkerId(self.next_marker.fetch_add(1, Ordering::Relaxed));
        self.record(SurfaceEvent::MarkerShown { id, x, y, color });
        Ok(id)
    }

    fn remove_marker(&self, id: MarkerId) {
        self.record(SurfaceEvent::MarkerRemoved(id));
    }
}
