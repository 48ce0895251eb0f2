//! Common types shared by the observation, decision and action layers

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen-space rectangle in absolute device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Integer centre, rounded toward the top-left like the platform rect helpers.
    pub fn center(&self) -> (f64, f64) {
        (
            ((self.left + self.right) / 2) as f64,
            ((self.top + self.bottom) / 2) as f64,
        )
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Owned snapshot of one node of the surface's UI hierarchy.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UINode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(
        default,
        alias = "contentDescription",
        skip_serializing_if = "String::is_empty"
    )]
    pub accessible_label: String,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UINode>,
}

impl fmt::Debug for UINode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_with_depth(f, 0, 32)
    }
}

impl UINode {
    fn debug_with_depth(
        &self,
        f: &mut fmt::Formatter<'_>,
        current_depth: usize,
        max_depth: usize,
    ) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UINode");
        if !self.text.is_empty() {
            debug_struct.field("text", &self.text);
        }
        if !self.accessible_label.is_empty() {
            debug_struct.field("accessible_label", &self.accessible_label);
        }
        debug_struct.field("bounds", &self.bounds.to_string());
        if self.clickable {
            debug_struct.field("clickable", &true);
        }
        if self.focused {
            debug_struct.field("focused", &true);
        }

        if !self.children.is_empty() {
            if current_depth < max_depth {
                let children: Vec<DebugNodeWithDepth<'_>> = self
                    .children
                    .iter()
                    .map(|node| DebugNodeWithDepth {
                        node,
                        current_depth: current_depth + 1,
                        max_depth,
                    })
                    .collect();
                debug_struct.field("children", &children);
            } else {
                debug_struct.field(
                    "children",
                    &format!("[{} children (depth limit reached)]", self.children.len()),
                );
            }
        }

        debug_struct.finish()
    }
}

struct DebugNodeWithDepth<'a> {
    node: &'a UINode,
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugNodeWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node
            .debug_with_depth(f, self.current_depth, self.max_depth)
    }
}

/// Interactive element as presented to the decision oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    pub text: String,
    pub accessible_label: String,
    pub bounds: Bounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl From<&UINode> for UIElement {
    fn from(node: &UINode) -> Self {
        Self {
            text: node.text.clone(),
            accessible_label: node.accessible_label.clone(),
            bounds: node.bounds,
            kind: node.kind.clone(),
        }
    }
}

/// Holds the screenshot data
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw RGBA pixel data
    pub image_data: Vec<u8>,
    /// Width of the image
    pub width: u32,
    /// Height of the image
    pub height: u32,
}

/// Compressed image ready to be attached to an oracle request.
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Normalized snapshot of the screen, rebuilt every cycle.
#[derive(Debug, Clone)]
pub struct Observation {
    pub image: EncodedImage,
    pub elements: Vec<UIElement>,
    /// Raw capture size before any downscaling
    pub screen_width: u32,
    pub screen_height: u32,
}

/// One decided interaction primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click {
        x: f64,
        y: f64,
    },
    #[serde(rename = "type")]
    TypeText {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Swipe {
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
    },
    Done,
    /// Well-formed reply whose `action` tag matched no known case
    Unknown {
        raw: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::TypeText { .. } => "type",
            Action::Swipe { .. } => "swipe",
            Action::Done => "done",
            Action::Unknown { .. } => "unknown",
        }
    }
}

/// A parsed oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Free-form reasoning, surfaced for logs only
    pub thought: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Continuous pointer stroke: press at the first point, move through the
/// rest, release at the last.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerPath {
    pub points: Vec<Point>,
}

impl PointerPath {
    pub fn tap(x: f64, y: f64) -> Self {
        Self {
            points: vec![Point { x, y }],
        }
    }

    pub fn line(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            points: vec![
                Point {
                    x: start_x,
                    y: start_y,
                },
                Point { x: end_x, y: end_y },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Green,
    Yellow,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Result of pushing text into the focused element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommit {
    Committed,
    NoFocusedElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    CaptureFailed,
    OracleUnavailable,
    MalformedAction,
    UnknownAction,
    DispatchFailed,
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Observing,
    Deciding,
    Acting,
    Completed,
    Failed(FailureReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }

    /// Anything between `start` and a terminal state.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionState::Observing | SessionState::Deciding | SessionState::Acting
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(reason) => write!(f, "failed({reason:?})"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Dispatched,
    NoFocusedElement,
    Completed,
    Rejected,
    DispatchFailed(String),
}

/// History entry for one decided cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub cycle: u32,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    pub outcome: StepOutcome,
    pub timestamp: DateTime<Utc>,
}
