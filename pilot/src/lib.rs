//! Screen-driven UI automation through an AI decision oracle
//!
//! This crate runs a perception–decision–action loop against a device: it
//! captures the screen and the interactive elements, asks a remote oracle
//! for the next single action, dispatches it as a gesture or text commit,
//! waits for the UI to settle, and repeats until the task is done.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pilot::{FixtureSurface, GeminiConfig, GeminiOracle, Pilot, PilotConfig};
//!
//! # async fn run() -> Result<(), pilot::PilotError> {
//! let surface = Arc::new(FixtureSurface::from_files("screen.png".as_ref(), None)?);
//! let oracle = Arc::new(GeminiOracle::new(GeminiConfig::from_env()?));
//! let pilot = Pilot::new(surface, oracle, PilotConfig::default());
//! if let Some(session) = pilot.start("open settings") {
//!     println!("finished in state {}", session.wait().await);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod decision;
pub mod errors;
pub mod executor;
pub mod observation;
pub mod oracle;
pub mod platforms;
pub mod types;

pub use agent::{Pilot, SessionHandle};
pub use config::{
    AgentConfig, CoordinatePolicy, ExecutorConfig, MarkerTiming, ObservationConfig, OraclePolicy,
    PilotConfig, PromptConfig,
};
pub use decision::DecisionClient;
pub use errors::PilotError;
pub use executor::{ActionExecutor, ExecutionResult};
pub use observation::ObservationBuilder;
pub use oracle::{DecisionOracle, GeminiConfig, GeminiOracle, OracleRequest};
pub use platforms::{AutomationSurface, FixtureSurface, SurfaceEvent};
pub use types::{
    Action, Bounds, Decision, EncodedImage, FailureReason, MarkerColor, MarkerId, Observation,
    Point, PointerPath, ScreenshotResult, SessionState, StepOutcome, StepRecord, TextCommit,
    UIElement, UINode,
};
