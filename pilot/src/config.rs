//! Tunables for the control loop
//!
//! Defaults: 2 s settle after every dispatched action, 100 ms tap hold,
//! 500 ms swipe, 1024 px long edge, no oracle timeout or retry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Longest edge allowed for the image sent to the oracle
    pub max_image_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 1024,
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Resolution the oracle is told to express coordinates in
    pub reference_width: u32,
    pub reference_height: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            reference_width: 1080,
            reference_height: 2400,
        }
    }
}

/// Retry and timeout policy for oracle round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OraclePolicy {
    /// `None` waits forever
    pub timeout_ms: Option<u64>,
    /// Extra attempts after an `OracleUnavailable` failure
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OraclePolicy {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_retries: 0,
            retry_backoff_ms: 1000,
        }
    }
}

impl OraclePolicy {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Lead times between showing a marker and dispatching the gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTiming {
    pub click_lead_ms: u64,
    pub type_lead_ms: u64,
    pub swipe_start_lead_ms: u64,
    pub swipe_end_lead_ms: u64,
}

impl Default for MarkerTiming {
    fn default() -> Self {
        Self {
            click_lead_ms: 800,
            type_lead_ms: 800,
            swipe_start_lead_ms: 500,
            swipe_end_lead_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub click_hold_ms: u64,
    pub swipe_duration_ms: u64,
    /// `None` disables visual markers entirely
    pub markers: Option<MarkerTiming>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            click_hold_ms: 100,
            swipe_duration_ms: 500,
            markers: Some(MarkerTiming::default()),
        }
    }
}

/// What to do with oracle coordinates that fall outside the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatePolicy {
    /// Dispatch exactly what the oracle returned
    #[default]
    PassThrough,
    /// Clamp into the raw screen bounds of the latest observation
    ClampToScreen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Wait after a dispatched action before observing again
    pub settle_delay_ms: u64,
    pub max_cycles: Option<u32>,
    pub coordinate_policy: CoordinatePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            max_cycles: None,
            coordinate_policy: CoordinatePolicy::PassThrough,
        }
    }
}

impl AgentConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub observation: ObservationConfig,
    pub prompt: PromptConfig,
    pub oracle: OraclePolicy,
    pub executor: ExecutorConfig,
    pub agent: AgentConfig,
}
