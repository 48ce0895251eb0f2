//! Prompt rendering and reply parsing for the decision oracle

use crate::config::{OraclePolicy, PromptConfig};
use crate::oracle::{DecisionOracle, OracleRequest};
use crate::{Action, Decision, Observation, PilotError, UIElement};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Wire shape of the four accepted replies. Decoding validates every
/// required field before an [`Action`] exists.
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum WireAction {
    Click {
        x: f64,
        y: f64,
    },
    Type {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Swipe {
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
    },
    Done {},
}

impl From<WireAction> for Action {
    fn from(wire: WireAction) -> Self {
        match wire {
            WireAction::Click { x, y } => Action::Click { x, y },
            WireAction::Type { text } => Action::TypeText { text },
            WireAction::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
            } => Action::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
            },
            WireAction::Done {} => Action::Done,
        }
    }
}

const KNOWN_ACTIONS: [&str; 4] = ["click", "type", "swipe", "done"];

/// One line per element: visible text, accessible label, bounding box.
/// Text and label are quoted and escaped so each element stays on one line.
pub fn render_elements(elements: &[UIElement]) -> String {
    if elements.is_empty() {
        return "(no clickable elements)".to_string();
    }
    let mut out = String::new();
    for element in elements {
        let _ = writeln!(
            out,
            "- text={:?} label={:?} bounds={}",
            element.text, element.accessible_label, element.bounds
        );
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn build_prompt(task: &str, elements: &[UIElement], config: &PromptConfig) -> String {
    format!(
        r#"TASK: {task}

Clickable elements on screen:
{elements}

You control an Android device to accomplish the TASK. Study the screenshot
and the element list, then choose exactly ONE next action that moves the
task forward.

Reply with one of these JSON objects:
{{"thought": "<what you see and why>", "action": "click", "x": <px>, "y": <px>}}
{{"thought": "<why>", "action": "type", "text": "<text for the focused field>"}}
{{"thought": "<why>", "action": "swipe", "startX": <px>, "startY": <px>, "endX": <px>, "endY": <px>}}
{{"thought": "<why the task is finished>", "action": "done"}}

Rules:
- Coordinates are absolute pixels on a {width}x{height} screen.
- Click an input field to focus it before using "type".
- Respond with the JSON object only."#,
        elements = render_elements(elements),
        width = config.reference_width,
        height = config.reference_height,
    )
}

/// The substring from the first `{` to the last `}` inclusive, or the
/// whole reply when it has no `{`.
pub fn extract_json_candidate(raw: &str) -> Result<&str, PilotError> {
    match (raw.find('{'), raw.rfind('}')) {
        (None, _) => Ok(raw.trim()),
        (Some(start), Some(end)) if end > start => Ok(&raw[start..=end]),
        _ => Err(PilotError::MalformedAction(format!(
            "unbalanced braces in reply: {raw}"
        ))),
    }
}

/// Parse a raw oracle reply.
///
/// Structural problems (no JSON object, missing or mistyped fields for a
/// known action) are `MalformedAction`; a well-formed object whose `action`
/// tag is missing or unrecognized becomes [`Action::Unknown`].
pub fn parse_decision(raw: &str) -> Result<Decision, PilotError> {
    let candidate = extract_json_candidate(raw)?;
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| PilotError::MalformedAction(format!("invalid JSON ({e}): {candidate}")))?;
    let object = value.as_object().ok_or_else(|| {
        PilotError::MalformedAction(format!("reply is not a JSON object: {candidate}"))
    })?;

    let thought = object
        .get("thought")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tag = match object.get("action") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    let action = if KNOWN_ACTIONS.contains(&tag.as_str()) {
        let wire: WireAction = serde_json::from_value(value.clone()).map_err(|e| {
            PilotError::MalformedAction(format!("{tag} action rejected: {e}"))
        })?;
        Action::from(wire)
    } else {
        Action::Unknown { raw: tag }
    };

    Ok(Decision { action, thought })
}

/// Turns an observation and task into one validated [`Decision`].
#[derive(Clone)]
pub struct DecisionClient {
    oracle: Arc<dyn DecisionOracle>,
    prompt: PromptConfig,
    policy: OraclePolicy,
}

impl DecisionClient {
    pub fn new(oracle: Arc<dyn DecisionOracle>, prompt: PromptConfig, policy: OraclePolicy) -> Self {
        Self {
            oracle,
            prompt,
            policy,
        }
    }

    #[instrument(level = "debug", skip(self, observation), fields(elements = observation.elements.len()))]
    pub async fn decide(&self, task: &str, observation: &Observation) -> Result<Decision, PilotError> {
        let request = OracleRequest {
            prompt: build_prompt(task, &observation.elements, &self.prompt),
            image: observation.image.clone(),
        };
        debug!("Oracle prompt:\n{}", request.prompt);

        let raw = self.request(&request).await?;
        debug!("Oracle reply: {}", raw);

        let decision = parse_decision(&raw)?;
        info!(
            "Agent thought: {}",
            decision.thought.as_deref().unwrap_or("No reasoning provided")
        );
        info!("Agent decided: {:?}", decision.action);
        Ok(decision)
    }

    /// One oracle round-trip under the configured timeout and retry policy.
    async fn request(&self, request: &OracleRequest) -> Result<String, PilotError> {
        let mut attempt = 0;
        loop {
            let result = match self.policy.timeout() {
                Some(timeout) => tokio::time::timeout(timeout, self.oracle.complete(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(PilotError::OracleUnavailable(format!(
                            "no reply within {timeout:?}"
                        )))
                    }),
                None => self.oracle.complete(request).await,
            };

            let result = result.and_then(|text| {
                if text.trim().is_empty() {
                    Err(PilotError::OracleUnavailable("empty response".to_string()))
                } else {
                    Ok(text)
                }
            });

            match result {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        "Oracle attempt {} failed: {}; retrying in {:?}",
                        attempt,
                        e,
                        self.policy.retry_backoff()
                    );
                    tokio::time::sleep(self.policy.retry_backoff()).await;
                }
                other => return other,
            }
        }
    }
}
