//! Gemini `generateContent` client

use super::{DecisionOracle, OracleRequest};
use crate::PilotError;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, instrument, warn};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read `GEMINI_API_KEY`, `GEMINI_MODEL` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self, PilotError> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PilotError::InvalidArgument("GEMINI_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    InlineData { inline_data: InlineData },
    Text { text: String },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

pub struct GeminiOracle {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiOracle {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(request: &OracleRequest) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.to_base64(),
                        },
                    },
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
impl DecisionOracle for GeminiOracle {
    #[instrument(level = "debug", skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: &OracleRequest) -> Result<String, PilotError> {
        let resp = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| PilotError::OracleUnavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PilotError::OracleUnavailable(format!("failed to read body: {e}")))?;
        if !status.is_success() {
            warn!("Gemini error: {} - {}", status, body);
            return Err(PilotError::OracleUnavailable(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            PilotError::OracleUnavailable(format!("unexpected Gemini payload: {e}"))
        })?;
        if let Some(error) = parsed.error {
            return Err(PilotError::OracleUnavailable(error.message));
        }
        let text = parsed
            .text()
            .ok_or_else(|| PilotError::OracleUnavailable("empty response".to_string()))?;
        debug!("Gemini reply: {}", text);
        Ok(text)
    }
}
