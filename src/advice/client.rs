use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, error, info, instrument, warn};

use super::dto::{AdviceError, AdviceErrorKind, AdviceResult, UserProfile};
use super::prompt::build_prompt;
use crate::config::GeminiConfig;
use crate::upstream::{build_http_client, preview, InitError};

const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const RESPONSE_MIME_TYPE: &str = "application/json";

#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn get_advice(&self, profile: &UserProfile) -> Result<AdviceResult, AdviceError>;

    /// Whether the generator can reach a model at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Stands in for the real client when it could not be built at startup.
pub struct UnavailableAdvisor {
    reason: String,
}

impl UnavailableAdvisor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AdviceGenerator for UnavailableAdvisor {
    async fn get_advice(&self, _profile: &UserProfile) -> Result<AdviceResult, AdviceError> {
        warn!(reason = %self.reason, "advice requested while the AI service is unconfigured");
        Err(AdviceError::new(
            AdviceErrorKind::Unconfigured,
            format!("AI advice service unavailable ({})", self.reason),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

// --- Gemini wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Google Gemini `generateContent` client running in JSON mode.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    language: String,
}

impl GeminiClient {
    pub fn from_config(cfg: &GeminiConfig, user_agent: &str) -> Result<Self, InitError> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(InitError::MissingCredential(GEMINI_API_KEY_ENV))?;
        Ok(Self {
            http: build_http_client(user_agent, cfg.timeout())?,
            api_key,
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            timeout: cfg.timeout(),
            language: cfg.language.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdviceError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE,
                candidate_count: 1,
            },
        };

        let res = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = res.status();
        let text = res.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!(%status, body = %preview(&text, 500), "gemini api error");
            return Err(map_status_error(status, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            error!(error = %e, body = %preview(&text, 500), "failed to parse gemini envelope");
            AdviceError::new(
                AdviceErrorKind::Upstream,
                "Error interacting with the AI service: unreadable response envelope",
            )
        })?;

        if let Some(err) = parsed.error {
            return Err(AdviceError::new(
                AdviceErrorKind::Upstream,
                format!("Error interacting with the AI service: {}", err.message),
            ));
        }

        let candidate = parsed.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let generated: String = candidate
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(?finish_reason, chars = generated.len(), "gemini responded");
        Ok(generated)
    }
}

fn map_transport_error(e: reqwest::Error) -> AdviceError {
    error!(error = %e, "gemini request failed");
    let message = if e.is_timeout() {
        "Timeout while communicating with the AI service."
    } else {
        "Problem communicating with the AI service. Please try again later."
    };
    AdviceError::new(AdviceErrorKind::Unavailable, message)
}

fn map_status_error(status: StatusCode, body: &str) -> AdviceError {
    let message = serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map_or_else(|| format!("HTTP {}", status.as_u16()), |e| e.message);

    let kind = match status.as_u16() {
        401 | 403 => AdviceErrorKind::Unconfigured,
        429 | 500..=599 => AdviceErrorKind::Unavailable,
        _ => AdviceErrorKind::Upstream,
    };
    AdviceError::new(
        kind,
        format!("Error interacting with the AI service: {message}"),
    )
}

/// Drops a surrounding markdown code fence and its info string (`json`, `JSON`, ...),
/// if the model added one anyway.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if !tag.contains(|c: char| c == '{' || c == '[') => body,
        _ => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn numeric(obj: &Map<String, Value>, key: &str) -> Option<Number> {
    match obj.get(key)? {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Validates model output against the required-key schema.
pub fn parse_advice(text: &str) -> Result<AdviceResult, AdviceError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(AdviceError::new(
            AdviceErrorKind::EmptyResponse,
            "The AI service returned an empty response.",
        ));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, text = %preview(body, 500), "model output is not json");
        AdviceError::new(
            AdviceErrorKind::InvalidJson,
            "The AI service response is not valid JSON.",
        )
    })?;

    let Value::Object(obj) = value else {
        return Err(AdviceError::new(
            AdviceErrorKind::SchemaViolation,
            "The AI service response is not a JSON object.",
        ));
    };

    let missing: Vec<&str> = ["calories", "protein", "carbs", "fat", "notes"]
        .into_iter()
        .filter(|k| !obj.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        error!(?missing, "model output is missing required keys");
        return Err(AdviceError::new(
            AdviceErrorKind::SchemaViolation,
            format!(
                "Invalid AI response format: missing keys {}.",
                missing.join(", ")
            ),
        ));
    }

    let number = |key: &str| {
        numeric(&obj, key).ok_or_else(|| {
            AdviceError::new(
                AdviceErrorKind::SchemaViolation,
                format!("Invalid AI response format: \"{key}\" is not a number."),
            )
        })
    };
    let calories = number("calories")?;
    let protein = number("protein")?;
    let carbs = number("carbs")?;
    let fat = number("fat")?;

    let notes = obj
        .get("notes")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AdviceError::new(
                AdviceErrorKind::SchemaViolation,
                "Invalid AI response format: \"notes\" must be a non-empty string.",
            )
        })?
        .to_string();

    let personalized_advice = match obj.get("personalized_advice") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    };

    Ok(AdviceResult {
        calories,
        protein,
        carbs,
        fat,
        notes,
        personalized_advice,
    })
}

#[async_trait]
impl AdviceGenerator for GeminiClient {
    #[instrument(skip(self, profile))]
    async fn get_advice(&self, profile: &UserProfile) -> Result<AdviceResult, AdviceError> {
        let prompt = build_prompt(profile, &self.language);
        debug!(model = %self.model, prompt_chars = prompt.len(), "sending prompt to gemini");

        let text = self.generate(&prompt).await?;
        let advice = parse_advice(&text)?;
        info!(calories = %advice.calories, "advice generated");
        Ok(advice)
    }
}
