use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Fields a `POST /api/calculate_needs` body must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "age",
    "weight",
    "height",
    "gender",
    "activity_level",
    "objectives",
];

/// Form values arrive either as JSON numbers or as strings ("46", "male").
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Number(Number),
    Text(String),
}

impl ProfileValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for ProfileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s.trim()),
        }
    }
}

/// Biometric and lifestyle inputs for a single advice request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    pub age: Option<ProfileValue>,
    pub weight: Option<ProfileValue>,
    pub height: Option<ProfileValue>,
    pub gender: Option<ProfileValue>,
    pub activity_level: Option<ProfileValue>,
    pub profession: Option<ProfileValue>,
    pub objectives: Option<ProfileValue>,
    pub medical_conditions: Option<ProfileValue>,
    pub allergies: Option<ProfileValue>,
    pub intolerances: Option<ProfileValue>,
}

/// Required fields that are absent, null or blank in a raw request body.
pub fn missing_required(body: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| match body.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect()
}

/// Daily intake recommendation produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceResult {
    pub calories: Number,
    pub protein: Number,
    pub carbs: Number,
    pub fat: Number,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalized_advice: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceErrorKind {
    /// No credential, or the credential was refused.
    Unconfigured,
    /// Timeout, connection failure, rate limit or upstream 5xx.
    Unavailable,
    /// Any other upstream failure.
    Upstream,
    EmptyResponse,
    InvalidJson,
    SchemaViolation,
}

impl AdviceErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Unavailable => "unavailable",
            Self::Upstream => "upstream",
            Self::EmptyResponse => "empty_response",
            Self::InvalidJson => "invalid_json",
            Self::SchemaViolation => "schema_violation",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Unconfigured | Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream | Self::EmptyResponse | Self::InvalidJson | Self::SchemaViolation => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AdviceError {
    pub kind: AdviceErrorKind,
    pub message: String,
}

impl AdviceError {
    pub fn new(kind: AdviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
