use axum::{http::StatusCode, Json};
use serde::Serialize;

/// JSON error payload shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<&'static str>,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: None,
            missing_fields: Vec::new(),
        }
    }
}

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody::new(message)))
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

#[cfg(test)]
mod errors_tests {
    use super::*;

    #[test]
    fn empty_extras_are_omitted() {
        let json = serde_json::to_value(ErrorBody::new("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "nope" }));
    }
}
