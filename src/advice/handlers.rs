use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use super::dto::{missing_required, AdviceError, AdviceResult, UserProfile};
use crate::{
    errors::{bad_request, ApiError, ErrorBody},
    state::AppState,
};

pub fn advice_routes() -> Router<AppState> {
    Router::new().route("/calculate_needs", post(calculate_needs))
}

fn advice_error(e: AdviceError) -> ApiError {
    (
        e.kind.status_code(),
        Json(ErrorBody {
            error: e.message,
            kind: Some(e.kind.as_str()),
            missing_fields: Vec::new(),
        }),
    )
}

/// POST /api/calculate_needs
#[instrument(skip(state, payload))]
pub async fn calculate_needs(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AdviceResult>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        warn!(error = %e, "calculate_needs body rejected");
        bad_request("Request body must be JSON")
    })?;

    let Value::Object(fields) = body else {
        warn!("calculate_needs body is not an object");
        return Err(bad_request("Request body must be a JSON object"));
    };

    let missing = missing_required(&fields);
    if !missing.is_empty() {
        warn!(?missing, "calculate_needs missing fields");
        let mut err = ErrorBody::new(format!(
            "Missing required fields: {}",
            missing.join(", ")
        ));
        err.missing_fields = missing;
        return Err((axum::http::StatusCode::BAD_REQUEST, Json(err)));
    }

    let profile: UserProfile = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        warn!(error = %e, "calculate_needs invalid field types");
        bad_request("Profile fields must be numbers or strings")
    })?;

    match state.advisor.get_advice(&profile).await {
        Ok(advice) => {
            info!(calories = %advice.calories, "calculate_needs ok");
            Ok(Json(advice))
        }
        Err(e) => {
            error!(kind = e.kind.as_str(), error = %e, "advice generation failed");
            Err(advice_error(e))
        }
    }
}

#[cfg(test)]
mod handler_tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::advice::{client::AdviceGenerator, dto::AdviceErrorKind};

    struct FakeAdvisor {
        seen: Mutex<Vec<UserProfile>>,
        reply: Result<AdviceResult, AdviceError>,
    }

    impl FakeAdvisor {
        fn replying(reply: Result<AdviceResult, AdviceError>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl AdviceGenerator for FakeAdvisor {
        async fn get_advice(&self, profile: &UserProfile) -> Result<AdviceResult, AdviceError> {
            self.seen.lock().unwrap().push(profile.clone());
            self.reply.clone()
        }
    }

    fn sample_advice() -> AdviceResult {
        AdviceResult {
            calories: 2500.into(),
            protein: 125.into(),
            carbs: 310.into(),
            fat: 83.into(),
            notes: "Balanced intake for maintenance.".into(),
            personalized_advice: Some(vec!["Hydrate.".into()]),
        }
    }

    fn minimal_body() -> Value {
        json!({
            "age": 30, "weight": 70, "height": 175, "gender": "male",
            "activity_level": "moderate", "objectives": "maintenance"
        })
    }

    async fn post_raw(
        advisor: Option<Arc<FakeAdvisor>>,
        content_type: Option<&str>,
        body: String,
    ) -> (StatusCode, Value) {
        let foods = Arc::new(crate::state::NoFoods);
        let state = crate::state::AppState::for_tests(
            foods,
            advisor.map(|a| a as Arc<dyn AdviceGenerator>),
        );
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/api/calculate_needs");
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        let res = crate::app::build_app(state)
            .oneshot(req.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(advisor: Option<Arc<FakeAdvisor>>, body: Value) -> (StatusCode, Value) {
        post_raw(advisor, Some("application/json"), body.to_string()).await
    }

    #[tokio::test]
    async fn empty_object_lists_all_required_fields() {
        let advisor = FakeAdvisor::replying(Ok(sample_advice()));
        let (status, body) = post_json(Some(advisor.clone()), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["missing_fields"],
            json!(["age", "weight", "height", "gender", "activity_level", "objectives"])
        );
        for field in ["age", "weight", "height", "gender", "activity_level", "objectives"] {
            assert!(body["error"].as_str().unwrap().contains(field));
        }
        assert!(advisor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partially_missing_fields_are_listed() {
        let advisor = FakeAdvisor::replying(Ok(sample_advice()));
        let (status, body) = post_json(
            Some(advisor),
            json!({ "age": 30, "weight": 70, "height": 175, "gender": "male" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["missing_fields"], json!(["activity_level", "objectives"]));
    }

    #[tokio::test]
    async fn non_json_body_is_bad_request() {
        let (status, body) = post_raw(None, Some("text/plain"), "age=30".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Request body must be JSON");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, _) = post_raw(None, Some("application/json"), "{\"age\": ".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn json_array_body_is_bad_request() {
        let (status, _) = post_json(None, json!([1, 2, 3])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn structured_field_value_is_bad_request() {
        let mut body = minimal_body();
        body["age"] = json!({ "years": 30 });
        let (status, _) = post_json(None, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn minimal_profile_returns_advice() {
        let advisor = FakeAdvisor::replying(Ok(sample_advice()));
        let (status, body) = post_json(Some(advisor.clone()), minimal_body()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["calories"].is_number());
        assert!(body["protein"].is_number());
        assert!(body["carbs"].is_number());
        assert!(body["fat"].is_number());
        assert!(!body["notes"].as_str().unwrap().is_empty());

        let seen = advisor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].gender.as_ref().unwrap().to_string(), "male");
    }

    #[tokio::test]
    async fn unconfigured_service_is_503_with_kind() {
        let (status, body) = post_json(None, minimal_body()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "unconfigured");
        assert!(body["error"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn schema_violation_is_500_and_verbatim() {
        let advisor = FakeAdvisor::replying(Err(AdviceError::new(
            AdviceErrorKind::SchemaViolation,
            "Invalid AI response format: missing keys fat.",
        )));
        let (status, body) = post_json(Some(advisor), minimal_body()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "error": "Invalid AI response format: missing keys fat.",
                "kind": "schema_violation"
            })
        );
    }

    #[tokio::test]
    async fn upstream_outage_is_503() {
        let advisor = FakeAdvisor::replying(Err(AdviceError::new(
            AdviceErrorKind::Unavailable,
            "Timeout while communicating with the AI service.",
        )));
        let (status, body) = post_json(Some(advisor), minimal_body()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "unavailable");
    }
}
