use crate::config::Config;
use crate::extract::{self, MalformedResponse};
use crate::prompt::{self, TargetLanguage};
use crate::upstream::{CompletionParams, UpstreamClient, UpstreamError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{any::Any, sync::Arc};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error, info, warn};

const SUMMARY_MAX_TOKENS: u32 = 2500;
const SUMMARY_TEMPERATURE: f64 = 0.7;
const TRANSLATE_MAX_TOKENS: u32 = 4000;
const TRANSLATE_TEMPERATURE: f64 = 0.3;

const FALLBACK_WARNING: &str =
    "Translation service returned no text; showing the original text instead";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/summarize", post(summarize))
        .route("/api/translate", post(translate))
        .with_state(Arc::new(state))
}

/// Turns a panic anywhere below into a JSON 500 instead of a dropped connection.
pub fn supervise(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}

pub fn app(state: AppState) -> Router {
    supervise(routes(state))
}

// -------------------------------------------------------------------
// Health

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    model: String,
    api_key_configured: bool,
    #[serde(rename = "baseURL")]
    base_url: String,
    message: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.config.model.clone(),
        api_key_configured: state.config.api_key_configured(),
        base_url: state.config.base_url.clone(),
        message: "Summarizer backend is running",
    })
}

// -------------------------------------------------------------------
// Summarize

async fn summarize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::rejected)?;
    let paragraphs = validate_paragraphs(payload.paragraphs)?;
    info!(paragraphs = paragraphs.len(), "summarizing");

    let messages = prompt::summarize_messages(&paragraphs);
    let params = CompletionParams {
        max_tokens: SUMMARY_MAX_TOKENS,
        temperature: SUMMARY_TEMPERATURE,
        timeout: None,
    };
    let body = state
        .upstream
        .chat(&messages, params)
        .await
        .map_err(|e| ApiError::upstream("Failed to generate summary", e))?;

    let summary = extract::message_content(&body)
        .map_err(|e| ApiError::malformed("Failed to generate summary", e))?
        .ok_or_else(|| {
            ApiError::internal("Failed to generate summary", "upstream returned an empty summary")
        })?;

    Ok(Json(SummarizeResponse {
        success: true,
        summary,
        paragraph_count: paragraphs.len(),
        model: state.config.model.clone(),
    }))
}

fn validate_paragraphs(raw: Option<Value>) -> Result<Vec<String>, ApiError> {
    let invalid = || {
        ApiError::bad_request(
            "Invalid paragraphs",
            "paragraphs must be a non-empty array of non-empty strings",
        )
    };
    let items = match raw {
        None | Some(Value::Null) => {
            return Err(ApiError::bad_request(
                "Missing paragraphs",
                "request body must include a paragraphs array",
            ))
        }
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => return Err(invalid()),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(text) if !text.is_empty() => Ok(text),
            _ => Err(invalid()),
        })
        .collect()
}

// -------------------------------------------------------------------
// Translate

async fn translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::rejected)?;
    let text = match payload.text {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(ApiError::bad_request("Missing text", "text must be a non-empty string"))
        }
        Some(_) => {
            return Err(ApiError::bad_request("Invalid text", "text must be a non-empty string"))
        }
    };

    // Script detection always decides; the client's hint is only logged.
    let target = TargetLanguage::detect(&text);
    if let Some(hint) = payload.target.as_deref() {
        if TargetLanguage::from_hint(hint) != Some(target) {
            debug!(hint, detected = target.name(), "ignoring requested target language");
        }
    }
    info!(chars = text.chars().count(), target = target.name(), "translating");

    let messages = prompt::translate_messages(&text, target);
    let params = CompletionParams {
        max_tokens: TRANSLATE_MAX_TOKENS,
        temperature: TRANSLATE_TEMPERATURE,
        timeout: Some(state.config.translate_timeout),
    };
    let body = match state.upstream.chat(&messages, params).await {
        Ok(body) => body,
        Err(UpstreamError::Status { status: 429, body }) => {
            return Err(ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again in a few moments.",
                body,
            ))
        }
        Err(err) => return Err(ApiError::upstream("Translation failed", err)),
    };

    let translated = extract::translation_text(&body, state.config.reasoning_fallback)
        .map_err(|e| ApiError::malformed("Translation failed", e))?;

    Ok(Json(match translated {
        Some(translated_text) => TranslateResponse {
            success: true,
            translated_text,
            warning: None,
        },
        None => {
            warn!("upstream returned no usable translation; echoing input");
            TranslateResponse {
                success: true,
                translated_text: text,
                warning: Some(FALLBACK_WARNING),
            }
        }
    }))
}

// -------------------------------------------------------------------
// DTOs

#[derive(Deserialize)]
struct SummarizeRequest {
    #[serde(default)]
    paragraphs: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeResponse {
    success: bool,
    summary: String,
    paragraph_count: usize,
    model: String,
}

#[derive(Deserialize)]
struct TranslateRequest {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    success: bool,
    translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

// -------------------------------------------------------------------
// Errors

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    details: &'a str,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: String,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: impl Into<String>) -> Self {
        Self { status, error: error.into(), details: details.into() }
    }

    fn bad_request(error: &str, details: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, details)
    }

    fn internal(error: &str, details: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, details.to_string())
    }

    fn rejected(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request body", rejection.body_text())
    }

    fn malformed(context: &str, err: MalformedResponse) -> Self {
        Self::internal(context, err)
    }

    fn upstream(context: &str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotConfigured => Self::internal(
                "API key not configured",
                "set OPENROUTER_API_KEY or OPENAI_API_KEY on the server",
            ),
            UpstreamError::Timeout(_) => Self::internal("Request timed out", err),
            other => Self::internal(context, other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.error, details = %self.details, "request failed");
        }
        let body = Json(ErrorBody { error: &self.error, details: &self.details });
        (self.status, body).into_response()
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::internal("Internal server error", details).into_response()
}
