//! Sprout HTTP service
//!
//! Axum server hosting the upload page and the identification API. Each
//! endpoint has a thin axum handler that delegates to an inner function the
//! tests can call without going through the router.
//!
//! Endpoints:
//! - GET  /                upload page
//! - POST /identify        multipart `image` upload → plant info
//! - GET  /session         current session snapshot
//! - POST /session/reset   back to idle
//! - GET  /health          configuration summary
//! - GET  /version         server version info

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use sprout_core::api::PROTOCOL;
use sprout_core::{
    encode_image, AnalyzeError, GeminiClient, IdentificationSession, IdentifyError, Identifier,
    SessionSnapshot, SproutConfig, SproutError, SproutResponse,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: SproutConfig,
    pub model: String,
    pub identifier: Identifier,
    pub session: Arc<IdentificationSession>,
}

impl HttpState {
    /// Validate the config and build the Gemini-backed identifier. Fails if the
    /// credential or model is missing.
    pub fn from_config(config: SproutConfig) -> Result<Self, SproutError> {
        let gemini = config.validate()?;
        let model = gemini.model.clone();
        let client = GeminiClient::new(gemini)?;
        let session = Arc::new(IdentificationSession::new(config.session.in_flight_policy));

        Ok(Self {
            config,
            model,
            identifier: Identifier::new(Arc::new(client)),
            session,
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let body_limit = state.config.http.max_upload_bytes;
    Router::new()
        .route("/", get(index_handler))
        .route("/identify", post(identify_handler))
        .route("/session", get(session_handler))
        .route("/session/reset", post(reset_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Sprout listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Upload extraction
// ============================================================================

/// An uploaded file, as taken off the multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Pull the `image` field out of the multipart body. Other fields are skipped.
pub async fn read_upload(
    multipart: &mut Multipart,
) -> std::result::Result<Upload, (StatusCode, SproutResponse)> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err((e.status(), SproutResponse::err("bad_request", e.body_text())));
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (e.status(), SproutResponse::err("bad_request", e.body_text())))?;

        return Ok(Upload {
            bytes,
            content_type,
            file_name,
        });
    }

    Err((
        StatusCode::BAD_REQUEST,
        SproutResponse::err("bad_request", "image field is required"),
    ))
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// HTTP status for each analysis failure.
pub fn status_for(error: &AnalyzeError) -> StatusCode {
    match error {
        AnalyzeError::Busy | AnalyzeError::Superseded => StatusCode::CONFLICT,
        AnalyzeError::Identify(IdentifyError::Transport(_)) => StatusCode::BAD_GATEWAY,
        AnalyzeError::Identify(IdentifyError::Parse(_)) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Inner identify: encodes the upload and runs it through the session.
pub async fn identify_inner(state: &HttpState, upload: Upload) -> (StatusCode, SproutResponse) {
    if upload.bytes.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            SproutResponse::err("bad_request", "uploaded image is empty"),
        );
    }

    let start = Instant::now();
    let encoded = encode_image(&upload.bytes, upload.content_type.as_deref());

    tracing::info!(
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        mime_type = %encoded.payload.mime_type,
        bytes = upload.bytes.len(),
        "Received upload"
    );

    match state.session.analyze(&state.identifier, encoded).await {
        Ok(analysis) => {
            let took_ms = start.elapsed().as_millis() as u64;
            (
                StatusCode::OK,
                SproutResponse::ok(serde_json::json!({
                    "analysis_id": analysis.id,
                    "plant": analysis.plant,
                    "took_ms": took_ms,
                })),
            )
        }
        Err(e) => (status_for(&e), SproutResponse::err(e.kind(), e.user_message())),
    }
}

pub fn session_inner(state: &HttpState) -> SessionSnapshot {
    state.session.snapshot()
}

pub fn reset_inner(state: &HttpState) -> SessionSnapshot {
    state.session.reset();
    state.session.snapshot()
}

/// Inner health: reports the resolved model and policy (no remote call).
pub fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "model": state.model,
            "backend": state.identifier.backend_name(),
            "in_flight_policy": state.session.policy(),
            "session": state.session.snapshot().state,
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL,
    })
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn identify_handler(
    State(state): State<Arc<HttpState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err((status, body)) => return (status, Json(body)),
    };
    let (status, body) = identify_inner(&state, upload).await;
    (status, Json(body))
}

pub async fn session_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(session_inner(&state))
}

pub async fn reset_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(reset_inner(&state))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state);
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_core::{GeminiError, ParseError, SessionState};

    const CONFIG: &str = r#"
        [gemini]
        api_key = "test-api-key"
        model = "gemini-2.0-flash"
        base_url = "http://127.0.0.1:9"
        timeout_seconds = 2
    "#;

    fn make_state() -> HttpState {
        let config = SproutConfig::from_toml_str(CONFIG).expect("config");
        HttpState::from_config(config).expect("state")
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "sprout/1");
    }

    #[test]
    fn test_health_inner_reports_model() {
        let state = make_state();
        let (status, body) = health_inner(&state);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "gemini-2.0-flash");
        assert_eq!(body["backend"], "gemini");
        assert_eq!(body["in_flight_policy"], "replace");
        assert_eq!(body["session"], "idle");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_from_config_fails_fast_without_model() {
        let config = SproutConfig::from_toml_str("[gemini]\napi_key = \"k\"\nmodel = \"\"").unwrap();
        // An empty model in the file falls back to GEMINI_MODEL; only assert
        // when the environment does not supply one.
        if std::env::var("GEMINI_MODEL").map(|m| m.trim().is_empty()).unwrap_or(true) {
            assert!(matches!(
                HttpState::from_config(config),
                Err(SproutError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_status_for_each_failure() {
        assert_eq!(status_for(&AnalyzeError::Busy), StatusCode::CONFLICT);
        assert_eq!(status_for(&AnalyzeError::Superseded), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&AnalyzeError::Identify(IdentifyError::Transport(
                GeminiError::EmptyResponse
            ))),
            StatusCode::BAD_GATEWAY
        );
        let parse = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        assert_eq!(
            status_for(&AnalyzeError::Identify(IdentifyError::Parse(
                ParseError::Malformed(parse)
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_identify_inner_rejects_empty_upload() {
        let state = make_state();
        let upload = Upload {
            bytes: Bytes::new(),
            content_type: Some("image/jpeg".to_string()),
            file_name: Some("leaf.jpg".to_string()),
        };
        let (status, body) = identify_inner(&state, upload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.kind.as_deref(), Some("bad_request"));
        assert_eq!(session_inner(&state).state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_identify_inner_unreachable_model_is_bad_gateway() {
        let state = make_state();
        let upload = Upload {
            bytes: Bytes::from_static(b"leaf"),
            content_type: Some("image/jpeg".to_string()),
            file_name: None,
        };
        let (status, body) = identify_inner(&state, upload).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.kind.as_deref(), Some("transport"));
        assert!(body.error.unwrap().starts_with("Error: "));

        let snap = session_inner(&state);
        assert_eq!(snap.state, SessionState::HasError);
        assert!(snap.preview.is_some());
    }

    #[test]
    fn test_reset_inner_returns_idle() {
        let state = make_state();
        assert_eq!(reset_inner(&state).state, SessionState::Idle);
    }

    #[test]
    fn test_index_page_has_image_picker() {
        assert!(INDEX_HTML.contains("type=\"file\""));
        assert!(INDEX_HTML.contains("accept=\"image/*\""));
        assert!(INDEX_HTML.contains("/identify"));
    }

    #[test]
    fn test_index_page_locks_picker_while_pending() {
        assert!(INDEX_HTML.contains("input.disabled = true"));
        assert!(INDEX_HTML.contains("input.disabled = false"));
    }

    #[test]
    fn test_index_page_handles_non_json_replies() {
        assert!(INDEX_HTML.contains("application/json"));
        assert!(INDEX_HTML.contains("resp.status === 413"));
        assert!(INDEX_HTML.contains("Image is too large"));
    }
}
