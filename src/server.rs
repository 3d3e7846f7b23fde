//! HTTP surface: router, wire types, and the screenshot handler

use crate::{render_screenshot, Engine, Error, RenderOptions, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Deployment-level handler configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Include raw error detail in failure responses
    pub dev_mode: bool,
    /// Hard deadline for one render, covering launch through capture
    pub render_deadline_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            render_deadline_ms: 30_000,
        }
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<dyn Engine>,
    config: Arc<ServerConfig>,
}

/// Incoming request body for the screenshot endpoint
#[derive(Debug, Deserialize)]
pub struct ScreenshotRequest {
    /// HTML/CSS source to render
    #[serde(default)]
    pub code: String,
    /// Rendering options, all optional
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Build the service router around an engine.
pub fn router(engine: Arc<dyn Engine>, config: ServerConfig) -> Router {
    let state = AppState {
        engine,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/screenshot",
            post(screenshot)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Non-preflight OPTIONS (preflights are answered by the CORS layer).
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    let body = ErrorBody {
        message: "Method not allowed".into(),
        error: None,
    };
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}

async fn screenshot(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScreenshotRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let err = Error::InvalidOptions(format!("Invalid JSON body: {}", rejection));
            return error_response(&err, state.config.dev_mode);
        }
    };

    info!("starting screenshot generation");
    let started = Instant::now();

    let engine = state.engine.clone();
    let options = request.options.clone();
    let render_options = options.clone();
    let task = tokio::task::spawn_blocking(move || {
        render_screenshot(engine.as_ref(), &request.code, &render_options)
    });

    let deadline = Duration::from_millis(state.config.render_deadline_ms);
    let rendered: Result<Vec<u8>> = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::Other(format!("Render task failed: {}", join_err))),
        Err(_) => Err(Error::Timeout(state.config.render_deadline_ms)),
    };

    match rendered {
        Ok(bytes) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(bytes = bytes.len(), elapsed_ms, "screenshot generated");
            image_response(bytes, options.format.content_type(), elapsed_ms)
        }
        Err(err) => {
            error!(error = %err, "screenshot generation failed");
            error_response(&err, state.config.dev_mode)
        }
    }
}

fn image_response(bytes: Vec<u8>, content_type: &'static str, elapsed_ms: u64) -> Response {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .header("x-generation-time", format!("{}ms", elapsed_ms));

    match builder.body(Body::from(bytes)) {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to build image response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(err: &Error, dev_mode: bool) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = ErrorBody {
        message: public_message(err),
        error: dev_mode.then(|| err.to_string()),
    };
    (status, Json(body)).into_response()
}

/// Caller-facing message for an error. Raw detail stays out of these and is
/// only exposed through the dev-mode `error` field.
fn public_message(err: &Error) -> String {
    match err {
        Error::EmptyMarkup => "HTML/CSS code is required".into(),
        Error::InvalidOptions(detail) => format!("Invalid options: {}", detail),
        Error::Timeout(_) => "Generation timed out. Try simpler HTML/CSS.".into(),
        Error::InvalidContent(_) => "Invalid HTML content. Check your code syntax.".into(),
        Error::Launch(_) | Error::Capture(_) | Error::Other(_) => {
            "Screenshot generation failed".into()
        }
    }
}
