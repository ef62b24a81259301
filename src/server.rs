//! HTTP turn server.
//!
//! The channel integration posts one request per user turn and relays the
//! reply. The server starts listening immediately and builds the vector
//! index alongside; turns that need retrieval before the build finishes get
//! the fixed "not ready" reply, and a failed build stops the process.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/turn` | Apply one conversation turn, returns `{reply, context}` |
//! | `GET`  | `/health` | Status, index readiness, chunk count, version |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unknown intent 'Order Pizza'" } }
//! ```
//!
//! Error code: `bad_request` (400) for malformed bodies, unknown intents, and
//! empty session ids. Collaborator failures never surface here; they become
//! fixed replies inside a `200`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based chat
//! widgets can call the API directly.

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use deskhand_core::index::IndexSlot;

use crate::bootstrap::{assemble_engine, build_into, Collaborators};
use crate::config::Config;
use crate::conversation::{ConversationEngine, TurnError, TurnReply, TurnRequest};

#[derive(Clone)]
struct AppState {
    engine: Arc<ConversationEngine>,
    index: Arc<IndexSlot>,
}

/// Build collaborators from configuration, then serve on `[server].bind`.
pub async fn run_server(config: &Config) -> Result<()> {
    let collaborators = Collaborators::from_config(config).await?;
    run_server_with_collaborators(config, collaborators).await
}

/// Serve on `[server].bind` with caller-supplied collaborators.
pub async fn run_server_with_collaborators(
    config: &Config,
    collaborators: Collaborators,
) -> Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, config, collaborators).await
}

/// Serve on an already-bound listener while the index builds.
///
/// Returns only on a server error or a failed index build.
pub async fn serve(
    listener: TcpListener,
    config: &Config,
    collaborators: Collaborators,
) -> Result<()> {
    let (engine, slot) = assemble_engine(config, &collaborators);
    let app = router(engine, slot.clone());

    tracing::info!(addr = %listener.local_addr()?, "deskhand listening");

    let server = async {
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    };
    let build = async {
        build_into(config, collaborators.embedder.as_ref(), &slot)
            .await
            .inspect_err(|e| tracing::error!(error = %format!("{:#}", e), "index build failed"))
    };

    tokio::try_join!(server, build)?;
    Ok(())
}

/// Routes with CORS and request tracing.
pub fn router(engine: Arc<ConversationEngine>, index: Arc<IndexSlot>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/turn", post(handle_turn))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { engine, index })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::UnknownIntent(_) | TurnError::MissingSession => bad_request(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    /// Whether the vector index has been installed.
    ready: bool,
    chunks: usize,
    version: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let chunks = state.index.get().map(|index| index.len()).unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        ready: state.index.is_ready(),
        chunks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /turn ============

async fn handle_turn(
    State(state): State<AppState>,
    body: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnReply>, AppError> {
    let Json(request) = body?;
    let reply = state.engine.handle_turn(request).await?;
    Ok(Json(reply))
}
