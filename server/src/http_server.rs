use crate::pipeline::{RagPipeline, Stage, StageError};
use axum::{
    body::StreamBody,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rag_core::{ConversationMessage, RagError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
}

/// Request model for queries: the conversation, oldest message first
#[derive(Deserialize)]
#[serde(untagged)]
pub enum QueryRequest {
    History(Vec<ConversationMessage>),
    Wrapped { messages: Vec<ConversationMessage> },
}

impl QueryRequest {
    pub fn into_history(self) -> Vec<ConversationMessage> {
        match self {
            Self::History(messages) | Self::Wrapped { messages } => messages,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    stage: Stage,
    message: String,
}

/// A request that failed before any answer bytes were sent
#[derive(Debug)]
pub struct ApiError(StageError);

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(StageError::new(
            Stage::Received,
            RagError::InvalidInput(rejection.body_text()),
        ))
    }
}

fn status_for(error: &RagError) -> StatusCode {
    match error {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RagError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RagError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
        RagError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let StageError { stage, error } = self.0;
        let status = status_for(&error);
        if status.is_server_error() {
            error!(%stage, error = %error, "Query failed");
        }

        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: error.code(),
                stage,
                message: error.to_string(),
            },
        });
        (status, body).into_response()
    }
}

/// Build the router with CORS applied
pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    let state = AppState { pipeline };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/query", post(handle_query))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and run until ctrl-c
pub async fn run_server(pipeline: Arc<RagPipeline>, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?
        .serve(router(pipeline).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c; shutting down");
    }
    info!("Shutdown signal received");
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "RAG query service is running"
}

/// Stream the answer to a conversation as plain text.
///
/// A fault after streaming has started aborts the response body.
async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let answer = state.pipeline.answer(request.into_history()).await?;
    let request_id = answer.request_id().to_string();

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (HeaderName::from_static(REQUEST_ID_HEADER), request_id),
        ],
        StreamBody::new(answer),
    )
        .into_response())
}
