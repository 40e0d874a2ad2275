//! HTTP API over a [`QueryService`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nlq_rag::{NlqError, QueryResponse, QueryService, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Body of `/query` and `/search`.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub num_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub question: String,
    pub results: Vec<SearchResult>,
}

/// Failures rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(NlqError),
}

impl From<NlqError> for ApiError {
    fn from(e: NlqError) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

/// The trimmed question, or 400.
fn required_question(
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<(String, Option<usize>), ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    match request.question.as_deref().map(str::trim) {
        Some(question) if !question.is_empty() => Ok((question.to_string(), request.num_results)),
        _ => Err(ApiError::BadRequest("Question is required".into())),
    }
}

pub fn app_router(service: Arc<QueryService>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/search", post(search))
        .with_state(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve `service` on `host:port` until Ctrl-C.
pub async fn run_server(service: Arc<QueryService>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("nlq listening on http://{}", addr);

    axum::serve(listener, app_router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn health(State(service): State<Arc<QueryService>>) -> impl IntoResponse {
    Json(json!({"status": "ok", "records": service.engine().len().await}))
}

async fn query(
    State(service): State<Arc<QueryService>>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let (question, num_results) = required_question(body)?;
    Ok(Json(service.query(&question, num_results).await?))
}

async fn search(
    State(service): State<Arc<QueryService>>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let (question, num_results) = required_question(body)?;
    let results = service.search(&question, num_results).await?;
    Ok(Json(SearchResponse { question, results }))
}
