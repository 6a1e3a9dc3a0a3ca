use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::auth;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::indexer::{IndexSummary, Indexer, RemoveSummary};
use crate::search::{SearchEngine, SearchOptions};

/// Shared state for the axum server.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub indexer: Arc<Indexer>,
    pub engine: Arc<SearchEngine>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/index", post(index_handler))
        .route("/index/{document_id}", delete(remove_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    query: Option<String>,
    content_type: Option<String>,
    limit: Option<usize>,
    threshold: Option<f64>,
}

async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner_id = authorize(&state, &headers)?;

    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::Validation("query param is required".into()))?;

    let results = state
        .engine
        .query_search(
            &query,
            SearchOptions {
                owner_id,
                content_type: params.content_type,
                limit: params.limit,
                threshold: params.threshold,
            },
        )
        .await?;

    Ok(Json(serde_json::json!({
        "data": results,
        "meta": { "count": results.len() },
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRequest {
    content_type: String,
    document_id: String,
    field: Option<String>,
    fields: Option<Vec<String>>,
    title_field: Option<String>,
}

async fn index_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IndexRequest>,
) -> Result<Json<IndexSummary>, AppError> {
    let owner_id = authorize(&state, &headers)?;
    let title_field = body.title_field.as_deref();

    let summary = match (&body.field, &body.fields) {
        (Some(field), None) => {
            state
                .indexer
                .index_document(&body.content_type, &body.document_id, field, title_field, owner_id)
                .await?
        }
        (None, Some(fields)) if !fields.is_empty() => {
            state
                .indexer
                .index_document_fields(
                    &body.content_type,
                    &body.document_id,
                    fields,
                    title_field,
                    owner_id,
                )
                .await?
        }
        _ => {
            return Err(AppError::Validation(
                "provide exactly one of \"field\" or \"fields\"".into(),
            ));
        }
    };

    Ok(Json(summary))
}

async fn remove_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<Json<RemoveSummary>, AppError> {
    authorize(&state, &headers)?;
    let summary = state.indexer.remove_document(&document_id).await?;
    Ok(Json(summary))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> AppResult<i64> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    auth::authenticate(&state.db, authorization)
}

/// Start the HTTP server on the given port. Returns a shutdown sender.
pub async fn start_server(state: AppState, port: u16) -> Result<oneshot::Sender<()>, String> {
    let router = build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind server on port {port}: {e}"))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    eprintln!("[server] listening on http://{addr}");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                eprintln!("[server] shutting down");
            })
            .await
            .unwrap_or_else(|e| eprintln!("[server] error: {e}"));
    });

    Ok(shutdown_tx)
}
