//! Read-only HTTP query API over the ticket store.
//!
//! Serves exactly what the pipeline persisted; the bind/serve call lives in
//! the binary.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::error::StorageError;
use crate::pipeline::types::{GeneratedReply, SentimentLabel, TicketRecord};
use crate::store::{TicketFilter, TicketStats, TicketStore};

/// Which model capabilities were wired at startup.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CapabilityFlags {
    pub sentiment: bool,
    pub classifier_model: bool,
    pub generator_model: bool,
}

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TicketStore>,
    pub capabilities: CapabilityFlags,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}", get(get_ticket))
        .route("/tickets/{id}/reply", get(get_reply))
        .route("/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    sentiment: Option<String>,
    category: Option<String>,
    search: Option<String>,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    capabilities: CapabilityFlags,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        capabilities: state.capabilities,
    })
}

async fn list_tickets(
    State(state): State<ApiState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<TicketRecord>>, (StatusCode, Json<ErrorBody>)> {
    let sentiment = match q.sentiment.as_deref() {
        None => None,
        Some(s) => Some(
            SentimentLabel::parse(s)
                .ok_or_else(|| bad_request(format!("unknown sentiment: {s}")))?,
        ),
    };
    let filter = TicketFilter {
        sentiment,
        category: q.category,
        search: q.search,
        limit: q.limit,
    };
    state
        .store
        .list(&filter)
        .await
        .map(Json)
        .map_err(storage_error)
}

async fn get_ticket(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TicketRecord>, (StatusCode, Json<ErrorBody>)> {
    match state.store.get(&id).await.map_err(storage_error)? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found(&id)),
    }
}

async fn get_reply(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<GeneratedReply>, (StatusCode, Json<ErrorBody>)> {
    match state.store.get(&id).await.map_err(storage_error)? {
        Some(record) => Ok(Json(record.reply)),
        None => Err(not_found(&id)),
    }
}

async fn get_stats(
    State(state): State<ApiState>,
) -> Result<Json<TicketStats>, (StatusCode, Json<ErrorBody>)> {
    state.store.stats().await.map(Json).map_err(storage_error)
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message }))
}

fn not_found(id: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no ticket for message id {id}"),
        }),
    )
}

fn storage_error(e: StorageError) -> (StatusCode, Json<ErrorBody>) {
    error!(error = %e, "store query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

// ── Tests ───────────────────────────────────────────────────────────
