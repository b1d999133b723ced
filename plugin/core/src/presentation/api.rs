// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::application::executors::dispatch;
use crate::application::pool::AgentPool;
use crate::domain::container::ContainerId;
use crate::domain::error::AgentError;

pub struct AppState {
    pub pool: Arc<AgentPool>,
    pub start_time: Instant,
}

pub fn app(pool: Arc<AgentPool>) -> Router {
    let state = Arc::new(AppState {
        pool,
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/agents", get(list_agents_handler))
        .route("/agents/{container_id}/health", get(agent_health_handler))
        .route("/go/plugin/{request_name}", post(plugin_request_handler))
        .with_state(state)
}

async fn plugin_request_handler(
    State(state): State<Arc<AppState>>,
    Path(request_name): Path<String>,
    body: String,
) -> impl IntoResponse {
    let response = dispatch(&request_name, &body, state.pool.clone()).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], response.body)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let pool_size = state.pool.registry().len();

    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "uptime_seconds": uptime_seconds,
                "pool_size": pool_size,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": e.to_string(),
                "uptime_seconds": uptime_seconds,
                "pool_size": pool_size,
            })),
        ),
    }
}

async fn list_agents_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut agents = state.pool.registry().snapshot();
    agents.sort_by(|a, b| a.id().cmp(&b.id()));
    Json(json!({ "agents": agents }))
}

async fn agent_health_handler(
    State(state): State<Arc<AppState>>,
    Path(container_id): Path<String>,
) -> impl IntoResponse {
    let id = ContainerId::new(container_id);
    match state.pool.health(&id).await {
        Ok(health) => (StatusCode::OK, Json(json!(health))),
        Err(AgentError::NotFound(msg)) => (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
