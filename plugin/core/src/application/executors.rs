// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request Executors
//!
//! Adapters between the CI server's plugin requests and the [`AgentPool`].
//! This is the only layer that turns errors into responses.

use crate::application::pool::AgentPool;
use crate::domain::requests::{
    CreateAgentRequest, PluginResponse, ShouldAssignWorkRequest, REQUEST_CREATE_AGENT,
    REQUEST_SERVER_PING, REQUEST_SHOULD_ASSIGN_WORK,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self) -> PluginResponse;
}

pub struct ShouldAssignWorkExecutor {
    pool: Arc<AgentPool>,
    request: ShouldAssignWorkRequest,
}

impl ShouldAssignWorkExecutor {
    pub fn new(pool: Arc<AgentPool>, request: ShouldAssignWorkRequest) -> Self {
        Self { pool, request }
    }
}

#[async_trait]
impl RequestExecutor for ShouldAssignWorkExecutor {
    async fn execute(&self) -> PluginResponse {
        PluginResponse::success(self.pool.should_assign_work(&self.request).to_string())
    }
}

pub struct CreateAgentExecutor {
    pool: Arc<AgentPool>,
    request: CreateAgentRequest,
}

impl CreateAgentExecutor {
    pub fn new(pool: Arc<AgentPool>, request: CreateAgentRequest) -> Self {
        Self { pool, request }
    }
}

#[async_trait]
impl RequestExecutor for CreateAgentExecutor {
    async fn execute(&self) -> PluginResponse {
        match self.pool.create_agent(&self.request).await {
            Ok(_) => PluginResponse::success(""),
            Err(e) => PluginResponse::error(e.to_string()),
        }
    }
}

/// Runs one reconciliation pass each time the server pings the plugin.
pub struct ServerPingExecutor {
    pool: Arc<AgentPool>,
}

impl ServerPingExecutor {
    pub fn new(pool: Arc<AgentPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestExecutor for ServerPingExecutor {
    async fn execute(&self) -> PluginResponse {
        match self.pool.reconcile().await {
            Ok(report) => {
                debug!(?report, "Server ping reconciliation completed");
                PluginResponse::success("")
            }
            Err(e) => PluginResponse::error(e.to_string()),
        }
    }
}

/// Decode `body` for the request named `request_name` and build its executor.
pub fn executor_for(
    request_name: &str,
    body: &str,
    pool: Arc<AgentPool>,
) -> Result<Box<dyn RequestExecutor>, PluginResponse> {
    match request_name {
        REQUEST_SHOULD_ASSIGN_WORK => {
            let request = ShouldAssignWorkRequest::from_json(non_empty(body))
                .map_err(|e| PluginResponse::bad_request(format!("Malformed should-assign-work request: {}", e)))?;
            Ok(Box::new(ShouldAssignWorkExecutor::new(pool, request)))
        }
        REQUEST_CREATE_AGENT => {
            let request = CreateAgentRequest::from_json(non_empty(body))
                .map_err(|e| PluginResponse::bad_request(format!("Malformed create-agent request: {}", e)))?;
            Ok(Box::new(CreateAgentExecutor::new(pool, request)))
        }
        REQUEST_SERVER_PING => Ok(Box::new(ServerPingExecutor::new(pool))),
        other => {
            warn!(request = other, "Unhandled request type");
            Err(PluginResponse::bad_request(format!("Unhandled request type: {}", other)))
        }
    }
}

pub async fn dispatch(request_name: &str, body: &str, pool: Arc<AgentPool>) -> PluginResponse {
    match executor_for(request_name, body, pool) {
        Ok(executor) => executor.execute().await,
        Err(response) => response,
    }
}

fn non_empty(body: &str) -> &str {
    if body.trim().is_empty() {
        "{}"
    } else {
        body
    }
}
