// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::container::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Parameters for creating an agent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub open_stdin: bool,
    pub cmd: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// Result of inspecting a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub created_at: DateTime<Utc>,
    pub running: bool,
    pub labels: HashMap<String, String>,
}

/// Entry of a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecId(pub String);

impl ExecId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecState {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Output chunks of an attached exec; ends when the command's streams close.
pub type ExecOutputStream = BoxStream<'static, Result<Bytes, EngineError>>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Container engine unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container engine request failed: {0}")]
    Request(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The container-engine operations the plugin consumes.
///
/// Implementations share one engine connection across all callers and must
/// be safe to call concurrently.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Verify the engine is reachable.
    async fn ping(&self) -> Result<(), EngineError>;

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, EngineError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, EngineError>;

    /// List containers, running or not, carrying `label_key=label_value`.
    async fn list_containers(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<ContainerSummary>, EngineError>;

    async fn create_exec(&self, id: &ContainerId, cmd: &[String]) -> Result<ExecId, EngineError>;

    /// Start an exec. Detached starts return `None`; attached starts return
    /// the output stream.
    async fn start_exec(
        &self,
        exec: &ExecId,
        detached: bool,
    ) -> Result<Option<ExecOutputStream>, EngineError>;

    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecState, EngineError>;

    /// Extract a tar archive into `remote_path` inside the container.
    async fn copy_to_container(
        &self,
        id: &ContainerId,
        archive: Bytes,
        remote_path: &str,
    ) -> Result<(), EngineError>;

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError>;

    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError>;
}
