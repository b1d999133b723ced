// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::container::ContainerId;
use crate::domain::engine::{
    ContainerDetails, ContainerEngine, ContainerSpec, ContainerSummary, EngineError, ExecId,
    ExecOutputStream, ExecState,
};
use crate::domain::plugin_config::DockerConfig;
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptionsBuilder,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
    UploadToContainerOptionsBuilder,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// [`ContainerEngine`] backed by a Docker daemon.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn connect(config: &DockerConfig) -> Result<Self, EngineError> {
        let docker = if let Some(path) = &config.socket_path {
            Docker::connect_with_socket(path, config.timeout.as_secs(), API_DEFAULT_VERSION)
                .map_err(|e| EngineError::Unavailable(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                )))?
        } else {
            Docker::connect_with_local_defaults()
                .map_err(|e| EngineError::Unavailable(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\
                     - Current user not in 'docker' group",
                    e
                )))?
                .with_timeout(config.timeout)
        };

        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn classify(operation: &str, target: &str, error: BollardError) -> EngineError {
    let message = format!("{} {}: {}", operation, target, error);
    match &error {
        BollardError::DockerResponseServerError { status_code: 404, .. } => EngineError::NotFound(message),
        BollardError::DockerResponseServerError { .. } => EngineError::Request(message),
        BollardError::IOError { .. }
        | BollardError::RequestTimeoutError
        | BollardError::SocketNotFoundError(_) => EngineError::Unavailable(message),
        other => {
            let text = other.to_string();
            if text.contains("connect") || text.contains("Connection refused") {
                EngineError::Unavailable(message)
            } else {
                EngineError::Request(message)
            }
        }
    }
}

fn parse_created(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| classify("ping", "daemon", e))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, EngineError> {
        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            open_stdin: Some(spec.open_stdin),
            cmd: Some(spec.cmd.clone()),
            labels: Some(spec.labels.clone()),
            ..ContainerCreateBody::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(|e| classify("create_container", &spec.image, e))?;

        for warning in &response.warnings {
            debug!(container_id = %response.id, "Docker warning: {}", warning);
        }
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| classify("start_container", id.as_str(), e))
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, EngineError> {
        let inspect = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| classify("inspect_container", id.as_str(), e))?;

        let created_at = parse_created(inspect.created.as_deref()).ok_or_else(|| {
            EngineError::Request(format!("inspect_container {}: missing or invalid creation time", id))
        })?;
        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let labels = inspect
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default();

        Ok(ContainerDetails {
            id: inspect.id.map(ContainerId::new).unwrap_or_else(|| id.clone()),
            created_at,
            running,
            labels,
        })
    }

    async fn list_containers(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let filters = HashMap::from([(
            "label".to_string(),
            vec![format!("{}={}", label_key, label_value)],
        )]);
        let options = ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&filters)
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| classify("list_containers", label_key, e))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(ContainerSummary {
                    id: ContainerId::new(id),
                    created_at: c.created.and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                })
            })
            .collect())
    }

    async fn create_exec(&self, id: &ContainerId, cmd: &[String]) -> Result<ExecId, EngineError> {
        let config = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd.to_vec()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(id.as_str(), config)
            .await
            .map_err(|e| classify("create_exec", id.as_str(), e))?;
        Ok(ExecId(exec.id))
    }

    async fn start_exec(
        &self,
        exec: &ExecId,
        detached: bool,
    ) -> Result<Option<ExecOutputStream>, EngineError> {
        let options = StartExecOptions {
            detach: detached,
            ..Default::default()
        };

        let started = self
            .docker
            .start_exec(exec.as_str(), Some(options))
            .await
            .map_err(|e| classify("start_exec", exec.as_str(), e))?;

        match started {
            StartExecResults::Attached { output, .. } => {
                let exec_id = exec.as_str().to_string();
                let stream = output
                    .map(move |chunk| {
                        chunk
                            .map(LogOutput::into_bytes)
                            .map_err(|e| classify("exec_output", &exec_id, e))
                    })
                    .boxed();
                Ok(Some(stream))
            }
            StartExecResults::Detached => Ok(None),
        }
    }

    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecState, EngineError> {
        let inspect = self
            .docker
            .inspect_exec(exec.as_str())
            .await
            .map_err(|e| classify("inspect_exec", exec.as_str(), e))?;

        Ok(ExecState {
            running: inspect.running.unwrap_or(false),
            exit_code: inspect.exit_code,
        })
    }

    async fn copy_to_container(
        &self,
        id: &ContainerId,
        archive: Bytes,
        remote_path: &str,
    ) -> Result<(), EngineError> {
        let options = UploadToContainerOptionsBuilder::new()
            .path(remote_path)
            .build();

        self.docker
            .upload_to_container(id.as_str(), Some(options), bollard::body_full(archive))
            .await
            .map_err(|e| classify("upload_to_container", id.as_str(), e))
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptionsBuilder::new()
            .t(i32::try_from(grace.as_secs()).unwrap_or(i32::MAX))
            .build();

        match self.docker.stop_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(BollardError::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
            Err(e) => Err(classify("stop_container", id.as_str(), e)),
        }
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        let options = RemoveContainerOptionsBuilder::new()
            .force(true)
            .v(true)
            .build();

        self.docker
            .remove_container(id.as_str(), Some(options))
            .await
            .map_err(|e| classify("remove_container", id.as_str(), e))
    }
}
