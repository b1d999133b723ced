// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container Lifecycle Controller
//!
//! Turns a bare container into a registered build agent and tears it down
//! again:
//!
//! ```text
//! UNCREATED ─create─> CREATED ─start─> RUNNING ─bootstrap─> READY
//!                                                             │
//!                         GONE <──────stop + remove────── TERMINATING
//! ```
//!
//! A failure after the container was created leaves it on the engine. It
//! carries the ownership label but never reaches the registry, so the pool's
//! reconciliation pass reaps it as an orphan.

use crate::application::command_exec::{CommandExecutor, ExecMode};
use crate::domain::container::{AgentContainer, ContainerId};
use crate::domain::engine::{ContainerEngine, ContainerSpec, EngineError};
use crate::domain::error::AgentError;
use crate::domain::plugin_config::{AgentImageConfig, PoolConfig};
use crate::domain::registration::{BootstrapConfig, RegistrationDescriptor, CREATED_BY_LABEL_KEY, PLUGIN_ID};
use crate::infrastructure::staging::{StagingArea, AGENT_ARTIFACT_NAME, CONFIG_DIR_NAME};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings applied to every container the controller creates.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub image: String,
    pub working_dir: String,
    pub artifact_path: PathBuf,
    pub server_url: String,
    pub staging_root: PathBuf,
    pub health_probe: Vec<String>,
    pub stop_grace: Duration,
    pub exec_poll_interval: Duration,
    pub exec_max_wait: Duration,
}

impl LifecycleSettings {
    pub fn from_config(agent: &AgentImageConfig, pool: &PoolConfig) -> Self {
        Self {
            image: agent.image.clone(),
            working_dir: agent.working_dir.clone(),
            artifact_path: agent.artifact_path.clone(),
            server_url: agent.server_url.clone(),
            staging_root: agent.staging_root(),
            health_probe: agent.health_probe.clone(),
            stop_grace: pool.stop_grace,
            exec_poll_interval: pool.exec_poll_interval,
            exec_max_wait: pool.exec_max_wait,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentHealth {
    Healthy,
    Unhealthy { exit_code: i64, output: String },
    Stopped,
}

pub struct ContainerLifecycle {
    engine: Arc<dyn ContainerEngine>,
    exec: CommandExecutor,
    settings: LifecycleSettings,
}

impl ContainerLifecycle {
    pub fn new(engine: Arc<dyn ContainerEngine>, settings: LifecycleSettings) -> Self {
        let exec = CommandExecutor::new(
            engine.clone(),
            settings.exec_poll_interval,
            settings.exec_max_wait,
        );
        Self {
            engine,
            exec,
            settings,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Create a container, copy the registration descriptor and agent
    /// artifact into it, and launch the agent process.
    ///
    /// Readiness of the agent is not verified; see [`Self::health_check`].
    pub async fn create_and_bootstrap(
        &self,
        bootstrap: &BootstrapConfig,
    ) -> Result<AgentContainer, AgentError> {
        let spec = ContainerSpec {
            image: self.settings.image.clone(),
            open_stdin: true,
            cmd: vec!["bash".to_string()],
            labels: HashMap::from([(CREATED_BY_LABEL_KEY.to_string(), PLUGIN_ID.to_string())]),
        };
        let id = self.engine.create_container(&spec).await?;
        debug!(container_id = %id.short(), image = %spec.image, "Created container");

        self.engine.start_container(&id).await?;
        debug!(container_id = %id.short(), "Started container");

        let config_dir = format!("{}/{}", self.settings.working_dir, CONFIG_DIR_NAME);
        self.exec
            .run(&id, &command(["mkdir", "-p", config_dir.as_str()]), ExecMode::Attached)
            .await?;

        self.transfer_staging_area(&id, bootstrap).await?;

        debug!(container_id = %id.short(), "Starting agent process");
        self.exec
            .run(&id, &self.launch_command(), ExecMode::Detached)
            .await?;

        info!(container_id = %id.short(), "Agent container bootstrapped");
        Ok(AgentContainer::bound(id))
    }

    async fn transfer_staging_area(
        &self,
        id: &ContainerId,
        bootstrap: &BootstrapConfig,
    ) -> Result<(), AgentError> {
        let descriptor = RegistrationDescriptor::new(id, bootstrap);
        let staging = StagingArea::assemble(
            &self.settings.staging_root,
            &descriptor,
            &self.settings.artifact_path,
        )?;
        let archive = staging.archive()?;

        debug!(container_id = %id.short(), "Copying files to container");
        let copied = self
            .engine
            .copy_to_container(id, archive, &self.settings.working_dir)
            .await;

        // Staging is removed whether or not the copy succeeded
        if let Err(e) = staging.close() {
            warn!(container_id = %id.short(), "Staging area cleanup failed: {}", e);
        }

        copied.map_err(|e| match e {
            EngineError::Unavailable(msg) => AgentError::EngineUnavailable(msg),
            other => AgentError::TransferFailed(other.to_string()),
        })?;
        debug!(container_id = %id.short(), "Done copying files to container");
        Ok(())
    }

    fn launch_command(&self) -> Vec<String> {
        // Double background + disown detaches the agent from the exec's shell
        let script = format!(
            "cd {} && ((java -jar {} {} > agent.stdout.log 2>&1 & disown)& disown)",
            self.settings.working_dir, AGENT_ARTIFACT_NAME, self.settings.server_url
        );
        command(["bash", "-c", script.as_str()])
    }

    /// Stop and remove a container. A container the engine no longer knows
    /// is treated as already terminated.
    pub async fn terminate(&self, container: &AgentContainer) -> Result<(), AgentError> {
        let Some(id) = container.id() else {
            debug!("Terminate called on a container that was never created");
            return Ok(());
        };

        debug!(container_id = %id.short(), "Terminating container");
        let result = async {
            self.engine.stop_container(id, self.settings.stop_grace).await?;
            self.engine.remove_container(id).await
        }
        .await;

        match result {
            Ok(()) => {
                info!(container_id = %id.short(), "Terminated container");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(container_id = %id.short(), "Cannot terminate a container that does not exist");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reconstruct a fully known handle for an existing container.
    pub async fn find(&self, id: &ContainerId) -> Result<AgentContainer, AgentError> {
        let details = self.engine.inspect_container(id).await?;
        Ok(AgentContainer::with_created_at(details.id, details.created_at))
    }

    /// Creation time of `container`, inspecting the engine only when it is
    /// not already cached on the handle.
    pub async fn resolve_created_at(
        &self,
        container: &mut AgentContainer,
    ) -> Result<DateTime<Utc>, AgentError> {
        if let Some(created_at) = container.created_at() {
            return Ok(created_at);
        }
        let id = container
            .id()
            .ok_or_else(|| AgentError::NotFound("container has not been created".to_string()))?;
        let created_at = self.engine.inspect_container(id).await?.created_at;
        container.cache_created_at(created_at);
        Ok(created_at)
    }

    /// Check that the container runs and the agent process answers the
    /// configured health command. Containers without this plugin's ownership
    /// label are reported as not found and nothing is run in them.
    pub async fn health_check(&self, id: &ContainerId) -> Result<AgentHealth, AgentError> {
        let details = self.engine.inspect_container(id).await?;
        if details.labels.get(CREATED_BY_LABEL_KEY).map(String::as_str) != Some(PLUGIN_ID) {
            debug!(container_id = %id.short(), "Refusing health check on a container this plugin does not own");
            return Err(AgentError::NotFound(format!("no agent container {}", id)));
        }
        if !details.running {
            return Ok(AgentHealth::Stopped);
        }

        match self
            .exec
            .run(id, &self.settings.health_probe, ExecMode::Attached)
            .await
        {
            Ok(_) => Ok(AgentHealth::Healthy),
            Err(AgentError::CommandFailed { exit_code, output }) => {
                Ok(AgentHealth::Unhealthy { exit_code, output })
            }
            Err(e) => Err(e),
        }
    }
}

fn command<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}
