// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-container command execution.
//!
//! Detached commands are started and forgotten. Attached commands are
//! started, their output collected, and their state polled at a fixed
//! interval until the engine reports them finished. A non-zero exit code is
//! returned as [`AgentError::CommandFailed`] carrying the captured output.
//! There is no retry here; retrying is up to the caller.

use crate::domain::container::ContainerId;
use crate::domain::engine::{ContainerEngine, ExecId, ExecOutputStream, ExecState};
use crate::domain::error::AgentError;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Return as soon as the command has been started
    Detached,
    /// Wait for completion and check the exit code
    Attached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` for detached commands
    pub exit_code: Option<i64>,
    pub output: String,
}

pub struct CommandExecutor {
    engine: Arc<dyn ContainerEngine>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl CommandExecutor {
    pub fn new(engine: Arc<dyn ContainerEngine>, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            engine,
            poll_interval,
            max_wait,
        }
    }

    pub async fn run(
        &self,
        container_id: &ContainerId,
        command: &[String],
        mode: ExecMode,
    ) -> Result<CommandOutput, AgentError> {
        let exec_id = self.engine.create_exec(container_id, command).await?;
        debug!(
            container_id = %container_id.short(),
            exec_id = %exec_id.as_str(),
            command = ?command,
            "Created exec"
        );

        let detached = mode == ExecMode::Detached;
        let stream = self.engine.start_exec(&exec_id, detached).await?;
        if detached {
            return Ok(CommandOutput {
                exit_code: None,
                output: String::new(),
            });
        }

        let (state, output) = timeout(self.max_wait, self.wait_for_completion(&exec_id, stream))
            .await
            .map_err(|_| {
                warn!(
                    container_id = %container_id.short(),
                    exec_id = %exec_id.as_str(),
                    "Command did not finish within {:?}", self.max_wait
                );
                AgentError::DeadlineExceeded(self.max_wait)
            })??;

        // A finished exec without an exit code is treated as success
        let exit_code = state.exit_code.unwrap_or(0);
        if exit_code != 0 {
            return Err(AgentError::CommandFailed { exit_code, output });
        }

        Ok(CommandOutput {
            exit_code: Some(exit_code),
            output,
        })
    }

    async fn wait_for_completion(
        &self,
        exec_id: &ExecId,
        stream: Option<ExecOutputStream>,
    ) -> Result<(ExecState, String), AgentError> {
        let collect = async {
            let mut output = Vec::new();
            if let Some(mut stream) = stream {
                while let Some(chunk) = stream.next().await {
                    output.extend_from_slice(&chunk?);
                }
            }
            Ok::<_, AgentError>(String::from_utf8_lossy(&output).into_owned())
        };

        let poll = async {
            loop {
                let state = self.engine.inspect_exec(exec_id).await?;
                if !state.running {
                    return Ok::<_, AgentError>(state);
                }
                sleep(self.poll_interval).await;
            }
        };

        let (output, state) = tokio::try_join!(collect, poll)?;
        Ok((state, output))
    }
}
