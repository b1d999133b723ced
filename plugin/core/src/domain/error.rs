// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::engine::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by command execution, container lifecycle and pool operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not execute command. The status code was {exit_code}. The output was: {output}")]
    CommandFailed { exit_code: i64, output: String },

    #[error("Failed to copy staging area into container: {0}")]
    TransferFailed(String),

    #[error("Failed to prepare staging area: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl From<EngineError> for AgentError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Unavailable(msg) => Self::EngineUnavailable(msg),
            EngineError::NotFound(msg) => Self::NotFound(msg),
            EngineError::Request(msg) => Self::Engine(msg),
        }
    }
}
