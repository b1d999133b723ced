// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Typed payloads of the CI server's elastic-agent requests.
//!
//! The server sends JSON with snake_case field names. Every field is
//! defaulted so partial payloads decode; blank values are treated as absent
//! when building a [`BootstrapConfig`].

use crate::domain::registration::{parse_resources, BootstrapConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const REQUEST_SHOULD_ASSIGN_WORK: &str = "cd.go.elastic-agent.should-assign-work";
pub const REQUEST_CREATE_AGENT: &str = "cd.go.elastic-agent.create-agent";
pub const REQUEST_SERVER_PING: &str = "cd.go.elastic-agent.server-ping";

const PROPERTY_RESOURCES: &str = "resources";
const PROPERTY_ENVIRONMENT: &str = "environment";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateAgentRequest {
    pub auto_register_key: Option<String>,
    pub properties: HashMap<String, String>,
    pub environment: Option<String>,
}

impl CreateAgentRequest {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn resources(&self) -> Vec<String> {
        self.properties
            .get(PROPERTY_RESOURCES)
            .map(|raw| parse_resources(raw))
            .unwrap_or_default()
    }

    /// Top-level environment, falling back to the `environment` property.
    pub fn effective_environment(&self) -> Option<String> {
        [self.environment.as_ref(), self.properties.get(PROPERTY_ENVIRONMENT)]
            .into_iter()
            .flatten()
            .map(|e| e.trim())
            .find(|e| !e.is_empty())
            .map(str::to_string)
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig::new(
            self.auto_register_key.clone(),
            self.resources(),
            self.effective_environment(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobIdentifier {
    pub pipeline_name: Option<String>,
    pub pipeline_counter: Option<u64>,
    pub pipeline_label: Option<String>,
    pub stage_name: Option<String>,
    pub stage_counter: Option<String>,
    pub job_name: Option<String>,
    pub job_id: Option<u64>,
}

/// The agent the server is considering for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentMetadata {
    pub agent_id: Option<String>,
    pub agent_state: Option<String>,
    pub build_state: Option<String>,
    pub config_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShouldAssignWorkRequest {
    pub agent: AgentMetadata,
    pub environment: Option<String>,
    pub properties: HashMap<String, String>,
    pub job_identifier: JobIdentifier,
}

impl ShouldAssignWorkRequest {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn resources(&self) -> Vec<String> {
        self.properties
            .get(PROPERTY_RESOURCES)
            .map(|raw| parse_resources(raw))
            .unwrap_or_default()
    }
}

/// Response handed back to the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginResponse {
    pub status: u16,
    pub body: String,
}

impl PluginResponse {
    pub const SUCCESS: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const INTERNAL_ERROR: u16 = 500;

    pub fn success(body: impl Into<String>) -> Self {
        Self {
            status: Self::SUCCESS,
            body: body.into(),
        }
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        Self::with_message(Self::BAD_REQUEST, message.as_ref())
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Self::with_message(Self::INTERNAL_ERROR, message.as_ref())
    }

    fn with_message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}
