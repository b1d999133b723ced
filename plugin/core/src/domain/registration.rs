// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent auto-registration.
//!
//! A new agent container is handed an `autoregister.properties` file so the
//! agent process can register itself with the CI server without manual
//! approval. The file carries the auto-register secret, the resources and
//! environment the agent advertises, and the elastic-agent identity (the
//! container id plus the id of the plugin that owns it).

use crate::domain::container::ContainerId;
use chrono::{DateTime, Utc};

/// Identifier of this plugin, reported by every agent it creates.
pub const PLUGIN_ID: &str = "cd.go.contrib.elastic-agent.docker";

/// Label attached to every container this plugin creates.
pub const CREATED_BY_LABEL_KEY: &str = "Elastic-Agent-Created-By";

/// Name of the descriptor file under the agent's `config/` directory.
pub const DESCRIPTOR_FILE_NAME: &str = "autoregister.properties";

pub const KEY_AUTO_REGISTER_KEY: &str = "agent.auto.register.key";
pub const KEY_RESOURCES: &str = "agent.auto.register.resources";
pub const KEY_ENVIRONMENTS: &str = "agent.auto.register.environments";
pub const KEY_AGENT_ID: &str = "agent.auto.register.elasticAgent.agentId";
pub const KEY_PLUGIN_ID: &str = "agent.auto.register.elasticAgent.pluginId";

/// Per-creation parameters. Lives only as long as the creation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub auto_register_key: Option<String>,
    pub resources: Vec<String>,
    pub environment: Option<String>,
}

impl BootstrapConfig {
    pub fn new(
        auto_register_key: Option<String>,
        resources: Vec<String>,
        environment: Option<String>,
    ) -> Self {
        Self {
            auto_register_key,
            resources,
            environment,
        }
    }
}

/// Split a comma-separated resource list, dropping blank items.
pub fn parse_resources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// The registration descriptor written into a new container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDescriptor {
    entries: Vec<(&'static str, String)>,
    generated_at: DateTime<Utc>,
}

impl RegistrationDescriptor {
    pub fn new(container_id: &ContainerId, bootstrap: &BootstrapConfig) -> Self {
        let mut entries = Vec::with_capacity(5);

        if let Some(key) = non_blank(bootstrap.auto_register_key.as_deref()) {
            entries.push((KEY_AUTO_REGISTER_KEY, key.to_string()));
        }

        entries.push((KEY_RESOURCES, bootstrap.resources.join(", ")));

        if let Some(environment) = non_blank(bootstrap.environment.as_deref()) {
            entries.push((KEY_ENVIRONMENTS, environment.to_string()));
        }

        entries.push((KEY_AGENT_ID, container_id.as_str().to_string()));
        entries.push((KEY_PLUGIN_ID, PLUGIN_ID.to_string()));

        Self {
            entries,
            generated_at: Utc::now(),
        }
    }

    pub fn entries(&self) -> &[(&'static str, String)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render in Java properties syntax, readable by the agent's loader.
    pub fn render(&self) -> String {
        let mut out = format!("#{}\n", self.generated_at.to_rfc2822());
        for (key, value) in &self.entries {
            out.push_str(&escape(key, true));
            out.push('=');
            out.push_str(&escape(value, false));
            out.push('\n');
        }
        out
    }
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
