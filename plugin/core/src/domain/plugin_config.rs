// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Plugin Configuration Types
//
// Defines the configuration schema for the elastic agent plugin host:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Docker endpoint
// - Agent image and bootstrap settings
// - Pool timing (exec polling, creation deadline, reaping thresholds)
// - HTTP listener and observability settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "elastic-agents/v1";
pub const KIND: &str = "PluginConfig";

/// Top-level Kubernetes-style plugin configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfigManifest {
    /// API version (must be "elastic-agents/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PluginConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: PluginConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable name of this plugin host
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfigSpec {
    #[serde(default)]
    pub docker: DockerConfig,

    #[serde(default)]
    pub agent: AgentImageConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Path to Docker socket. Auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,

    /// Client request timeout
    #[serde(with = "humantime_serde", default = "default_docker_timeout")]
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: default_docker_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentImageConfig {
    /// Base image every agent container is created from
    #[serde(default = "default_image")]
    pub image: String,

    /// Directory inside the container receiving the staging area
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Local path of the agent runtime artifact copied into each container
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// CI server URL the agent process connects to
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Parent directory for staging areas. System temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_root: Option<PathBuf>,

    /// Command run inside a container by the health check
    #[serde(default = "default_health_probe")]
    pub health_probe: Vec<String>,
}

impl Default for AgentImageConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            working_dir: default_working_dir(),
            artifact_path: default_artifact_path(),
            server_url: default_server_url(),
            staging_root: None,
            health_probe: default_health_probe(),
        }
    }
}

impl AgentImageConfig {
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Grace period between stop signal and kill
    #[serde(with = "humantime_serde", default = "default_stop_grace")]
    pub stop_grace: Duration,

    /// Interval between exec state polls
    #[serde(with = "humantime_serde", default = "default_exec_poll_interval")]
    pub exec_poll_interval: Duration,

    /// Maximum wait for a synchronous in-container command
    #[serde(with = "humantime_serde", default = "default_exec_max_wait")]
    pub exec_max_wait: Duration,

    /// Overall deadline for one create-and-bootstrap attempt
    #[serde(with = "humantime_serde", default = "default_create_deadline")]
    pub create_deadline: Duration,

    /// Registered agents older than this are reaped
    #[serde(with = "humantime_serde", default = "default_max_agent_age")]
    pub max_agent_age: Duration,

    /// Labeled containers missing from the registry are reaped after this
    #[serde(with = "humantime_serde", default = "default_orphan_grace")]
    pub orphan_grace: Duration,

    #[serde(with = "humantime_serde", default = "default_reconcile_interval")]
    pub reconcile_interval: Duration,

    #[serde(default = "default_true")]
    pub reaper_enabled: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            stop_grace: default_stop_grace(),
            exec_poll_interval: default_exec_poll_interval(),
            exec_max_wait: default_exec_max_wait(),
            create_deadline: default_create_deadline(),
            max_agent_age: default_max_agent_age(),
            orphan_grace: default_orphan_grace(),
            reconcile_interval: default_reconcile_interval(),
            reaper_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Prometheus exporter port, disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_docker_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_image() -> String {
    "gocd/ubuntu-docker-elastic-agent".to_string()
}

fn default_working_dir() -> String {
    "/go-agent".to_string()
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("agent.jar")
}

fn default_server_url() -> String {
    "https://localhost:8154/go".to_string()
}

fn default_health_probe() -> Vec<String> {
    vec!["pgrep".to_string(), "-f".to_string(), "agent.jar".to_string()]
}

fn default_stop_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_exec_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_exec_max_wait() -> Duration {
    Duration::from_secs(300)
}

fn default_create_deadline() -> Duration {
    Duration::from_secs(600)
}

fn default_max_agent_age() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_orphan_grace() -> Duration {
    Duration::from_secs(600)
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8900
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for PluginConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "elastic-agents".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: None,
            },
            spec: PluginConfigSpec::default(),
        }
    }
}

impl PluginConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. ELASTIC_AGENTS_CONFIG_PATH environment variable
    /// 2. ./elastic-agents.yaml (working directory)
    /// 3. ~/.elastic-agents/config.yaml (user home)
    /// 4. /etc/elastic-agents/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ELASTIC_AGENTS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./elastic-agents.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".elastic-agents").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/elastic-agents/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must load
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ELASTIC_AGENTS_DOCKER_SOCKET") {
            tracing::info!("Environment override: ELASTIC_AGENTS_DOCKER_SOCKET={}", val);
            self.spec.docker.socket_path = Some(val);
        }

        if let Some(val) = lookup("ELASTIC_AGENTS_AGENT_IMAGE") {
            tracing::info!("Environment override: ELASTIC_AGENTS_AGENT_IMAGE={}", val);
            self.spec.agent.image = val;
        }

        if let Some(val) = lookup("ELASTIC_AGENTS_SERVER_URL") {
            tracing::info!("Environment override: ELASTIC_AGENTS_SERVER_URL={}", val);
            self.spec.agent.server_url = val;
        }

        if let Some(val) = lookup("ELASTIC_AGENTS_REAPER_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.spec.pool.reaper_enabled = true,
                "false" | "0" | "no" | "off" => self.spec.pool.reaper_enabled = false,
                _ => {
                    tracing::warn!(
                        "Invalid value for ELASTIC_AGENTS_REAPER_ENABLED: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let agent = &self.spec.agent;
        if agent.image.trim().is_empty() {
            anyhow::bail!("spec.agent.image cannot be empty");
        }
        if !agent.working_dir.starts_with('/') {
            anyhow::bail!(
                "spec.agent.working_dir must be an absolute path, got '{}'",
                agent.working_dir
            );
        }
        if agent.server_url.trim().is_empty() {
            anyhow::bail!("spec.agent.server_url cannot be empty");
        }
        if agent.health_probe.is_empty() {
            anyhow::bail!("spec.agent.health_probe cannot be empty");
        }

        let pool = &self.spec.pool;
        if pool.exec_poll_interval.is_zero() {
            anyhow::bail!("spec.pool.exec_poll_interval must be greater than zero");
        }
        if pool.exec_poll_interval >= pool.exec_max_wait {
            anyhow::bail!("spec.pool.exec_poll_interval must be shorter than spec.pool.exec_max_wait");
        }
        if pool.reconcile_interval.is_zero() {
            anyhow::bail!("spec.pool.reconcile_interval must be greater than zero");
        }
        // In-flight creations carry the label before they are registered
        if pool.orphan_grace < pool.create_deadline {
            anyhow::bail!("spec.pool.orphan_grace must not be shorter than spec.pool.create_deadline");
        }

        Ok(())
    }
}
