// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory container engine shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use docker_elastic_agents_core::application::lifecycle::{ContainerLifecycle, LifecycleSettings};
use docker_elastic_agents_core::application::pool::{AgentPool, PoolPolicy};
use docker_elastic_agents_core::domain::container::ContainerId;
use docker_elastic_agents_core::domain::engine::{
    ContainerDetails, ContainerEngine, ContainerSpec, ContainerSummary, EngineError, ExecId,
    ExecOutputStream, ExecState,
};
use docker_elastic_agents_core::domain::registration::{CREATED_BY_LABEL_KEY, PLUGIN_ID};
use docker_elastic_agents_core::domain::registry::AgentRegistry;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub created_at: DateTime<Utc>,
    pub running: bool,
    pub labels: HashMap<String, String>,
    pub spec: Option<ContainerSpec>,
}

#[derive(Debug, Clone)]
struct FakeExec {
    exit_code: i64,
    output: String,
    polls_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub container_id: String,
    pub cmd: Vec<String>,
    pub detached: Option<bool>,
}

#[derive(Default)]
pub struct FakeState {
    next_id: u64,
    pub containers: HashMap<String, FakeContainer>,
    execs: HashMap<String, FakeExec>,
    pub exec_calls: Vec<ExecCall>,
    pub uploads: Vec<(String, String, Bytes)>,
    pub stop_calls: Vec<(String, Duration)>,
    pub remove_calls: Vec<String>,

    /// Commands whose joined text contains the key finish with this result
    pub exec_results: Vec<(String, i64, String)>,
    /// Number of polls an attached exec reports as running
    pub running_polls: u32,
    pub unavailable: bool,
    pub fail_copy: bool,
    pub stop_not_found: bool,
    pub hang_on_create: bool,
    /// Containers whose inspection fails with a non-NotFound error
    pub failing_inspects: Vec<String>,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn fail_command(&self, pattern: &str, exit_code: i64, output: &str) {
        self.with(|s| {
            s.exec_results
                .push((pattern.to_string(), exit_code, output.to_string()))
        });
    }

    /// Seed an existing container, optionally carrying the ownership label.
    pub fn seed_container(&self, id: &str, created_at: DateTime<Utc>, owned: bool) {
        let labels = if owned {
            HashMap::from([(CREATED_BY_LABEL_KEY.to_string(), PLUGIN_ID.to_string())])
        } else {
            HashMap::from([("app".to_string(), "unrelated".to_string())])
        };
        self.with(|s| {
            s.containers.insert(
                id.to_string(),
                FakeContainer {
                    created_at,
                    running: true,
                    labels,
                    spec: None,
                },
            )
        });
    }

    pub fn remove_out_of_band(&self, id: &str) {
        self.with(|s| s.containers.remove(id));
    }

    pub fn container_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.with(|s| s.containers.keys().cloned().collect());
        ids.sort();
        ids
    }

    pub fn exec_calls(&self) -> Vec<ExecCall> {
        self.with(|s| s.exec_calls.clone())
    }

    fn check_available(state: &FakeState) -> Result<(), EngineError> {
        if state.unavailable {
            Err(EngineError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.with(|s| Self::check_available(s))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, EngineError> {
        if self.with(|s| s.hang_on_create) {
            std::future::pending::<()>().await;
        }
        self.with(|s| {
            Self::check_available(s)?;
            s.next_id += 1;
            let id = format!("fake{:020x}", s.next_id);
            s.containers.insert(
                id.clone(),
                FakeContainer {
                    created_at: Utc::now(),
                    running: false,
                    labels: spec.labels.clone(),
                    spec: Some(spec.clone()),
                },
            );
            Ok(ContainerId::new(id))
        })
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            let container = s
                .containers
                .get_mut(id.as_str())
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            container.running = true;
            Ok(())
        })
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            if s.failing_inspects.iter().any(|f| f == id.as_str()) {
                return Err(EngineError::Request(format!("inspect {}: daemon error", id)));
            }
            let container = s
                .containers
                .get(id.as_str())
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            Ok(ContainerDetails {
                id: id.clone(),
                created_at: container.created_at,
                running: container.running,
                labels: container.labels.clone(),
            })
        })
    }

    async fn list_containers(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            Ok(s.containers
                .iter()
                .filter(|(_, c)| c.labels.get(label_key).map(String::as_str) == Some(label_value))
                .map(|(id, c)| ContainerSummary {
                    id: ContainerId::new(id.clone()),
                    created_at: Some(c.created_at),
                })
                .collect())
        })
    }

    async fn create_exec(&self, id: &ContainerId, cmd: &[String]) -> Result<ExecId, EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            if !s.containers.contains_key(id.as_str()) {
                return Err(EngineError::NotFound(id.to_string()));
            }
            let joined = cmd.join(" ");
            let (exit_code, output) = s
                .exec_results
                .iter()
                .find(|(pattern, _, _)| joined.contains(pattern.as_str()))
                .map(|(_, code, out)| (*code, out.clone()))
                .unwrap_or((0, String::new()));

            let exec_id = format!("exec-{}", s.exec_calls.len() + 1);
            s.execs.insert(
                exec_id.clone(),
                FakeExec {
                    exit_code,
                    output,
                    polls_remaining: s.running_polls,
                },
            );
            s.exec_calls.push(ExecCall {
                container_id: id.to_string(),
                cmd: cmd.to_vec(),
                detached: None,
            });
            Ok(ExecId(exec_id))
        })
    }

    async fn start_exec(
        &self,
        exec: &ExecId,
        detached: bool,
    ) -> Result<Option<ExecOutputStream>, EngineError> {
        let output = self.with(|s| {
            Self::check_available(s)?;
            let fake = s
                .execs
                .get(exec.as_str())
                .cloned()
                .ok_or_else(|| EngineError::NotFound(exec.as_str().to_string()))?;
            if let Some(call) = s.exec_calls.last_mut() {
                call.detached = Some(detached);
            }
            Ok::<_, EngineError>(fake.output)
        })?;

        if detached {
            return Ok(None);
        }
        let chunks: Vec<Result<Bytes, EngineError>> = if output.is_empty() {
            vec![]
        } else {
            vec![Ok(Bytes::from(output))]
        };
        Ok(Some(futures::stream::iter(chunks).boxed()))
    }

    async fn inspect_exec(&self, exec: &ExecId) -> Result<ExecState, EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            let fake = s
                .execs
                .get_mut(exec.as_str())
                .ok_or_else(|| EngineError::NotFound(exec.as_str().to_string()))?;
            if fake.polls_remaining > 0 {
                fake.polls_remaining -= 1;
                return Ok(ExecState {
                    running: true,
                    exit_code: None,
                });
            }
            Ok(ExecState {
                running: false,
                exit_code: Some(fake.exit_code),
            })
        })
    }

    async fn copy_to_container(
        &self,
        id: &ContainerId,
        archive: Bytes,
        remote_path: &str,
    ) -> Result<(), EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            if s.fail_copy {
                return Err(EngineError::Request("copy rejected by daemon".to_string()));
            }
            if !s.containers.contains_key(id.as_str()) {
                return Err(EngineError::NotFound(id.to_string()));
            }
            s.uploads.push((id.to_string(), remote_path.to_string(), archive));
            Ok(())
        })
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            s.stop_calls.push((id.to_string(), grace));
            if s.stop_not_found {
                return Err(EngineError::NotFound(id.to_string()));
            }
            let container = s
                .containers
                .get_mut(id.as_str())
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            container.running = false;
            Ok(())
        })
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.with(|s| {
            Self::check_available(s)?;
            s.remove_calls.push(id.to_string());
            s.containers
                .remove(id.as_str())
                .map(|_| ())
                .ok_or_else(|| EngineError::NotFound(id.to_string()))
        })
    }
}

/// A pool wired to a fake engine, with private staging root and artifact.
pub struct TestEnv {
    pub engine: Arc<FakeEngine>,
    pub pool: Arc<AgentPool>,
    pub registry: Arc<AgentRegistry>,
    pub staging_root: PathBuf,
    _dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_policy(PoolPolicy {
            create_deadline: Duration::from_secs(5),
            max_agent_age: Duration::from_secs(3600),
            orphan_grace: Duration::from_secs(600),
        })
    }

    pub fn with_policy(policy: PoolPolicy) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging_root = dir.path().join("staging");
        std::fs::create_dir_all(&staging_root).expect("staging root");
        let artifact = write_artifact(dir.path());

        let engine = FakeEngine::new();
        let settings = test_settings(&staging_root, &artifact);
        let lifecycle = Arc::new(ContainerLifecycle::new(engine.clone(), settings));
        let registry = Arc::new(AgentRegistry::new());
        let pool = Arc::new(AgentPool::new(
            engine.clone(),
            lifecycle,
            registry.clone(),
            policy,
        ));

        Self {
            engine,
            pool,
            registry,
            staging_root,
            _dir: dir,
        }
    }

    pub fn staging_entries(&self) -> usize {
        std::fs::read_dir(&self.staging_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn write_artifact(dir: &Path) -> PathBuf {
    let path = dir.join("agent.jar");
    std::fs::write(&path, b"PK\x03\x04 test agent").expect("artifact");
    path
}

pub fn test_settings(staging_root: &Path, artifact: &Path) -> LifecycleSettings {
    LifecycleSettings {
        image: "gocd/ubuntu-docker-elastic-agent".to_string(),
        working_dir: "/go-agent".to_string(),
        artifact_path: artifact.to_path_buf(),
        server_url: "https://ci.example.com:8154/go".to_string(),
        staging_root: staging_root.to_path_buf(),
        health_probe: vec!["pgrep".to_string(), "-f".to_string(), "agent.jar".to_string()],
        stop_grace: Duration::from_secs(2),
        exec_poll_interval: Duration::from_millis(1),
        exec_max_wait: Duration::from_secs(2),
    }
}

/// Read a file from an uploaded tar archive.
pub fn read_from_archive(archive: &Bytes, suffix: &str) -> Option<String> {
    use std::io::Read;
    let mut archive = tar::Archive::new(archive.as_ref());
    for entry in archive.entries().ok()? {
        let mut entry = entry.ok()?;
        let path = entry.path().ok()?.to_string_lossy().into_owned();
        if path.ends_with(suffix) {
            let mut content = String::new();
            entry.read_to_string(&mut content).ok()?;
            return Some(content);
        }
    }
    None
}
