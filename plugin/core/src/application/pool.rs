// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Pool Manager
//!
//! Owns the registry of live agent containers and answers the CI server's
//! scheduling questions.
//!
//! # Reconciliation
//!
//! The registry is kept honest against the engine by [`AgentPool::reconcile`]:
//!
//! 1. entries the engine confirms gone are evicted
//! 2. entries older than `max_agent_age` are terminated and evicted
//! 3. containers carrying the ownership label but missing from the registry
//!    (left behind by a failed bootstrap) are terminated once older than
//!    `orphan_grace`
//!
//! Termination is idempotent, so a pass may race a concurrent terminate of
//! the same container without coordination.

use crate::application::lifecycle::{AgentHealth, ContainerLifecycle};
use crate::domain::container::{AgentContainer, ContainerId};
use crate::domain::engine::{ContainerEngine, ContainerSummary};
use crate::domain::error::AgentError;
use crate::domain::plugin_config::PoolConfig;
use crate::domain::registration::{CREATED_BY_LABEL_KEY, PLUGIN_ID};
use crate::domain::registry::AgentRegistry;
use crate::domain::requests::{CreateAgentRequest, ShouldAssignWorkRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PoolPolicy {
    pub create_deadline: Duration,
    pub max_agent_age: Duration,
    pub orphan_grace: Duration,
}

impl From<&PoolConfig> for PoolPolicy {
    fn from(config: &PoolConfig) -> Self {
        Self {
            create_deadline: config.create_deadline,
            max_agent_age: config.max_agent_age,
            orphan_grace: config.orphan_grace,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Registry entries whose container no longer exists
    pub evicted: Vec<ContainerId>,
    /// Registered agents terminated for exceeding the age limit
    pub reaped: Vec<ContainerId>,
    /// Unregistered labeled containers terminated
    pub orphans_removed: Vec<ContainerId>,
    /// Per-container inspections or terminations that failed; retried next pass
    pub failures: usize,
}

pub struct AgentPool {
    engine: Arc<dyn ContainerEngine>,
    lifecycle: Arc<ContainerLifecycle>,
    registry: Arc<AgentRegistry>,
    policy: PoolPolicy,
}

impl AgentPool {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lifecycle: Arc<ContainerLifecycle>,
        registry: Arc<AgentRegistry>,
        policy: PoolPolicy,
    ) -> Self {
        Self {
            engine,
            lifecycle,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Arc<ContainerLifecycle> {
        &self.lifecycle
    }

    /// Admission decision for a job.
    ///
    /// Always affirmative: scale limits are left to the CI server's own
    /// concurrency caps. This is the place to compare pool size, resources
    /// and environment against the request.
    pub fn should_assign_work(&self, request: &ShouldAssignWorkRequest) -> bool {
        debug!(
            environment = ?request.environment,
            resources = ?request.resources(),
            job = ?request.job_identifier.job_name,
            pool_size = self.registry.len(),
            "Accepting work assignment"
        );
        true
    }

    /// Create and bootstrap a new agent, registering it on success.
    pub async fn create_agent(
        &self,
        request: &CreateAgentRequest,
    ) -> Result<AgentContainer, AgentError> {
        let bootstrap = request.bootstrap_config();
        let deadline = self.policy.create_deadline;

        let result = match timeout(deadline, self.lifecycle.create_and_bootstrap(&bootstrap)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::DeadlineExceeded(deadline)),
        };

        match result {
            Ok(container) => {
                self.registry.insert(container.clone());
                metrics::counter!("elastic_agents_created_total").increment(1);
                self.record_pool_size();
                info!(
                    container_id = ?container.id().map(ContainerId::short),
                    environment = ?bootstrap.environment,
                    resources = ?bootstrap.resources,
                    "Registered new agent"
                );
                Ok(container)
            }
            Err(e) => {
                metrics::counter!("elastic_agents_creation_failures_total").increment(1);
                warn!("Agent creation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Terminate an agent and drop it from the registry. Succeeds when the
    /// container is already gone.
    pub async fn terminate_agent(&self, id: &ContainerId) -> Result<(), AgentError> {
        let container = self
            .registry
            .get(id)
            .unwrap_or_else(|| AgentContainer::bound(id.clone()));
        self.lifecycle.terminate(&container).await?;

        if self.registry.remove(id).is_some() {
            metrics::counter!("elastic_agents_terminated_total").increment(1);
        }
        self.record_pool_size();
        Ok(())
    }

    pub async fn health(&self, id: &ContainerId) -> Result<AgentHealth, AgentError> {
        self.lifecycle.health_check(id).await
    }

    pub async fn ping(&self) -> Result<(), AgentError> {
        Ok(self.engine.ping().await?)
    }

    /// Rebuild the registry from labeled containers after a restart.
    /// Returns the number of newly registered containers.
    pub async fn recover(&self) -> Result<usize, AgentError> {
        let listed = self.list_owned().await?;
        let mut recovered = 0;

        for summary in listed {
            match self.lifecycle.find(&summary.id).await {
                Ok(container) => {
                    if self.registry.insert(container) {
                        recovered += 1;
                    }
                }
                Err(AgentError::NotFound(_)) => {
                    debug!(container_id = %summary.id.short(), "Container vanished during recovery");
                }
                Err(e) => return Err(e),
            }
        }

        self.record_pool_size();
        info!(recovered, pool_size = self.registry.len(), "Recovered agent registry from engine");
        Ok(recovered)
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, AgentError> {
        self.reconcile_at(Utc::now()).await
    }

    /// One reconciliation pass evaluated at `now`.
    pub async fn reconcile_at(&self, now: DateTime<Utc>) -> Result<ReconcileReport, AgentError> {
        let mut live: HashMap<ContainerId, ContainerSummary> = self
            .list_owned()
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let mut report = ReconcileReport::default();
        let mut unresolved = HashSet::new();

        // Unlisted entries are evicted only once the engine confirms them
        // gone, so an agent registered after the listing survives.
        for id in self.registry.ids() {
            if live.contains_key(&id) {
                continue;
            }
            match self.engine.inspect_container(&id).await {
                Err(e) if e.is_not_found() => {
                    self.registry.remove(&id);
                    info!(container_id = %id.short(), "Evicted agent whose container is gone");
                    report.evicted.push(id);
                }
                Err(e) => {
                    warn!(container_id = %id.short(), "Cannot inspect registered agent: {}", e);
                    report.failures += 1;
                    unresolved.insert(id);
                }
                Ok(_) => {}
            }
        }

        let max_age = chrono::Duration::from_std(self.policy.max_agent_age)
            .unwrap_or(chrono::Duration::MAX);
        for mut container in self.registry.snapshot() {
            let Some(id) = container.id().cloned() else {
                continue;
            };
            if unresolved.contains(&id) {
                continue;
            }
            if let Some(created_at) = live.get(&id).and_then(|s| s.created_at) {
                container.cache_created_at(created_at);
            }
            let created_at = match self.lifecycle.resolve_created_at(&mut container).await {
                Ok(created_at) => created_at,
                Err(AgentError::NotFound(_)) => {
                    self.registry.remove(&id);
                    live.remove(&id);
                    report.evicted.push(id);
                    continue;
                }
                Err(e) => {
                    warn!(container_id = %id.short(), "Cannot resolve creation time: {}", e);
                    report.failures += 1;
                    continue;
                }
            };
            self.registry.cache_created_at(&id, created_at);

            if now - created_at <= max_age {
                continue;
            }
            match self.lifecycle.terminate(&container).await {
                Ok(()) => {
                    self.registry.remove(&id);
                    // Handled here, not an orphan for the pass below
                    live.remove(&id);
                    metrics::counter!("elastic_agents_reaped_total").increment(1);
                    info!(container_id = %id.short(), %created_at, "Reaped agent past its maximum age");
                    report.reaped.push(id);
                }
                Err(e) => {
                    warn!(container_id = %id.short(), "Failed to reap agent: {}", e);
                    report.failures += 1;
                }
            }
        }

        let grace = chrono::Duration::from_std(self.policy.orphan_grace)
            .unwrap_or(chrono::Duration::MAX);
        for (id, summary) in live {
            if self.registry.contains(&id) {
                continue;
            }
            let created_at = match summary.created_at {
                Some(created_at) => created_at,
                None => match self.lifecycle.find(&id).await {
                    Ok(container) => container.created_at().unwrap_or(now),
                    Err(AgentError::NotFound(_)) => continue,
                    Err(e) => {
                        warn!(container_id = %id.short(), "Cannot inspect orphan: {}", e);
                        report.failures += 1;
                        continue;
                    }
                },
            };
            if now - created_at < grace {
                debug!(container_id = %id.short(), "Unregistered container within grace period");
                continue;
            }
            match self.lifecycle.terminate(&AgentContainer::bound(id.clone())).await {
                Ok(()) => {
                    metrics::counter!("elastic_agents_reaped_total").increment(1);
                    info!(container_id = %id.short(), "Removed orphaned agent container");
                    report.orphans_removed.push(id);
                }
                Err(e) => {
                    warn!(container_id = %id.short(), "Failed to remove orphan: {}", e);
                    report.failures += 1;
                }
            }
        }

        self.record_pool_size();
        Ok(report)
    }

    async fn list_owned(&self) -> Result<Vec<ContainerSummary>, AgentError> {
        Ok(self
            .engine
            .list_containers(CREATED_BY_LABEL_KEY, PLUGIN_ID)
            .await?)
    }

    fn record_pool_size(&self) {
        metrics::gauge!("elastic_agents_pool_size").set(self.registry.len() as f64);
    }
}
