// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::container::{AgentContainer, ContainerId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory registry of the agent containers this plugin considers live.
///
/// Entries are added only after a successful creation (or restart recovery)
/// and removed only after termination or once reconciliation finds the
/// backing container gone. The lock is never held across an `.await`;
/// callers take snapshots instead.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    containers: Mutex<HashMap<ContainerId, AgentContainer>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bound container. Pending handles are ignored and `false` is
    /// returned; otherwise returns whether the id was newly inserted.
    pub fn insert(&self, container: AgentContainer) -> bool {
        let Some(id) = container.id().cloned() else {
            return false;
        };
        self.containers.lock().insert(id, container).is_none()
    }

    pub fn remove(&self, id: &ContainerId) -> Option<AgentContainer> {
        self.containers.lock().remove(id)
    }

    pub fn get(&self, id: &ContainerId) -> Option<AgentContainer> {
        self.containers.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        self.containers.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.containers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<ContainerId> {
        self.containers.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<AgentContainer> {
        self.containers.lock().values().cloned().collect()
    }

    /// Store a lazily resolved creation time on a still-registered entry.
    pub fn cache_created_at(&self, id: &ContainerId, created_at: DateTime<Utc>) {
        if let Some(container) = self.containers.lock().get_mut(id) {
            container.cache_created_at(created_at);
        }
    }
}
