// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier assigned by the container engine when a container is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve characters, the way `docker ps` prints ids.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Handle to one build-agent container.
///
/// A `Pending` handle has not been created on the engine yet and is equal
/// only to itself, compared by reference. A `Bound` handle is identified
/// solely by its id; `created_at` is a cache that may be filled in later by
/// inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentContainer {
    Pending,
    Bound {
        id: ContainerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
    },
}

impl AgentContainer {
    pub fn pending() -> Self {
        Self::Pending
    }

    /// Handle for a container known to exist, creation time not yet known.
    pub fn bound(id: ContainerId) -> Self {
        Self::Bound { id, created_at: None }
    }

    /// Handle reconstructed from engine inspection.
    pub fn with_created_at(id: ContainerId, created_at: DateTime<Utc>) -> Self {
        Self::Bound {
            id,
            created_at: Some(created_at),
        }
    }

    pub fn id(&self) -> Option<&ContainerId> {
        match self {
            Self::Pending => None,
            Self::Bound { id, .. } => Some(id),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Bound { created_at, .. } => *created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Cache a creation time resolved from the engine. No-op on `Pending`
    /// and on handles that already know their creation time.
    pub fn cache_created_at(&mut self, resolved: DateTime<Utc>) {
        if let Self::Bound { created_at, .. } = self {
            created_at.get_or_insert(resolved);
        }
    }

    /// Age relative to `now`, if the creation time is known.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.created_at().map(|created| now - created)
    }
}

impl PartialEq for AgentContainer {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            // A pending handle is only itself
            (None, None) => std::ptr::eq(self, other),
            _ => false,
        }
    }
}

impl Hash for AgentContainer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
