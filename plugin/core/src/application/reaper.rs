// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Reaper - Background reconciliation task
//!
//! Periodically runs [`AgentPool::reconcile`] so that aged-out agents and
//! orphaned containers are removed even when the CI server stops pinging.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drives pool reconciliation on a fixed interval

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::pool::AgentPool;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How often to reconcile
    pub interval: Duration,

    /// Whether reaping is enabled
    pub enabled: bool,
}

pub struct Reaper {
    pool: Arc<AgentPool>,
    config: ReaperConfig,
    shutdown_token: CancellationToken,
}

impl Reaper {
    pub fn new(pool: Arc<AgentPool>, config: ReaperConfig) -> Self {
        Self {
            pool,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Agent reaper is disabled");
            return;
        }

        info!(interval = ?self.config.interval, "Starting agent reaper background task");

        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running reconciliation pass");
                    match self.pool.reconcile().await {
                        Ok(report) => {
                            debug!(
                                evicted = report.evicted.len(),
                                reaped = report.reaped.len(),
                                orphans_removed = report.orphans_removed.len(),
                                failures = report.failures,
                                "Reconciliation pass completed"
                            );
                        }
                        Err(e) => {
                            warn!("Reconciliation pass failed: {}", e);
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping agent reaper");
                    break;
                }
            }
        }

        info!("Agent reaper background task stopped");
    }
}
