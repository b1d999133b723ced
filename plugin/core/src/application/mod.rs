// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod command_exec;
pub mod lifecycle;
pub mod pool;
pub mod reaper;
pub mod executors;

pub use executors::{dispatch, RequestExecutor};
pub use lifecycle::{AgentHealth, ContainerLifecycle, LifecycleSettings};
pub use pool::{AgentPool, PoolPolicy, ReconcileReport};
pub use reaper::{Reaper, ReaperConfig};
