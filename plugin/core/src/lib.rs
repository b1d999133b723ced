// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Docker Elastic Agents Core
//!
//! Provisions single-use build-agent containers for a CI server on demand.
//!
//! # Architecture
//!
//! - **domain:** container identity, engine contract, registration descriptor,
//!   pool registry, configuration manifest
//! - **application:** command execution, container lifecycle, agent pool,
//!   reaper, request executors
//! - **infrastructure:** Docker adapter (`bollard`) and the local staging area
//! - **presentation:** HTTP surface carrying plugin requests

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
