// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the HTTP surface of the plugin host.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Routes plugin requests to the request executors

pub mod api;
