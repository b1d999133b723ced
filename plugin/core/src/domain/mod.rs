// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides domain types for the elastic agent plugin.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Container identity, engine contract, registration, configuration

pub mod container;
pub mod engine;
pub mod error;
pub mod registration;
pub mod registry;
pub mod requests;
pub mod plugin_config;
