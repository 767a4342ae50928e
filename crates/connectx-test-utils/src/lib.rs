// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ConnectX integration tests.
//!
//! Provides in-memory collaborators and harness infrastructure for fast,
//! deterministic tests without external services.
//!
//! # Components
//!
//! - [`MemoryBackend`] - Identity, directory, graph and message store in memory
//! - [`MockConnector`] - Scripted transport for client session tests
//! - [`GatewayHarness`] - A live gateway on an ephemeral port

pub mod harness;
pub mod memory;
pub mod mock_connector;

pub use harness::{GatewayHarness, WsTestClient};
pub use memory::MemoryBackend;
pub use mock_connector::{MockConnector, ServerEnd};
