// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatbridge - relays chat messages to a streaming agent service.
//!
//! This crate exposes the runtime used by the `chatbridge` CLI
//! (`src/main.rs`) and by any chat platform integration built on it.
//!
//! Architecture highlights:
//! - `agent`: agent service abstraction, typed feed events, HTTP/SSE client, mock
//! - `bridge`: session registry, event dispatch, streaming delivery, turn supervision
//! - `gateway`: outbound chat surface abstraction (console and mock implementations)
//! - `commands`: operator commands returning user-facing text
//! - `config`: settings file handling

pub mod agent;
pub mod bridge;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod utils;

pub use error::{BridgeError, Result};
