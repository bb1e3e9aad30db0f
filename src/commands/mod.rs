// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Operator commands
//!
//! Each command talks to the agent service and returns the text to show the
//! user. Persisting settings is left to the caller.

pub mod models;
pub mod session;
pub mod system;

/// Messages listed per page by `session messages`
pub const MESSAGES_PAGE_SIZE: usize = 5;
