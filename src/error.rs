// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for chatbridge
//!
//! This module defines all error types used throughout the bridge.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Agent service errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Messaging gateway errors (send/edit rejected)
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Agent service error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from the service
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The service returned an error status
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Event stream error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Messaging gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway cannot edit messages in place
    #[error("editing messages is not supported by {0}")]
    EditUnsupported(String),

    /// The platform rejected the call
    #[error("{operation} rejected: {reason}")]
    Rejected { operation: String, reason: String },
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
