//! Error types for the braidline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all braidline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model client errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Stream encoding errors ---
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability {0} not found")]
    NotFound(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("capability execution failed: {name} — {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Payload serialization failed: {0}")]
    Payload(String),

    #[error("Frame truncated: {0}")]
    Truncated(String),
}
