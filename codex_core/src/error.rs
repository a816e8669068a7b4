//! Error types for the Codex engine.

use thiserror::Error;
use topic_model::{NodeId, NodeStatus, TopicError};

/// Store operations invoked against a missing node or in the wrong status.
///
/// These indicate a broken coupling between sessions and the store, not a
/// user-facing condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("cannot {operation} node {id} while it is {status}")]
    InvalidState {
        id: NodeId,
        status: NodeStatus,
        operation: &'static str,
    },
}

/// Failures talking to the content backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("backend reported an error: {0}")]
    Remote(String),

    #[error("stream ended before completion")]
    Truncated,
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error type of the engine.
#[derive(Debug, Error)]
pub enum CodexError {
    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type CodexResult<T> = Result<T, CodexError>;
