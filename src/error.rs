//! Error types for service resolution and the config-driven tree.

use thiserror::Error;

/// Errors raised by the linking, lookup and promotion protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    #[error("Incompatible caller: argument does not expose a service lookup capability")]
    IncompatibleCaller,

    #[error("Service '{key}' not found locally and node is not linked to a parent")]
    Unbound { key: String },

    #[error("Unknown service: {key}")]
    UnknownService { key: String },

    #[error("Service '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Application-level errors for the config-driven tree and the CLI.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),
}
