//! Error types for the bot fleet.

use crate::agent::AgentId;

/// Error surfaced to the operator by console commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors returned synchronously by supervisor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("An agent named {name} already exists")]
    DuplicateName { name: String },

    #[error("No agent with id {id}")]
    UnknownId { id: AgentId },
}

/// Failure of a single remote score fetch. Fatal to the worker that saw it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors from the on-disk credential definitions.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Invalid agent name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("No definition stored for {name}")]
    NotFound { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the fleet.
pub type Result<T> = std::result::Result<T, Error>;
