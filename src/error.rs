//! Error types for configuration, actions and the environment.

use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Malformed raw action received from a caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("action must have 2 or 3 components, got {0}")]
    Arity(usize),
    #[error("'{0}' is not a valid move")]
    Move(usize),
    #[error("'{0}' is not a valid consume action")]
    Consume(usize),
    #[error("'{0}' is not a valid mate action")]
    Mate(usize),
}

/// Errors surfaced by the environment controller
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("step called before reset")]
    NotReset,
    #[error("unknown agent id {0}")]
    UnknownAgent(usize),
    #[error("log sink error: {0}")]
    Io(#[from] std::io::Error),
}
