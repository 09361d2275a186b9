use thiserror::Error;

use crate::config::ConfigError;

/// Turns rejected before they reach the dialogue controller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("turn message must not be empty")]
    EmptyTurn,
    #[error("turn message exceeds {max_chars} characters")]
    TurnTooLong { max_chars: usize },
}

/// Startup failures shared by the server and the cli.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("dependency setup failed: {0}")]
    Dependency(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::Dependency(_) => "dependency_setup",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Dependency(_) => 4,
        }
    }
}

/// What an HTTP caller sees for a rejected turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("bad request: {reason}")]
pub struct InterfaceError {
    reason: DomainError,
    correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> String {
        match self.reason {
            DomainError::EmptyTurn => {
                "The request could not be processed. Check inputs and try again.".to_string()
            }
            DomainError::TurnTooLong { max_chars } => {
                format!("Messages are limited to {max_chars} characters. Shorten it and try again.")
            }
        }
    }

    pub fn reason(&self) -> &DomainError {
        &self.reason
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl DomainError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError { reason: self, correlation_id: correlation_id.into() }
    }
}
