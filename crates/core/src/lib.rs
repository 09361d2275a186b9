pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::conversation::{ConversationState, OutboundMessage};
pub use domain::turn::{ChatTurn, TurnRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
