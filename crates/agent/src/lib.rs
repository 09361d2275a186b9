//! Agent Runtime - dialogue state machine for the portfolio assistant
//!
//! This crate is the conversational core of folio. For every visitor turn it:
//! - Detects contact intent deterministically (`intent`)
//! - Stages a single outbound message until the visitor confirms it (`dialogue`)
//! - Falls back to the language model, running its tool requests (`orchestrator`, `tools`)
//! - Keeps every visible reply within the configured length (`budget`)
//!
//! # Architecture
//!
//! Each turn goes through a fixed precedence:
//! 1. **Confirmation** of a pending message, which hands it to the `MailSender`
//! 2. **Format re-prompt** after a contact suggestion was acknowledged
//! 3. **Body capture** for an address given in an earlier turn
//! 4. **Intent patterns** (`IntentMatcher`) for addresses, bodies and trigger phrases
//! 5. **Model answer** through the bounded tool loop
//!
//! # Key Types
//!
//! - `DialogueController` - per-turn entry point (see `dialogue` module)
//! - `LlmClient` - pluggable chat-completions backend (`openai` provides the HTTP one)
//! - `ConversationState` - owned per-conversation state, from `folio_core`
//!
//! # Safety Principle
//!
//! The model never sends mail. A `send_email_to_me` request only stages a draft; delivery
//! happens after the visitor explicitly confirms it.

pub mod budget;
pub mod dialogue;
pub mod intent;
pub mod llm;
pub mod mail;
pub mod openai;
pub mod orchestrator;
pub mod profile;
pub mod records;
pub mod replies;
pub mod runtime;
pub mod subject;
pub mod tools;

#[cfg(test)]
mod testing;

pub use dialogue::{DialogueController, DialogueSettings, TurnKind, TurnOutcome};
pub use runtime::{bootstrap_controller, build_controller, AgentDependencies, RuntimeError};
