use serde::{Deserialize, Serialize};

/// A message the visitor asked to relay to the profile owner, awaiting confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub sender_email: String,
    pub subject: String,
    pub body: String,
}

/// Per-conversation dialogue state.
///
/// At most one of `pending_message` and `awaiting_body_for` is set at any time; every
/// mutator below keeps that invariant, which is why the fields are private.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    pending_message: Option<OutboundMessage>,
    awaiting_body_for: Option<String>,
    suggestion_active: bool,
    turn_count: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_message(&self) -> Option<&OutboundMessage> {
        self.pending_message.as_ref()
    }

    pub fn has_pending_message(&self) -> bool {
        self.pending_message.is_some()
    }

    pub fn awaiting_body_for(&self) -> Option<&str> {
        self.awaiting_body_for.as_deref()
    }

    pub fn suggestion_active(&self) -> bool {
        self.suggestion_active
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// Counts a new turn and clears the suggestion flag on every `reset_interval`-th turn.
    pub fn advance_turn(&mut self, reset_interval: u64) -> u64 {
        self.turn_count = self.turn_count.saturating_add(1);
        if reset_interval > 0 && self.turn_count % reset_interval == 0 {
            self.suggestion_active = false;
        }
        self.turn_count
    }

    /// Fills the pending slot, overwriting any earlier message.
    pub fn stage_message(&mut self, message: OutboundMessage) {
        self.awaiting_body_for = None;
        self.pending_message = Some(message);
    }

    /// Records an address whose body has not been supplied yet. A new address supersedes
    /// whatever message was pending.
    pub fn await_body_for(&mut self, address: impl Into<String>) {
        self.pending_message = None;
        self.awaiting_body_for = Some(address.into());
    }

    pub fn clear_awaiting_body(&mut self) {
        self.awaiting_body_for = None;
    }

    /// Empties the pending slot (and any half-collected address) for delivery.
    pub fn take_pending_message(&mut self) -> Option<OutboundMessage> {
        self.awaiting_body_for = None;
        self.pending_message.take()
    }

    pub fn mark_suggestion(&mut self) {
        self.suggestion_active = true;
    }

    pub fn clear_suggestion(&mut self) {
        self.suggestion_active = false;
    }
}
