//! Chat shell routes.
//!
//! - `POST /api/v1/chat`: run one dialogue turn for a conversation
//! - `GET  /api/v1/welcome`: greeting shown when a chat opens
//!
//! Every conversation id owns its own `ConversationState` and history. Turns for the
//! same conversation are serialized; different conversations run independently.
//! Conversations idle past `CONVERSATION_IDLE_TTL` are dropped, and once `MAX_CONVERSATIONS`
//! are held the least recently used one makes room for a new id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use folio_agent::replies::welcome_message;
use folio_agent::DialogueController;
use folio_core::domain::conversation::ConversationState;
use folio_core::domain::turn::ChatTurn;
use folio_core::errors::DomainError;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

const MAX_STORED_TURNS: usize = 40;
const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_CONVERSATIONS: usize = 10_000;
const CONVERSATION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Default)]
struct Conversation {
    state: ConversationState,
    history: Vec<ChatTurn>,
}

struct ConversationEntry {
    conversation: Arc<Mutex<Conversation>>,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct ChatState {
    controller: Arc<DialogueController>,
    conversations: Arc<Mutex<HashMap<Uuid, ConversationEntry>>>,
    max_conversations: usize,
    idle_ttl: Duration,
}

impl ChatState {
    pub fn new(controller: Arc<DialogueController>) -> Self {
        Self::with_limits(controller, MAX_CONVERSATIONS, CONVERSATION_IDLE_TTL)
    }

    pub fn with_limits(
        controller: Arc<DialogueController>,
        max_conversations: usize,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            controller,
            conversations: Arc::default(),
            max_conversations: max_conversations.max(1),
            idle_ttl,
        }
    }

    async fn conversation(&self, id: Uuid) -> Arc<Mutex<Conversation>> {
        let now = Instant::now();
        let mut conversations = self.conversations.lock().await;

        if let Some(entry) = conversations.get_mut(&id) {
            entry.last_seen = now;
            return entry.conversation.clone();
        }

        if conversations.len() >= self.max_conversations {
            self.evict(&mut conversations, now);
        }

        let conversation = Arc::new(Mutex::new(Conversation::default()));
        conversations
            .insert(id, ConversationEntry { conversation: conversation.clone(), last_seen: now });
        conversation
    }

    fn evict(&self, conversations: &mut HashMap<Uuid, ConversationEntry>, now: Instant) {
        let before = conversations.len();
        conversations.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);

        if conversations.len() >= self.max_conversations {
            let oldest = conversations
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            if let Some(id) = oldest {
                conversations.remove(&id);
            }
        }

        info!(
            event_name = "chat.conversations.evicted",
            evicted = before - conversations.len(),
            remaining = conversations.len(),
            "conversation capacity reached"
        );
    }

    #[cfg(test)]
    async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Option<Uuid>,
    pub message: String,
    pub history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/welcome", get(welcome))
        .with_state(state)
}

async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);

    if let Err(rejection) = validate_message(&request.message) {
        let error = rejection.into_interface(conversation_id.to_string());
        warn!(
            event_name = "chat.turn.rejected",
            conversation_id = %conversation_id,
            reason = %error,
            "chat message rejected"
        );
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError {
                error: error.user_message(),
                correlation_id: error.correlation_id().to_string(),
            }),
        ));
    }

    let span = info_span!("chat_turn", conversation_id = %conversation_id);
    let reply = async move {
        let conversation = state.conversation(conversation_id).await;
        let mut conversation = conversation.lock().await;

        let history = request.history.unwrap_or_else(|| conversation.history.clone());
        let current = std::mem::take(&mut conversation.state);
        let outcome = state.controller.handle_turn(current, &request.message, &history).await;

        conversation.state = outcome.state;
        conversation.history.push(ChatTurn::user(request.message.clone()));
        conversation.history.push(ChatTurn::assistant(outcome.reply.clone()));
        let excess = conversation.history.len().saturating_sub(MAX_STORED_TURNS);
        conversation.history.drain(..excess);

        info!(
            event_name = "chat.turn.served",
            kind = outcome.kind.as_str(),
            stored_turns = conversation.history.len(),
            "chat turn served"
        );
        outcome.reply
    }
    .instrument(span)
    .await;

    Ok(Json(ChatResponse { conversation_id, reply }))
}

fn validate_message(message: &str) -> Result<(), DomainError> {
    if message.trim().is_empty() {
        return Err(DomainError::EmptyTurn);
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(DomainError::TurnTooLong { max_chars: MAX_MESSAGE_CHARS });
    }
    Ok(())
}

async fn welcome(State(state): State<ChatState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse { message: welcome_message(&state.controller.profile().owner_name) })
}
