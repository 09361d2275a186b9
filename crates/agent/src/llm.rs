use std::time::Duration;

use async_trait::async_trait;
use folio_core::domain::turn::{ChatTurn, TurnRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool the model asked to run. `arguments` is the decoded JSON object the model sent,
/// or the raw string when it was not valid JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub tool_invocation_id: String,
    pub payload: Value,
}

impl ToolResult {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            role: MessageRole::Tool,
            content: Some(self.payload.to_string()),
            tool_invocations: Vec::new(),
            tool_call_id: Some(self.tool_invocation_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_invocations: Vec::new(), tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// The assistant turn that requested tools; it must precede the tool results.
    pub fn tool_request(content: Option<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_invocations: invocations,
            tool_call_id: None,
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn.role {
            TurnRole::User => Self::user(turn.content.clone()),
            TurnRole::Assistant => Self::assistant(turn.content.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Final(String),
    ToolCalls { content: Option<String>, invocations: Vec<ToolInvocation> },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model transport failed: {0}")]
    Transport(String),
    #[error("model endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model response could not be decoded: {0}")]
    Decode(String),
    #[error("model returned no usable content")]
    EmptyResponse,
    #[error("model requested tools where plain text was expected")]
    UnexpectedToolCall,
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

/// Single-prompt call used for narrow sub-tasks such as subject lines and compression.
pub async fn complete_text(
    client: &dyn LlmClient,
    prompt: String,
    timeout: Duration,
) -> Result<String, LlmError> {
    let request = CompletionRequest { messages: vec![ChatMessage::user(prompt)], tools: Vec::new() };

    match tokio::time::timeout(timeout, client.complete(request)).await {
        Ok(Ok(Completion::Final(text))) => Ok(text),
        Ok(Ok(Completion::ToolCalls { .. })) => Err(LlmError::UnexpectedToolCall),
        Ok(Err(error)) => Err(error),
        Err(_) => Err(LlmError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use folio_core::domain::turn::ChatTurn;
    use serde_json::json;

    use super::{complete_text, ChatMessage, LlmError, MessageRole, ToolResult};
    use crate::testing::{ScriptedLlm, ScriptedReply};

    #[test]
    fn history_turns_map_to_chat_roles() {
        let user = ChatMessage::from(&ChatTurn::user("hola"));
        let assistant = ChatMessage::from(&ChatTurn::assistant("buenas"));

        assert_eq!(user.role, MessageRole::User);
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert_eq!(assistant.content.as_deref(), Some("buenas"));
    }

    #[test]
    fn tool_result_becomes_tool_message() {
        let message =
            ToolResult { tool_invocation_id: "call_1".to_string(), payload: json!({"recorded": "ok"}) }
                .into_message();

        assert_eq!(message.role, MessageRole::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(message.content.as_deref(), Some(r#"{"recorded":"ok"}"#));
    }

    #[tokio::test]
    async fn complete_text_rejects_tool_calls() {
        let llm = ScriptedLlm::new(vec![ScriptedReply::tool_call("send_email_to_me", json!({}))]);
        let result = complete_text(&llm, "asunto".to_string(), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(LlmError::UnexpectedToolCall)));
    }

    #[tokio::test]
    async fn complete_text_times_out() {
        let llm = ScriptedLlm::new(vec![ScriptedReply::Hang]);
        let result = complete_text(&llm, "asunto".to_string(), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }
}
