//! Chat-completions client for OpenAI and any endpoint speaking the same wire format
//! (Ollama's `/v1` compatibility layer included).

use std::time::Duration;

use async_trait::async_trait;
use folio_core::config::LlmConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::llm::{
    ChatMessage, Completion, CompletionRequest, LlmClient, LlmError, ToolDefinition, ToolInvocation,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let body = WireRequest {
            model: &self.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request.tools.iter().map(WireTool::from).collect(),
        };

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key.expose_secret());
        }

        let response = http.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorEnvelope>(&error_text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(error_text);
            return Err(LlmError::Status { status: status.as_u16(), message });
        }

        let completion: WireResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        debug!(
            event_name = "llm.completion.received",
            model = %self.model,
            choices = completion.choices.len(),
            "chat completion received"
        );
        into_completion(completion)
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

fn into_completion(response: WireResponse) -> Result<Completion, LlmError> {
    let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
    let wants_tools = choice.finish_reason.as_deref() == Some("tool_calls")
        || !choice.message.tool_calls.is_empty();

    if wants_tools {
        let invocations = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
                name: call.function.name,
            })
            .collect::<Vec<_>>();
        if invocations.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        return Ok(Completion::ToolCalls { content: choice.message.content, invocations });
    }

    choice
        .message
        .content
        .filter(|content| !content.trim().is_empty())
        .map(Completion::Final)
        .ok_or(LlmError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCallOut<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.as_deref(),
            tool_calls: message
                .tool_invocations
                .iter()
                .map(|invocation| WireToolCallOut {
                    id: &invocation.id,
                    call_type: "function",
                    function: WireFunctionOut {
                        name: &invocation.name,
                        arguments: match &invocation.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCallOut<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: WireFunctionOut<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionOut<'a> {
    name: &'a str,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for WireTool<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            function: WireFunctionSpec {
                name: tool.name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallIn>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallIn {
    id: String,
    function: WireFunctionIn,
}

#[derive(Debug, Deserialize)]
struct WireFunctionIn {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}
