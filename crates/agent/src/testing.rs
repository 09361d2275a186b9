use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use folio_core::domain::conversation::OutboundMessage;
use serde_json::Value;

use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError, ToolInvocation};
use crate::mail::{MailError, MailSender};
use crate::records::{RecordAppender, RecordError};

static NEXT_CALL_ID: AtomicUsize = AtomicUsize::new(1);

pub enum ScriptedReply {
    Final(String),
    Tools { content: Option<String>, invocations: Vec<ToolInvocation> },
    Fail,
    Hang,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Final(text.into())
    }

    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::Tools { content: None, invocations: vec![invocation(name, arguments)] }
    }
}

pub fn invocation(name: &str, arguments: Value) -> ToolInvocation {
    let id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
    ToolInvocation { id: format!("call_{id}"), name: name.to_string(), arguments }
}

/// Replays canned completions in order and remembers every request it saw.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());

        match next {
            Some(ScriptedReply::Final(text)) => Ok(Completion::Final(text)),
            Some(ScriptedReply::Tools { content, invocations }) => {
                Ok(Completion::ToolCalls { content, invocations })
            }
            Some(ScriptedReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmError::EmptyResponse)
            }
            Some(ScriptedReply::Fail) | None => {
                Err(LlmError::Transport("scripted model unavailable".to_string()))
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<OutboundMessage>>,
    failure: Option<String>,
}

impl RecordingMailSender {
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self { sent: Mutex::new(Vec::new()), failure: Some(reason.into()) }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        match &self.failure {
            Some(reason) => Err(MailError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryRecordAppender {
    records: Mutex<Vec<(PathBuf, String)>>,
}

impl MemoryRecordAppender {
    pub fn records(&self) -> Vec<(PathBuf, String)> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordAppender for MemoryRecordAppender {
    async fn append(&self, path: &Path, record: &str) -> Result<(), RecordError> {
        if let Ok(mut records) = self.records.lock() {
            records.push((path.to_path_buf(), record.to_string()));
        }
        Ok(())
    }
}
