use std::sync::Arc;

use folio_core::domain::conversation::OutboundMessage;
use folio_core::domain::turn::ChatTurn;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, Completion, CompletionRequest, LlmClient, LlmError, ToolDefinition, ToolResult};
use crate::subject::{accept_subject, SubjectInferrer};
use crate::tools::{ToolCall, ToolExecutor};

/// How a main-model exchange ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestratorOutcome {
    Answered(String),
    /// The model asked to send mail; nothing was sent, the draft waits for the visitor.
    AwaitingConfirmation(OutboundMessage),
    Exhausted { rounds: u32 },
}

/// Drives the completion/tool-call loop against the main model for a bounded number of rounds.
#[derive(Clone)]
pub struct ToolOrchestrator {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    subjects: SubjectInferrer,
    tools: Vec<ToolDefinition>,
    max_rounds: u32,
}

impl ToolOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        subjects: SubjectInferrer,
        tools: Vec<ToolDefinition>,
        max_rounds: u32,
    ) -> Self {
        Self { llm, executor, subjects, tools, max_rounds: max_rounds.max(1) }
    }

    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<OrchestratorOutcome, LlmError> {
        let mut transcript = Vec::with_capacity(history.len() + 2);
        transcript.push(ChatMessage::system(system_prompt));
        transcript.extend(history.iter().map(ChatMessage::from));
        transcript.push(ChatMessage::user(user_message));

        for round in 1..=self.max_rounds {
            let request =
                CompletionRequest { messages: transcript.clone(), tools: self.tools.clone() };

            let (content, invocations) = match self.llm.complete(request).await? {
                Completion::Final(text) => {
                    debug!(event_name = "orchestrator.answered", round, "model answered");
                    return Ok(OrchestratorOutcome::Answered(text));
                }
                Completion::ToolCalls { content, invocations } => (content, invocations),
            };

            transcript.push(ChatMessage::tool_request(content, invocations.clone()));

            for invocation in &invocations {
                let call = ToolCall::from_invocation(invocation);
                info!(
                    event_name = "orchestrator.tool_call",
                    round,
                    tool = call.tool_name(),
                    "model requested tool"
                );

                if let ToolCall::SendEmailToMe(draft) = &call {
                    let subject = match draft.subject().and_then(accept_subject) {
                        Some(subject) => subject,
                        None => self.subjects.infer(&draft.body, history).await,
                    };
                    return Ok(OrchestratorOutcome::AwaitingConfirmation(OutboundMessage {
                        sender_email: draft.sender_email.trim().to_string(),
                        subject,
                        body: draft.body.trim().to_string(),
                    }));
                }

                let payload = self.executor.execute(&call).await;
                transcript.push(
                    ToolResult { tool_invocation_id: invocation.id.clone(), payload }.into_message(),
                );
            }
        }

        warn!(
            event_name = "orchestrator.exhausted",
            rounds = self.max_rounds,
            "model kept requesting tools past the round limit"
        );
        Ok(OrchestratorOutcome::Exhausted { rounds: self.max_rounds })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use folio_core::domain::turn::ChatTurn;
    use serde_json::json;

    use super::{OrchestratorOutcome, ToolOrchestrator};
    use crate::llm::{MessageRole, ToolInvocation};
    use crate::subject::SubjectInferrer;
    use crate::testing::{MemoryRecordAppender, ScriptedLlm, ScriptedReply};
    use crate::tools::{tool_definitions, ToolExecutor};

    fn orchestrator(
        llm: Arc<ScriptedLlm>,
        records: Arc<MemoryRecordAppender>,
        max_rounds: u32,
    ) -> ToolOrchestrator {
        ToolOrchestrator::new(
            llm.clone(),
            ToolExecutor::new(records, "leads.txt", "questions.txt"),
            SubjectInferrer::new(llm, Duration::from_secs(1)),
            tool_definitions("Diego"),
            max_rounds,
        )
    }

    #[tokio::test]
    async fn plain_answer_needs_one_round() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedReply::text("Trabajo con Rust.")]));
        let history = vec![ChatTurn::user("hola"), ChatTurn::assistant("¡Hola!")];

        let outcome = orchestrator(llm.clone(), Arc::default(), 5)
            .run("sistema", &history, "¿Qué lenguajes usas?")
            .await
            .expect("run");

        assert_eq!(outcome, OrchestratorOutcome::Answered("Trabajo con Rust.".to_string()));
        let request = &llm.requests()[0];
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[3].content.as_deref(), Some("¿Qué lenguajes usas?"));
        assert_eq!(request.tools.len(), 3);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_resubmitting() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedReply::tool_call("record_unknown_question", json!({"question": "¿Sabes COBOL?"})),
            ScriptedReply::text("No tengo ese dato, lo he anotado."),
        ]));
        let records = Arc::new(MemoryRecordAppender::default());

        let outcome = orchestrator(llm.clone(), records.clone(), 5)
            .run("sistema", &[], "¿Sabes COBOL?")
            .await
            .expect("run");

        assert_eq!(
            outcome,
            OrchestratorOutcome::Answered("No tengo ese dato, lo he anotado.".to_string())
        );
        assert_eq!(records.records().len(), 1);

        let second = &llm.requests()[1];
        let tool_request = &second.messages[2];
        let tool_result = &second.messages[3];
        assert_eq!(tool_request.role, MessageRole::Assistant);
        assert_eq!(tool_request.tool_invocations.len(), 1);
        assert_eq!(tool_result.role, MessageRole::Tool);
        assert_eq!(tool_result.tool_call_id, Some(tool_request.tool_invocations[0].id.clone()));
        assert_eq!(tool_result.content.as_deref(), Some(r#"{"recorded":"ok"}"#));
    }

    #[tokio::test]
    async fn send_tool_short_circuits_with_inferred_subject() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedReply::tool_call(
                "send_email_to_me",
                json!({"sender_email": "ana@x.com", "body": "Tengo un proyecto para ti"}),
            ),
            ScriptedReply::Fail,
        ]));
        let records = Arc::new(MemoryRecordAppender::default());

        let outcome = orchestrator(llm.clone(), records.clone(), 5)
            .run("sistema", &[], "Envíale esto a Diego")
            .await
            .expect("run");

        match outcome {
            OrchestratorOutcome::AwaitingConfirmation(message) => {
                assert_eq!(message.sender_email, "ana@x.com");
                assert_eq!(message.subject, "Propuesta de proyecto");
                assert_eq!(message.body, "Tengo un proyecto para ti");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(records.records().is_empty());
        // main call plus the failed subject call
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn explicit_subject_skips_inference() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedReply::tool_call(
            "send_email_to_me",
            json!({"sender_email": "ana@x.com", "subject": "Hola Diego", "body": "Saludos"}),
        )]));

        let outcome =
            orchestrator(llm.clone(), Arc::default(), 5).run("sistema", &[], "x").await.expect("run");

        assert!(matches!(
            outcome,
            OrchestratorOutcome::AwaitingConfirmation(ref message) if message.subject == "Hola Diego"
        ));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn oversized_model_subject_is_replaced_by_an_inferred_one() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedReply::tool_call(
                "send_email_to_me",
                json!({
                    "sender_email": "ana@x.com",
                    "subject": "a".repeat(300),
                    "body": "Tengo un proyecto para ti"
                }),
            ),
            ScriptedReply::text("Asunto: \"Colaboración en proyecto\""),
        ]));

        let outcome =
            orchestrator(llm.clone(), Arc::default(), 5).run("sistema", &[], "x").await.expect("run");

        assert!(matches!(
            outcome,
            OrchestratorOutcome::AwaitingConfirmation(ref message)
                if message.subject == "Colaboración en proyecto"
        ));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_tools_do_not_abort_the_loop() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedReply::Tools {
                content: None,
                invocations: vec![ToolInvocation {
                    id: "call_x".to_string(),
                    name: "book_meeting".to_string(),
                    arguments: json!({}),
                }],
            },
            ScriptedReply::text("Listo."),
        ]));

        let outcome =
            orchestrator(llm.clone(), Arc::default(), 5).run("sistema", &[], "x").await.expect("run");

        assert_eq!(outcome, OrchestratorOutcome::Answered("Listo.".to_string()));
        assert_eq!(llm.requests()[1].messages[3].content.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn endless_tool_requests_exhaust_the_round_cap() {
        let replies = (0..10)
            .map(|_| ScriptedReply::tool_call("record_unknown_question", json!({"question": "?"})))
            .collect();
        let llm = Arc::new(ScriptedLlm::new(replies));

        let outcome =
            orchestrator(llm.clone(), Arc::default(), 3).run("sistema", &[], "x").await.expect("run");

        assert_eq!(outcome, OrchestratorOutcome::Exhausted { rounds: 3 });
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn model_failure_is_returned_to_the_caller() {
        let llm = Arc::new(ScriptedLlm::failing());
        let result = orchestrator(llm, Arc::default(), 5).run("sistema", &[], "x").await;
        assert!(result.is_err());
    }
}
