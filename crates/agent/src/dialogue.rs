use std::sync::Arc;

use folio_core::config::{AssistantConfig, DataConfig};
use folio_core::domain::conversation::{ConversationState, OutboundMessage};
use folio_core::domain::turn::ChatTurn;
use tracing::{info, warn};

use crate::budget::ResponseBudgeter;
use crate::intent::{is_affirmative, ContactIntent, IntentMatcher};
use crate::mail::MailSender;
use crate::orchestrator::{OrchestratorOutcome, ToolOrchestrator};
use crate::profile::ProfileContext;
use crate::replies::{
    body_request, confirmation_prompt, send_failure, APOLOGY, FORMAT_PROMPT, SEND_SUCCESS,
};
use crate::subject::SubjectInferrer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialogueSettings {
    pub max_response_length: usize,
    pub suggestion_reset_interval: u64,
}

impl From<&AssistantConfig> for DialogueSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            max_response_length: config.max_response_length,
            suggestion_reset_interval: config.suggestion_reset_interval,
        }
    }
}

/// Which branch of the turn state machine produced the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnKind {
    MessageSent,
    SendFailed,
    FormatReprompted,
    MessageStaged,
    BodyRequested,
    ContactPrompted,
    Answered,
    Apologized,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageSent => "message_sent",
            Self::SendFailed => "send_failed",
            Self::FormatReprompted => "format_reprompted",
            Self::MessageStaged => "message_staged",
            Self::BodyRequested => "body_requested",
            Self::ContactPrompted => "contact_prompted",
            Self::Answered => "answered",
            Self::Apologized => "apologized",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub reply: String,
    pub kind: TurnKind,
}

/// Per-turn entry point. Takes the conversation state by value and hands back the
/// updated state with the reply, so one controller can serve any number of conversations.
#[derive(Clone)]
pub struct DialogueController {
    settings: DialogueSettings,
    matcher: IntentMatcher,
    subjects: SubjectInferrer,
    budgeter: ResponseBudgeter,
    orchestrator: ToolOrchestrator,
    mail: Arc<dyn MailSender>,
    profile: ProfileContext,
    profile_source: Option<DataConfig>,
}

impl DialogueController {
    pub fn new(
        settings: DialogueSettings,
        matcher: IntentMatcher,
        subjects: SubjectInferrer,
        budgeter: ResponseBudgeter,
        orchestrator: ToolOrchestrator,
        mail: Arc<dyn MailSender>,
        profile: ProfileContext,
    ) -> Self {
        Self {
            settings,
            matcher,
            subjects,
            budgeter,
            orchestrator,
            mail,
            profile,
            profile_source: None,
        }
    }

    /// Files that `reload_profile` re-reads.
    pub fn with_profile_source(mut self, data: DataConfig) -> Self {
        self.profile_source = Some(data);
        self
    }

    pub fn settings(&self) -> DialogueSettings {
        self.settings
    }

    pub fn profile(&self) -> &ProfileContext {
        &self.profile
    }

    /// Re-reads the profile documents. Returns false when no file source was attached.
    pub async fn reload_profile(&mut self) -> bool {
        let Some(data) = &self.profile_source else {
            return false;
        };
        self.profile.reload(data).await;
        true
    }

    pub async fn handle_turn(
        &self,
        mut state: ConversationState,
        message: &str,
        history: &[ChatTurn],
    ) -> TurnOutcome {
        let turn = state.advance_turn(self.settings.suggestion_reset_interval);
        let intent = self.matcher.classify(message, state.has_pending_message());

        let (reply, kind) = self.decide(&mut state, intent, message, history).await;

        info!(
            event_name = "dialogue.turn.completed",
            turn,
            kind = kind.as_str(),
            pending = state.has_pending_message(),
            awaiting_body = state.awaiting_body_for().is_some(),
            suggestion_active = state.suggestion_active(),
            reply_chars = reply.chars().count(),
            "dialogue turn completed"
        );

        TurnOutcome { state, reply, kind }
    }

    async fn decide(
        &self,
        state: &mut ConversationState,
        intent: ContactIntent,
        message: &str,
        history: &[ChatTurn],
    ) -> (String, TurnKind) {
        if intent == ContactIntent::Confirmation {
            if let Some(pending) = state.take_pending_message() {
                state.clear_suggestion();
                return self.send(&pending).await;
            }
        }

        if state.suggestion_active() && is_affirmative(message) {
            return (self.fit_plain(FORMAT_PROMPT).await, TurnKind::FormatReprompted);
        }

        if let Some(address) = state.awaiting_body_for().map(str::to_string) {
            if !self.matcher.contains_address(message) {
                let body = message.trim();
                if body.is_empty() {
                    return (body_request(&address), TurnKind::BodyRequested);
                }
                return self.stage(state, address, body.to_string(), history).await;
            }
            info!(event_name = "dialogue.turn.address_superseded", "new address replaces awaited one");
            state.clear_awaiting_body();
        }

        match intent {
            ContactIntent::StructuredEmailMessage { address, body }
            | ContactIntent::InlineEmailMessage { address, body }
            | ContactIntent::AdjacentEmailMessage { address, body } => {
                self.stage(state, address, body, history).await
            }
            ContactIntent::EmailOnly { address } => {
                let reply = body_request(&address);
                state.await_body_for(address);
                (reply, TurnKind::BodyRequested)
            }
            ContactIntent::ContactTrigger => {
                state.mark_suggestion();
                (self.fit_plain(FORMAT_PROMPT).await, TurnKind::ContactPrompted)
            }
            ContactIntent::Confirmation | ContactIntent::NoMatch => {
                self.answer(state, message, history).await
            }
        }
    }

    async fn send(&self, message: &OutboundMessage) -> (String, TurnKind) {
        match self.mail.send(message).await {
            Ok(()) => {
                info!(
                    event_name = "dialogue.turn.message_sent",
                    sender = %message.sender_email,
                    subject = %message.subject,
                    "visitor message sent"
                );
                (SEND_SUCCESS.to_string(), TurnKind::MessageSent)
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.turn.send_failed",
                    error = %error,
                    "visitor message could not be sent"
                );
                let reply: String = send_failure(&error.to_string())
                    .chars()
                    .take(self.settings.max_response_length)
                    .collect();
                (reply, TurnKind::SendFailed)
            }
        }
    }

    async fn stage(
        &self,
        state: &mut ConversationState,
        address: String,
        body: String,
        history: &[ChatTurn],
    ) -> (String, TurnKind) {
        let subject = self.subjects.infer(&body, history).await;
        let message = OutboundMessage { sender_email: address, subject, body };
        let reply = self.fit_plain(&confirmation_prompt(&message)).await;
        state.stage_message(message);
        (reply, TurnKind::MessageStaged)
    }

    async fn answer(
        &self,
        state: &mut ConversationState,
        message: &str,
        history: &[ChatTurn],
    ) -> (String, TurnKind) {
        let system_prompt = self.profile.system_prompt(self.settings.max_response_length);

        match self.orchestrator.run(&system_prompt, history, message).await {
            Ok(OrchestratorOutcome::Answered(text)) => {
                let append_suffix = !state.has_pending_message() && !state.suggestion_active();
                let fitted = self
                    .budgeter
                    .fit(text.trim(), self.settings.max_response_length, append_suffix)
                    .await;
                if fitted.suffix_appended {
                    state.mark_suggestion();
                }
                (fitted.text, TurnKind::Answered)
            }
            Ok(OrchestratorOutcome::AwaitingConfirmation(message)) => {
                let reply = self.fit_plain(&confirmation_prompt(&message)).await;
                state.stage_message(message);
                (reply, TurnKind::MessageStaged)
            }
            Ok(OrchestratorOutcome::Exhausted { rounds }) => {
                warn!(event_name = "dialogue.turn.exhausted", rounds, "tool loop exhausted");
                (self.fit_plain(APOLOGY).await, TurnKind::Apologized)
            }
            Err(error) => {
                warn!(event_name = "dialogue.turn.model_failed", error = %error, "main model call failed");
                (self.fit_plain(APOLOGY).await, TurnKind::Apologized)
            }
        }
    }

    async fn fit_plain(&self, text: &str) -> String {
        self.budgeter.fit(text, self.settings.max_response_length, false).await.text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use folio_core::domain::conversation::{ConversationState, OutboundMessage};
    use folio_core::domain::turn::ChatTurn;
    use serde_json::json;

    use super::{DialogueController, DialogueSettings, TurnKind};
    use crate::budget::{ResponseBudgeter, ELLIPSIS, PROMOTIONAL_SUFFIX};
    use crate::intent::IntentMatcher;
    use crate::profile::{DocumentStatus, ProfileContext, ProfileDocument};
    use crate::orchestrator::ToolOrchestrator;
    use crate::replies::{body_request, APOLOGY, FORMAT_PROMPT, SEND_SUCCESS};
    use crate::subject::SubjectInferrer;
    use crate::testing::{MemoryRecordAppender, RecordingMailSender, ScriptedLlm, ScriptedReply};
    use crate::tools::{tool_definitions, ToolExecutor};

    const MAX_LEN: usize = 150;

    struct Harness {
        controller: DialogueController,
        llm: Arc<ScriptedLlm>,
        mail: Arc<RecordingMailSender>,
    }

    fn harness(replies: Vec<ScriptedReply>) -> Harness {
        harness_with_mail(replies, RecordingMailSender::default())
    }

    fn harness_with_mail(replies: Vec<ScriptedReply>, mail: RecordingMailSender) -> Harness {
        let llm = Arc::new(ScriptedLlm::new(replies));
        let mail = Arc::new(mail);
        let timeout = Duration::from_millis(200);
        let subjects = SubjectInferrer::new(llm.clone(), timeout);
        let executor = ToolExecutor::new(
            Arc::new(MemoryRecordAppender::default()),
            "leads.txt",
            "questions.txt",
        );
        let profile = ProfileContext {
            owner_name: "Diego".to_string(),
            summary: ProfileDocument {
                text: "Ingeniero backend.".to_string(),
                status: DocumentStatus::Loaded,
            },
            linkedin: ProfileDocument {
                text: "Perfil de LinkedIn no disponible".to_string(),
                status: DocumentStatus::Missing,
            },
        };

        let controller = DialogueController::new(
            DialogueSettings { max_response_length: MAX_LEN, suggestion_reset_interval: 5 },
            IntentMatcher::new().expect("patterns"),
            subjects.clone(),
            ResponseBudgeter::new(llm.clone(), timeout),
            ToolOrchestrator::new(llm.clone(), executor, subjects, tool_definitions("Diego"), 5),
            mail.clone(),
            profile,
        );

        Harness { controller, llm, mail }
    }

    fn pending() -> OutboundMessage {
        OutboundMessage {
            sender_email: "juan@x.com".to_string(),
            subject: "Propuesta de colaboración".to_string(),
            body: "Tengo una propuesta de colaboración".to_string(),
        }
    }

    fn state_with_pending() -> ConversationState {
        let mut state = ConversationState::new();
        state.stage_message(pending());
        state
    }

    #[tokio::test]
    async fn contact_trigger_prompts_for_the_format() {
        let harness = harness(vec![]);

        let outcome =
            harness.controller.handle_turn(ConversationState::new(), "quiero enviarte un mail", &[]).await;

        assert_eq!(outcome.reply, FORMAT_PROMPT);
        assert_eq!(outcome.kind, TurnKind::ContactPrompted);
        assert!(outcome.state.suggestion_active());
        assert!(outcome.state.pending_message().is_none());
        assert_eq!(harness.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn bare_address_waits_for_a_body() {
        let harness = harness(vec![]);

        let outcome = harness.controller.handle_turn(ConversationState::new(), "juan@x.com", &[]).await;

        assert_eq!(outcome.state.awaiting_body_for(), Some("juan@x.com"));
        assert_eq!(outcome.reply, body_request("juan@x.com"));
        assert_eq!(outcome.kind, TurnKind::BodyRequested);
    }

    #[tokio::test]
    async fn blank_follow_up_asks_for_the_body_again() {
        let harness = harness(vec![]);
        let mut state = ConversationState::new();
        state.await_body_for("juan@x.com");

        let outcome = harness.controller.handle_turn(state, "   ", &[]).await;

        assert_eq!(outcome.reply, body_request("juan@x.com"));
        assert_eq!(outcome.kind, TurnKind::BodyRequested);
        assert_eq!(outcome.state.awaiting_body_for(), Some("juan@x.com"));
        assert!(outcome.state.pending_message().is_none());
        assert_eq!(harness.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn structured_block_without_message_text_waits_for_a_body() {
        let harness = harness(vec![]);

        let outcome = harness
            .controller
            .handle_turn(ConversationState::new(), "Email: juan@x.com\nMensaje:", &[])
            .await;

        assert_eq!(outcome.kind, TurnKind::BodyRequested);
        assert_eq!(outcome.state.awaiting_body_for(), Some("juan@x.com"));
        assert!(outcome.state.pending_message().is_none());
        assert_eq!(outcome.reply, body_request("juan@x.com"));
        assert!(harness.mail.sent().is_empty());
    }

    #[tokio::test]
    async fn reload_profile_reads_documents_from_the_attached_source() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let data = folio_core::config::DataConfig {
            leads_file: dir.path().join("leads.txt"),
            unknown_questions_file: dir.path().join("questions.txt"),
            summary_file: dir.path().join("summary.txt"),
            linkedin_file: dir.path().join("linkedin.txt"),
        };
        let mut detached = harness(vec![]).controller;
        assert!(!detached.reload_profile().await);

        let mut controller = harness(vec![]).controller.with_profile_source(data);
        std::fs::write(dir.path().join("summary.txt"), "Arquitecto de software.").expect("write");

        assert!(controller.reload_profile().await);
        assert_eq!(controller.profile().summary.text, "Arquitecto de software.");
        assert_eq!(controller.profile().summary.status, DocumentStatus::Loaded);
        assert_eq!(controller.profile().linkedin.status, DocumentStatus::Missing);
        assert_eq!(controller.profile().owner_name, "Diego");
    }

    #[tokio::test]
    async fn follow_up_body_stages_message_with_fallback_subject() {
        let harness = harness(vec![ScriptedReply::Fail]);
        let mut state = ConversationState::new();
        state.await_body_for("juan@x.com");

        let outcome = harness
            .controller
            .handle_turn(state, "Tengo una propuesta de colaboración", &[])
            .await;

        let staged = outcome.state.pending_message().expect("staged message");
        assert_eq!(staged.sender_email, "juan@x.com");
        assert!(staged.subject.contains("colaboración"));
        assert!(outcome.state.awaiting_body_for().is_none());
        assert!(outcome.reply.starts_with("📧 Mensaje listo:\nDe: juan@x.com\n"));
        assert_eq!(outcome.kind, TurnKind::MessageStaged);
    }

    #[tokio::test]
    async fn confirmation_sends_and_clears_state() {
        let harness = harness(vec![]);
        let mut state = state_with_pending();
        state.mark_suggestion();

        let outcome = harness.controller.handle_turn(state, "si", &[]).await;

        assert_eq!(outcome.reply, SEND_SUCCESS);
        assert_eq!(outcome.kind, TurnKind::MessageSent);
        assert!(outcome.state.pending_message().is_none());
        assert!(outcome.state.awaiting_body_for().is_none());
        assert!(!outcome.state.suggestion_active());
        assert_eq!(harness.mail.sent(), vec![pending()]);
    }

    #[tokio::test]
    async fn failed_send_clears_the_slot_and_reports() {
        let harness =
            harness_with_mail(vec![], RecordingMailSender::rejecting("destinatario rechazado"));

        let outcome = harness.controller.handle_turn(state_with_pending(), "Sí", &[]).await;

        assert_eq!(outcome.kind, TurnKind::SendFailed);
        assert!(outcome.reply.starts_with("❌ "));
        assert!(outcome.reply.contains("destinatario rechazado"));
        assert!(outcome.reply.chars().count() <= MAX_LEN);
        assert!(outcome.state.pending_message().is_none());
    }

    #[tokio::test]
    async fn confirmation_word_without_pending_message_is_answered_normally() {
        let harness = harness(vec![ScriptedReply::text("¿En qué te puedo ayudar?")]);

        let outcome = harness.controller.handle_turn(ConversationState::new(), "ok", &[]).await;

        assert_eq!(outcome.kind, TurnKind::Answered);
        assert!(outcome.reply.starts_with("¿En qué te puedo ayudar?"));
        assert!(harness.mail.sent().is_empty());
        assert_eq!(harness.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn overlong_answer_is_truncated_when_compression_fails() {
        let long_answer = "Diego lleva más de diez años construyendo plataformas backend, \
                           ha liderado equipos de ingeniería y ha trabajado con Rust, Go y \
                           Python en sistemas distribuidos de alta disponibilidad para banca \
                           y comercio electrónico.";
        let harness = harness(vec![ScriptedReply::text(long_answer), ScriptedReply::Fail]);
        let mut state = ConversationState::new();
        state.mark_suggestion();

        let outcome = harness.controller.handle_turn(state, "¿Qué experiencia tiene?", &[]).await;

        assert!(outcome.reply.ends_with(ELLIPSIS));
        assert!(outcome.reply.chars().count() <= MAX_LEN);
        assert_eq!(harness.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn structured_message_is_staged_in_one_turn() {
        let harness = harness(vec![ScriptedReply::text("Consulta sobre Rust")]);

        let outcome = harness
            .controller
            .handle_turn(ConversationState::new(), "Email: a@b.com\nMensaje: hola", &[])
            .await;

        let staged = outcome.state.pending_message().expect("staged message");
        assert_eq!(staged.sender_email, "a@b.com");
        assert_eq!(staged.body, "hola");
        assert_eq!(staged.subject, "Consulta sobre Rust");
    }

    #[tokio::test]
    async fn new_address_supersedes_the_awaited_one() {
        let harness = harness(vec![ScriptedReply::Fail]);
        let mut state = ConversationState::new();
        state.await_body_for("viejo@x.com");

        let outcome = harness
            .controller
            .handle_turn(state, "nuevo@x.com quiero hablar de un proyecto", &[])
            .await;

        let staged = outcome.state.pending_message().expect("staged message");
        assert_eq!(staged.sender_email, "nuevo@x.com");
        assert_eq!(staged.body, "quiero hablar de un proyecto");
        assert!(outcome.state.awaiting_body_for().is_none());
    }

    #[tokio::test]
    async fn affirmative_after_suggestion_reprompts_the_format() {
        let harness = harness(vec![]);
        let mut state = ConversationState::new();
        state.mark_suggestion();

        let outcome = harness.controller.handle_turn(state, "¡Vale!", &[]).await;

        assert_eq!(outcome.reply, FORMAT_PROMPT);
        assert_eq!(outcome.kind, TurnKind::FormatReprompted);
        assert!(outcome.state.suggestion_active());
    }

    #[tokio::test]
    async fn suffix_is_suppressed_until_the_reset_interval() {
        let replies = (0..6).map(|turn| ScriptedReply::text(format!("Respuesta {turn}"))).collect();
        let harness = harness(replies);
        let mut state = ConversationState::new();
        let mut suffixed = Vec::new();

        for _ in 0..6 {
            let outcome = harness.controller.handle_turn(state, "Cuéntame algo", &[]).await;
            suffixed.push(outcome.reply.ends_with(PROMOTIONAL_SUFFIX));
            state = outcome.state;
        }

        assert_eq!(suffixed, [true, false, false, false, true, false]);
    }

    #[tokio::test]
    async fn model_tool_request_to_send_mail_stages_instead_of_sending() {
        let harness = harness(vec![ScriptedReply::tool_call(
            "send_email_to_me",
            json!({"sender_email": "ana@x.com", "subject": "Hola", "body": "Me gustaría hablar"}),
        )]);
        let history = vec![ChatTurn::user("hola"), ChatTurn::assistant("¡Hola!")];

        let outcome = harness
            .controller
            .handle_turn(ConversationState::new(), "Mándale un saludo a Diego de mi parte", &history)
            .await;

        assert_eq!(outcome.kind, TurnKind::MessageStaged);
        assert_eq!(outcome.state.pending_message().map(|message| message.subject.as_str()), Some("Hola"));
        assert!(harness.mail.sent().is_empty());
        assert!(!outcome.reply.ends_with(PROMOTIONAL_SUFFIX));
    }

    #[tokio::test]
    async fn model_failure_becomes_an_apology() {
        let harness = harness(vec![ScriptedReply::Fail]);

        let outcome = harness.controller.handle_turn(ConversationState::new(), "¿Quién eres?", &[]).await;

        assert_eq!(outcome.reply, APOLOGY);
        assert_eq!(outcome.kind, TurnKind::Apologized);
        assert!(!outcome.state.suggestion_active());
    }
}
