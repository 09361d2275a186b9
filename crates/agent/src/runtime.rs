use std::sync::Arc;
use std::time::Duration;

use folio_core::config::AppConfig;
use folio_core::errors::ApplicationError;
use thiserror::Error;
use tracing::info;

use crate::budget::ResponseBudgeter;
use crate::dialogue::{DialogueController, DialogueSettings};
use crate::intent::IntentMatcher;
use crate::llm::{LlmClient, LlmError};
use crate::mail::{MailError, MailSender, OutboxMailSender, SmtpMailSender, UnconfiguredMailSender};
use crate::openai::OpenAiClient;
use crate::orchestrator::ToolOrchestrator;
use crate::profile::ProfileContext;
use crate::records::{FileRecordAppender, RecordAppender};
use crate::subject::SubjectInferrer;
use crate::tools::{tool_definitions, ToolExecutor};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("model client could not be created: {0}")]
    Llm(#[from] LlmError),
    #[error("contact patterns failed to compile: {0}")]
    Patterns(#[from] regex::Error),
    #[error("mail transport could not be created: {0}")]
    Mail(#[from] MailError),
}

impl From<RuntimeError> for ApplicationError {
    fn from(error: RuntimeError) -> Self {
        ApplicationError::Dependency(error.to_string())
    }
}

/// External collaborators of the dialogue controller.
#[derive(Clone)]
pub struct AgentDependencies {
    pub llm: Arc<dyn LlmClient>,
    pub mail: Arc<dyn MailSender>,
    pub records: Arc<dyn RecordAppender>,
}

impl AgentDependencies {
    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeError> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let records: Arc<dyn RecordAppender> = Arc::new(FileRecordAppender);
        let mail: Arc<dyn MailSender> = match (config.mail.smtp(), &config.mail.outbox_file) {
            (Some(smtp), _) => {
                Arc::new(SmtpMailSender::from_config(&smtp, config.mail.subject_prefix.clone())?)
            }
            (None, Some(path)) => Arc::new(OutboxMailSender::new(
                path.clone(),
                config.mail.subject_prefix.clone(),
                records.clone(),
            )),
            (None, None) => Arc::new(UnconfiguredMailSender),
        };

        Ok(Self { llm, mail, records })
    }
}

pub fn build_controller(
    config: &AppConfig,
    dependencies: AgentDependencies,
    profile: ProfileContext,
) -> Result<DialogueController, RuntimeError> {
    let assistant = &config.assistant;
    let delegated_timeout = Duration::from_secs(assistant.delegated_timeout_secs);

    let subjects = SubjectInferrer::new(dependencies.llm.clone(), delegated_timeout);
    let budgeter = ResponseBudgeter::new(dependencies.llm.clone(), delegated_timeout);
    let executor = ToolExecutor::new(
        dependencies.records,
        config.data.leads_file.clone(),
        config.data.unknown_questions_file.clone(),
    );
    let orchestrator = ToolOrchestrator::new(
        dependencies.llm,
        executor,
        subjects.clone(),
        tool_definitions(&assistant.owner_name),
        assistant.max_tool_rounds,
    );

    info!(
        event_name = "runtime.controller.ready",
        model = %config.llm.model,
        max_tool_rounds = assistant.max_tool_rounds,
        max_response_length = assistant.max_response_length,
        mail_transport = mail_transport(config),
        "dialogue controller assembled"
    );

    Ok(DialogueController::new(
        DialogueSettings::from(assistant),
        IntentMatcher::new()?,
        subjects,
        budgeter,
        orchestrator,
        dependencies.mail,
        profile,
    )
    .with_profile_source(config.data.clone()))
}

fn mail_transport(config: &AppConfig) -> &'static str {
    match (config.mail.smtp().is_some(), config.mail.outbox_file.is_some()) {
        (true, _) => "smtp",
        (false, true) => "outbox",
        (false, false) => "unconfigured",
    }
}

/// Loads profile documents and wires the production collaborators.
pub async fn bootstrap_controller(config: &AppConfig) -> Result<DialogueController, RuntimeError> {
    let dependencies = AgentDependencies::from_config(config)?;
    let profile = ProfileContext::load(config.assistant.owner_name.clone(), &config.data).await;
    build_controller(config, dependencies, profile)
}
