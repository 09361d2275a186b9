use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::llm::{ToolDefinition, ToolInvocation};
use crate::records::RecordAppender;

pub const RECORD_USER_DETAILS: &str = "record_user_details";
pub const RECORD_UNKNOWN_QUESTION: &str = "record_unknown_question";
pub const SEND_EMAIL_TO_ME: &str = "send_email_to_me";

const NAME_NOT_PROVIDED: &str = "Name not provided";
const NOTES_NOT_PROVIDED: &str = "not provided";

/// Schemas advertised to the model on every main completion.
pub fn tool_definitions(owner_name: &str) -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: RECORD_USER_DETAILS,
            description: "Registra el interés de un usuario que proporciona su email".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "email": {"type": "string", "description": "Correo del usuario"},
                    "name": {"type": "string", "description": "Nombre del usuario"},
                    "notes": {"type": "string", "description": "Notas contextuales"}
                },
                "required": ["email"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: RECORD_UNKNOWN_QUESTION,
            description: "Registra preguntas que el asistente no supo responder".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "La pregunta sin respuesta"}
                },
                "required": ["question"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: SEND_EMAIL_TO_ME,
            description: format!(
                "Permite al usuario enviar un correo a {owner_name}. El asunto se infiere \
                 automáticamente del contexto."
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sender_email": {"type": "string", "description": "Correo del remitente"},
                    "subject": {"type": "string", "description": "Asunto inferido del contexto"},
                    "body": {"type": "string", "description": "Contenido del mensaje"}
                },
                "required": ["sender_email", "body"],
                "additionalProperties": false
            }),
        },
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LeadDetails {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LeadDetails {
    pub fn record_line(&self) -> String {
        format!(
            "{} | {} | {}",
            self.email,
            non_blank(self.name.as_deref()).unwrap_or(NAME_NOT_PROVIDED),
            non_blank(self.notes.as_deref()).unwrap_or(NOTES_NOT_PROVIDED)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EmailDraft {
    pub sender_email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

impl EmailDraft {
    pub fn subject(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }
}

#[derive(Deserialize)]
struct UnknownQuestion {
    question: String,
}

/// One model tool request, decoded against the fixed tool set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    RecordUserDetails(LeadDetails),
    RecordUnknownQuestion(String),
    SendEmailToMe(EmailDraft),
    Unknown(String),
    Malformed { tool: String, reason: String },
}

impl ToolCall {
    pub fn from_invocation(invocation: &ToolInvocation) -> Self {
        let tool = invocation.name.as_str();
        let decoded = match tool {
            RECORD_USER_DETAILS => decode::<LeadDetails>(&invocation.arguments)
                .map(Self::RecordUserDetails),
            RECORD_UNKNOWN_QUESTION => decode::<UnknownQuestion>(&invocation.arguments)
                .map(|arguments| Self::RecordUnknownQuestion(arguments.question)),
            SEND_EMAIL_TO_ME => {
                decode::<EmailDraft>(&invocation.arguments).map(Self::SendEmailToMe)
            }
            other => return Self::Unknown(other.to_string()),
        };

        decoded.unwrap_or_else(|error| Self::Malformed {
            tool: tool.to_string(),
            reason: error.to_string(),
        })
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::RecordUserDetails(_) => RECORD_USER_DETAILS,
            Self::RecordUnknownQuestion(_) => RECORD_UNKNOWN_QUESTION,
            Self::SendEmailToMe(_) => SEND_EMAIL_TO_ME,
            Self::Unknown(tool) | Self::Malformed { tool, .. } => tool.as_str(),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(arguments: &Value) -> Result<T, serde_json::Error> {
    match arguments {
        Value::String(raw) => serde_json::from_str(raw),
        other => T::deserialize(other),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Runs the side-effecting record tools. Failures never abort the turn; they resolve to an
/// empty payload that is handed back to the model.
#[derive(Clone)]
pub struct ToolExecutor {
    records: Arc<dyn RecordAppender>,
    leads_path: PathBuf,
    questions_path: PathBuf,
}

impl ToolExecutor {
    pub fn new(
        records: Arc<dyn RecordAppender>,
        leads_path: impl Into<PathBuf>,
        questions_path: impl Into<PathBuf>,
    ) -> Self {
        Self { records, leads_path: leads_path.into(), questions_path: questions_path.into() }
    }

    pub async fn execute(&self, call: &ToolCall) -> Value {
        match call {
            ToolCall::RecordUserDetails(lead) => {
                let line = lead.record_line();
                info!(event_name = "tools.lead.recorded", email = %lead.email, "lead recorded");
                self.append(RECORD_USER_DETAILS, &self.leads_path, &line).await
            }
            ToolCall::RecordUnknownQuestion(question) => {
                info!(event_name = "tools.question.recorded", "unanswered question recorded");
                self.append(RECORD_UNKNOWN_QUESTION, &self.questions_path, question).await
            }
            ToolCall::SendEmailToMe(_) => json!({"status": "esperando_confirmacion"}),
            ToolCall::Unknown(tool) => {
                warn!(event_name = "tools.unknown", tool = %tool, "model requested unknown tool");
                json!({})
            }
            ToolCall::Malformed { tool, reason } => {
                warn!(
                    event_name = "tools.malformed",
                    tool = %tool,
                    reason = %reason,
                    "model sent malformed tool arguments"
                );
                json!({})
            }
        }
    }

    async fn append(&self, tool: &str, path: &Path, line: &str) -> Value {
        match self.records.append(path, line).await {
            Ok(()) => json!({"recorded": "ok"}),
            Err(error) => {
                warn!(event_name = "tools.record_failed", tool, error = %error, "record append failed");
                json!({})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use serde_json::json;

    use super::{tool_definitions, EmailDraft, ToolCall, ToolExecutor, SEND_EMAIL_TO_ME};
    use crate::testing::{invocation, MemoryRecordAppender};

    fn executor(records: Arc<MemoryRecordAppender>) -> ToolExecutor {
        ToolExecutor::new(records, "data/leads.txt", "data/unknown_questions.txt")
    }

    #[test]
    fn definitions_cover_the_three_tools() {
        let names: Vec<_> = tool_definitions("Diego").iter().map(|tool| tool.name).collect();
        assert_eq!(names, ["record_user_details", "record_unknown_question", "send_email_to_me"]);
        assert!(tool_definitions("Diego")[2].description.contains("Diego"));
    }

    #[test]
    fn send_email_arguments_decode_from_raw_json_strings() {
        let call = ToolCall::from_invocation(&invocation(
            SEND_EMAIL_TO_ME,
            json!(r#"{"sender_email":"ana@x.com","body":"Hola"}"#),
        ));
        assert_eq!(
            call,
            ToolCall::SendEmailToMe(EmailDraft {
                sender_email: "ana@x.com".to_string(),
                subject: None,
                body: "Hola".to_string(),
            })
        );
    }

    #[test]
    fn blank_subject_counts_as_missing() {
        let draft = EmailDraft {
            sender_email: "ana@x.com".to_string(),
            subject: Some("   ".to_string()),
            body: "Hola".to_string(),
        };
        assert_eq!(draft.subject(), None);
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let call = ToolCall::from_invocation(&invocation("record_user_details", json!({"name": "Ana"})));
        assert!(matches!(call, ToolCall::Malformed { ref tool, .. } if tool == "record_user_details"));
    }

    #[tokio::test]
    async fn lead_is_appended_with_defaults() {
        let records = Arc::new(MemoryRecordAppender::default());
        let call = ToolCall::from_invocation(&invocation(
            "record_user_details",
            json!({"email": "ana@x.com"}),
        ));

        let payload = executor(records.clone()).execute(&call).await;

        assert_eq!(payload, json!({"recorded": "ok"}));
        assert_eq!(
            records.records(),
            vec![(
                PathBuf::from("data/leads.txt"),
                "ana@x.com | Name not provided | not provided".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn unknown_question_goes_to_its_own_file() {
        let records = Arc::new(MemoryRecordAppender::default());
        let call = ToolCall::from_invocation(&invocation(
            "record_unknown_question",
            json!({"question": "¿Hablas japonés?"}),
        ));

        executor(records.clone()).execute(&call).await;

        assert_eq!(records.records()[0].0, PathBuf::from("data/unknown_questions.txt"));
        assert_eq!(records.records()[0].1, "¿Hablas japonés?");
    }

    #[tokio::test]
    async fn unknown_and_malformed_calls_resolve_to_empty_payloads() {
        let records = Arc::new(MemoryRecordAppender::default());
        let executor = executor(records.clone());

        let unknown = ToolCall::from_invocation(&invocation("book_meeting", json!({})));
        let malformed = ToolCall::from_invocation(&invocation("record_unknown_question", json!(42)));

        assert_eq!(unknown, ToolCall::Unknown("book_meeting".to_string()));
        assert_eq!(executor.execute(&unknown).await, json!({}));
        assert_eq!(executor.execute(&malformed).await, json!({}));
        assert!(records.records().is_empty());
    }
}
