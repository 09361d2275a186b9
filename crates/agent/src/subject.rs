use std::sync::Arc;
use std::time::Duration;

use folio_core::domain::turn::{recent_turns, ChatTurn};
use tracing::{debug, warn};

use crate::llm::{complete_text, LlmClient};

pub const MAX_SUBJECT_CHARS: usize = 100;
pub const DEFAULT_SUBJECT: &str = "Nuevo mensaje desde el asistente web";

const CONTEXT_TURNS: usize = 3;
const QUOTE_CHARS: &[char] = &['"', '\'', '`', '“', '”', '«', '»', '‘', '’'];

/// Checked in order; the first keyword found in the context picks the subject.
const KEYWORD_SUBJECTS: &[(&str, &str)] = &[
    ("trabajo", "Consulta sobre oportunidades laborales"),
    ("proyecto", "Propuesta de proyecto"),
    ("colaboración", "Propuesta de colaboración"),
    ("consultoría", "Consulta sobre servicios"),
    ("freelance", "Consulta sobre trabajo freelance"),
    ("contrato", "Consulta sobre contratación"),
    ("propuesta", "Nueva propuesta comercial"),
    ("presupuesto", "Solicitud de presupuesto"),
    ("servicio", "Consulta sobre servicios"),
];

#[derive(Clone)]
pub struct SubjectInferrer {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl SubjectInferrer {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Asks the model for a subject line and falls back to the keyword table on any failure.
    pub async fn infer(&self, body: &str, history: &[ChatTurn]) -> String {
        let context = build_context(body, history);
        let prompt = format!(
            "Genera un asunto breve y profesional (máximo {MAX_SUBJECT_CHARS} caracteres) para \
             un correo con el siguiente contenido. Responde únicamente con el asunto, sin \
             comillas ni explicaciones.\n\nContexto:\n{context}"
        );

        match complete_text(self.llm.as_ref(), prompt, self.timeout).await {
            Ok(raw) => match accept_subject(&raw) {
                Some(subject) => {
                    debug!(event_name = "subject.inferred", source = "model", %subject, "subject inferred");
                    subject
                }
                None => {
                    warn!(
                        event_name = "subject.rejected",
                        length = raw.chars().count(),
                        "model subject rejected, using keyword fallback"
                    );
                    fallback_subject(body, history)
                }
            },
            Err(error) => {
                warn!(
                    event_name = "subject.fallback",
                    error = %error,
                    "subject inference failed, using keyword fallback"
                );
                fallback_subject(body, history)
            }
        }
    }
}

/// Deterministic subject from the keyword table.
pub fn fallback_subject(body: &str, history: &[ChatTurn]) -> String {
    let context = build_context(body, history).to_lowercase();
    KEYWORD_SUBJECTS
        .iter()
        .find(|(keyword, _)| context.contains(keyword))
        .map(|(_, subject)| (*subject).to_string())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string())
}

fn build_context(body: &str, history: &[ChatTurn]) -> String {
    let mut context = body.to_string();
    for turn in recent_turns(history, CONTEXT_TURNS) {
        if turn.content.trim().is_empty() {
            continue;
        }
        context.push('\n');
        context.push_str(&turn.content);
    }
    context
}

/// First line of `raw` without a subject label or quotes, if it is 1..=100 chars.
pub fn accept_subject(raw: &str) -> Option<String> {
    let first_line = raw.trim().lines().next().unwrap_or_default();
    let first_line = first_line
        .trim()
        .strip_prefix("Asunto:")
        .or_else(|| first_line.trim().strip_prefix("Subject:"))
        .unwrap_or(first_line);
    let subject = first_line.trim().trim_matches(QUOTE_CHARS).trim();
    let length = subject.chars().count();
    (length > 0 && length <= MAX_SUBJECT_CHARS).then(|| subject.to_string())
}
