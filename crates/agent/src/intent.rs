//! Deterministic detection of contact intent in visitor messages.
//!
//! Patterns are evaluated in a fixed order and the first match wins:
//! confirmation, structured `Email:/Mensaje:` block, inline `address text`, an address
//! with body text on adjacent lines, and finally the contact trigger phrases.

use regex::Regex;

const CONFIRMATION_WORDS: &[&str] = &["sí", "si", "ok", "confirmar", "enviar"];

const AFFIRMATIVE_WORDS: &[&str] = &[
    "sí",
    "si",
    "ok",
    "okay",
    "vale",
    "claro",
    "dale",
    "genial",
    "perfecto",
    "de acuerdo",
    "por supuesto",
    "sí, claro",
    "si, claro",
    "sí por favor",
    "si por favor",
];

const CONTACT_TRIGGERS: &[&str] = &[
    "quiero enviarte un mail",
    "enviarte un mail",
    "escribirte",
    "mandarte un correo",
    "tengo una propuesta",
    "puedo escribirte",
    "contactarte",
    "enviar email",
    "enviar correo",
];

const ADDRESS_PATTERN: &str = r"[^\s@]+@[^\s@]+";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactIntent {
    Confirmation,
    StructuredEmailMessage { address: String, body: String },
    InlineEmailMessage { address: String, body: String },
    /// Address on one line, body on the lines after it (or before it when it is last).
    AdjacentEmailMessage { address: String, body: String },
    EmailOnly { address: String },
    ContactTrigger,
    NoMatch,
}

#[derive(Clone, Debug)]
pub struct IntentMatcher {
    structured: Regex,
    inline: Regex,
    address: Regex,
    message_label: Regex,
}

impl IntentMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            structured: Regex::new(&format!(
                r"(?is)(?:e-?mail|correo)\s*:\s*({ADDRESS_PATTERN}).*?(?:mensaje|message)\s*:(.*)"
            ))?,
            inline: Regex::new(&format!(r"^({ADDRESS_PATTERN})\s+(\S.*)$"))?,
            address: Regex::new(ADDRESS_PATTERN)?,
            message_label: Regex::new(r"(?i)^\s*(?:mensaje|message)\s*:")?,
        })
    }

    /// Classifies `message`. Confirmation is only reported while a message is pending.
    pub fn classify(&self, message: &str, has_pending_message: bool) -> ContactIntent {
        if has_pending_message && is_confirmation(message) {
            return ContactIntent::Confirmation;
        }

        if let Some(intent) = self.match_structured(message) {
            return intent;
        }

        if let Some((address, body)) = self.match_inline(message) {
            return ContactIntent::InlineEmailMessage { address, body };
        }

        if let Some(intent) = self.match_adjacent(message) {
            return intent;
        }

        if is_contact_trigger(message) {
            return ContactIntent::ContactTrigger;
        }

        ContactIntent::NoMatch
    }

    pub fn contains_address(&self, text: &str) -> bool {
        self.address.is_match(text)
    }

    /// Both labels present but nothing after the message label still needs a body.
    fn match_structured(&self, message: &str) -> Option<ContactIntent> {
        let captures = self.structured.captures(message)?;
        let address = clean_address(captures.get(1)?.as_str());
        if address.is_empty() {
            return None;
        }

        let body = captures.get(2).map_or("", |body| body.as_str()).trim();
        if body.is_empty() {
            Some(ContactIntent::EmailOnly { address })
        } else {
            Some(ContactIntent::StructuredEmailMessage { address, body: body.to_string() })
        }
    }

    fn match_inline(&self, message: &str) -> Option<(String, String)> {
        let trimmed = message.trim();
        if trimmed.contains('\n') {
            return None;
        }

        let captures = self.inline.captures(trimmed)?;
        let address = clean_address(captures.get(1)?.as_str());
        let body = captures.get(2)?.as_str().trim();
        if address.is_empty() || body.is_empty() {
            return None;
        }
        Some((address, body.to_string()))
    }

    fn match_adjacent(&self, message: &str) -> Option<ContactIntent> {
        let lines = message.lines().collect::<Vec<_>>();
        let (index, found) = lines
            .iter()
            .enumerate()
            .find_map(|(index, line)| self.address.find(line).map(|found| (index, found)))?;

        let address = clean_address(found.as_str());
        if address.is_empty() {
            return None;
        }

        let body_lines = if index + 1 < lines.len() { &lines[index + 1..] } else { &lines[..index] };
        let joined = body_lines.join("\n");
        let body = self.message_label.replace(&joined, "").trim().to_string();

        if body.is_empty() {
            Some(ContactIntent::EmailOnly { address })
        } else {
            Some(ContactIntent::AdjacentEmailMessage { address, body })
        }
    }
}

pub fn is_confirmation(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    CONFIRMATION_WORDS.contains(&normalized.as_str())
}

/// A short yes-style acknowledgement, ignoring trailing punctuation.
pub fn is_affirmative(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    let normalized =
        normalized.trim_start_matches('¡').trim_end_matches(['!', '.', '?']).trim();
    AFFIRMATIVE_WORDS.contains(&normalized)
}

pub fn is_contact_trigger(message: &str) -> bool {
    let normalized = message.to_lowercase();
    CONTACT_TRIGGERS.iter().any(|trigger| normalized.contains(trigger))
}

fn clean_address(raw: &str) -> String {
    raw.trim_start_matches(['<', '(', '"', '\''])
        .trim_end_matches([',', '.', ';', ':', ')', '>', '"', '\'', '!', '?'])
        .to_string()
}
