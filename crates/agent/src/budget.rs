use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::llm::{complete_text, LlmClient};

pub const PROMOTIONAL_SUFFIX: &str = "\n\n💬 También puedes escribirme por email si prefieres.";
pub const ELLIPSIS: &str = "...";

const BOUNDARY_FLOOR: f64 = 0.8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FittedResponse {
    pub text: String,
    pub suffix_appended: bool,
}

/// Keeps assistant-visible text within a character budget, asking the model to compress
/// overlong replies and truncating when that fails.
#[derive(Clone)]
pub struct ResponseBudgeter {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl ResponseBudgeter {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn fit(&self, text: &str, max_len: usize, append_suffix: bool) -> FittedResponse {
        let suffix_len = char_len(PROMOTIONAL_SUFFIX);
        let with_suffix = append_suffix && suffix_len < max_len;
        let budget = if with_suffix { max_len - suffix_len } else { max_len };

        let body = if char_len(text) <= budget {
            text.to_string()
        } else {
            match self.compress(text, budget).await {
                Some(compressed) => compressed,
                None => truncate_at_boundary(text, budget),
            }
        };

        if with_suffix {
            FittedResponse { text: format!("{body}{PROMOTIONAL_SUFFIX}"), suffix_appended: true }
        } else {
            FittedResponse { text: body, suffix_appended: false }
        }
    }

    async fn compress(&self, text: &str, budget: usize) -> Option<String> {
        let prompt = format!(
            "Reescribe el siguiente texto para que ocupe como máximo {budget} caracteres. \
             Conserva el tono persuasivo y la idea principal, y termina con una frase \
             completa. Responde solo con el texto reescrito.\n\nTexto:\n{text}"
        );

        match complete_text(self.llm.as_ref(), prompt, self.timeout).await {
            Ok(candidate) => {
                let candidate = candidate.trim();
                let length = char_len(candidate);
                if length > 0 && length <= budget {
                    debug!(event_name = "budget.compressed", budget, length, "reply compressed");
                    Some(candidate.to_string())
                } else {
                    warn!(
                        event_name = "budget.compression_rejected",
                        budget,
                        length,
                        "compressed reply still exceeds budget"
                    );
                    None
                }
            }
            Err(error) => {
                warn!(
                    event_name = "budget.compression_failed",
                    budget,
                    error = %error,
                    "reply compression failed, truncating"
                );
                None
            }
        }
    }
}

/// Cuts `text` to at most `budget` characters, ending with [`ELLIPSIS`]. Prefers the last
/// whitespace boundary when it keeps at least 80% of the budget.
pub fn truncate_at_boundary(text: &str, budget: usize) -> String {
    if char_len(text) <= budget {
        return text.to_string();
    }
    let ellipsis_len = char_len(ELLIPSIS);
    if budget <= ellipsis_len {
        return text.chars().take(budget).collect();
    }

    let chars: Vec<char> = text.chars().collect();
    let floor = (budget as f64 * BOUNDARY_FLOOR).ceil() as usize;
    let hard_cut = budget - ellipsis_len;
    let boundary = chars[..=hard_cut]
        .iter()
        .rposition(|c| c.is_whitespace())
        .filter(|&position| position >= floor);

    let cut = boundary.unwrap_or(hard_cut);
    let kept: String = chars[..cut].iter().collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
