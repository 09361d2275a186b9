pub mod chat;
pub mod config;
pub mod doctor;

use serde::Serialize;

/// Exit code plus the single line of output a command prints.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload =
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            payload.command,
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn failure_payload_carries_error_class() {
        let result = CommandResult::failure("chat", "config_validation", "llm.api_key missing", 2);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert!(!result.is_success());
        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    }

    #[test]
    fn success_payload_omits_error_class_value() {
        let result = CommandResult::success("chat", "conversation ended after 3 turns");
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert!(result.is_success());
        assert_eq!(payload["error_class"], Value::Null);
        assert_eq!(payload["message"], "conversation ended after 3 turns");
    }
}
