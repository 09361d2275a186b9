use std::env;
use std::fs;
use std::path::Path;

use folio_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, resolve_config_path(None).as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let optional_path = |path: Option<&Path>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<unset>".to_string())
    };
    let llm_api_key = redact_secret(config.llm.api_key.as_ref().map(|key| key.expose_secret()));
    let smtp_password = match &config.mail.smtp_password {
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    };
    let optional_text =
        |value: Option<&String>| value.cloned().unwrap_or_else(|| "<unset>".to_string());

    let fields = [
        ("assistant.owner_name", config.assistant.owner_name.clone(), vec!["FOLIO_ASSISTANT_OWNER_NAME"]),
        (
            "assistant.max_response_length",
            config.assistant.max_response_length.to_string(),
            vec!["FOLIO_ASSISTANT_MAX_RESPONSE_LENGTH"],
        ),
        (
            "assistant.suggestion_reset_interval",
            config.assistant.suggestion_reset_interval.to_string(),
            vec!["FOLIO_ASSISTANT_SUGGESTION_RESET_INTERVAL"],
        ),
        (
            "assistant.max_tool_rounds",
            config.assistant.max_tool_rounds.to_string(),
            vec!["FOLIO_ASSISTANT_MAX_TOOL_ROUNDS"],
        ),
        (
            "assistant.delegated_timeout_secs",
            config.assistant.delegated_timeout_secs.to_string(),
            vec!["FOLIO_ASSISTANT_DELEGATED_TIMEOUT_SECS"],
        ),
        ("llm.provider", config.llm.provider.as_str().to_string(), vec!["FOLIO_LLM_PROVIDER"]),
        ("llm.model", config.llm.model.clone(), vec!["FOLIO_LLM_MODEL"]),
        ("llm.base_url", config.llm.base_url.clone(), vec!["FOLIO_LLM_BASE_URL"]),
        ("llm.api_key", llm_api_key, vec!["FOLIO_LLM_API_KEY", "OPENAI_API_KEY"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), vec!["FOLIO_LLM_TIMEOUT_SECS"]),
        (
            "data.leads_file",
            config.data.leads_file.display().to_string(),
            vec!["FOLIO_DATA_LEADS_FILE"],
        ),
        (
            "data.unknown_questions_file",
            config.data.unknown_questions_file.display().to_string(),
            vec!["FOLIO_DATA_UNKNOWN_QUESTIONS_FILE"],
        ),
        (
            "data.summary_file",
            config.data.summary_file.display().to_string(),
            vec!["FOLIO_DATA_SUMMARY_FILE"],
        ),
        (
            "data.linkedin_file",
            config.data.linkedin_file.display().to_string(),
            vec!["FOLIO_DATA_LINKEDIN_FILE"],
        ),
        (
            "mail.outbox_file",
            optional_path(config.mail.outbox_file.as_deref()),
            vec!["FOLIO_MAIL_OUTBOX_FILE"],
        ),
        ("mail.subject_prefix", config.mail.subject_prefix.clone(), vec!["FOLIO_MAIL_SUBJECT_PREFIX"]),
        (
            "mail.smtp_host",
            optional_text(config.mail.smtp_host.as_ref()),
            vec!["FOLIO_MAIL_SMTP_HOST", "SMTP_HOST"],
        ),
        (
            "mail.smtp_port",
            config.mail.smtp_port.to_string(),
            vec!["FOLIO_MAIL_SMTP_PORT", "SMTP_PORT"],
        ),
        (
            "mail.smtp_email",
            optional_text(config.mail.smtp_email.as_ref()),
            vec!["FOLIO_MAIL_SMTP_EMAIL", "SMTP_EMAIL"],
        ),
        ("mail.smtp_password", smtp_password, vec!["FOLIO_MAIL_SMTP_PASSWORD", "SMTP_PASSWORD"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            vec!["FOLIO_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), vec!["FOLIO_SERVER_PORT"]),
        (
            "logging.level",
            config.logging.level.clone(),
            vec!["FOLIO_LOGGING_LEVEL", "FOLIO_LOG_LEVEL"],
        ),
        (
            "logging.format",
            config.logging.format.as_str().to_string(),
            vec!["FOLIO_LOGGING_FORMAT", "FOLIO_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &fields {
        lines.push(render_line(key, value, source(key, env_keys.as_slice())));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.map(str::trim) else {
        return "<unset>".to_string();
    };
    if secret.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = secret.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
