use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub llm: LlmConfig,
    pub data: DataConfig,
    pub mail: MailConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub owner_name: String,
    pub max_response_length: usize,
    pub suggestion_reset_interval: u64,
    pub max_tool_rounds: u32,
    pub delegated_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DataConfig {
    pub leads_file: PathBuf,
    pub unknown_questions_file: PathBuf,
    pub summary_file: PathBuf,
    pub linkedin_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub outbox_file: Option<PathBuf>,
    pub subject_prefix: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_email: Option<String>,
    pub smtp_password: Option<SecretString>,
}

/// Complete SMTP relay settings. The account address is both sender and recipient.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub password: SecretString,
}

impl MailConfig {
    /// `None` unless host, account and password are all present.
    pub fn smtp(&self) -> Option<SmtpConfig> {
        Some(SmtpConfig {
            host: self.smtp_host.clone()?,
            port: self.smtp_port,
            email: self.smtp_email.clone()?,
            password: self.smtp_password.clone()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Chat-completions compatible backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub mail_outbox_file: Option<PathBuf>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";
pub const NESTED_CONFIG_FILE: &str = "config/folio.toml";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assistant: AssistantConfig {
                owner_name: "Diego Arnanz Lozano".to_string(),
                max_response_length: 150,
                suggestion_reset_interval: 5,
                max_tool_rounds: 5,
                delegated_timeout_secs: 10,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
                timeout_secs: 60,
            },
            data: DataConfig {
                leads_file: PathBuf::from("data/leads.txt"),
                unknown_questions_file: PathBuf::from("data/unknown_questions.txt"),
                summary_file: PathBuf::from("data/me/summary.txt"),
                linkedin_file: PathBuf::from("data/me/linkedin.txt"),
            },
            mail: MailConfig {
                outbox_file: None,
                subject_prefix: "[Asistente Web]".to_string(),
                smtp_host: None,
                smtp_port: 587,
                smtp_email: None,
                smtp_password: None,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(assistant) = patch.assistant {
            if let Some(owner_name) = assistant.owner_name {
                self.assistant.owner_name = owner_name;
            }
            if let Some(max_response_length) = assistant.max_response_length {
                self.assistant.max_response_length = max_response_length;
            }
            if let Some(suggestion_reset_interval) = assistant.suggestion_reset_interval {
                self.assistant.suggestion_reset_interval = suggestion_reset_interval;
            }
            if let Some(max_tool_rounds) = assistant.max_tool_rounds {
                self.assistant.max_tool_rounds = max_tool_rounds;
            }
            if let Some(delegated_timeout_secs) = assistant.delegated_timeout_secs {
                self.assistant.delegated_timeout_secs = delegated_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(data) = patch.data {
            if let Some(leads_file) = data.leads_file {
                self.data.leads_file = leads_file;
            }
            if let Some(unknown_questions_file) = data.unknown_questions_file {
                self.data.unknown_questions_file = unknown_questions_file;
            }
            if let Some(summary_file) = data.summary_file {
                self.data.summary_file = summary_file;
            }
            if let Some(linkedin_file) = data.linkedin_file {
                self.data.linkedin_file = linkedin_file;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(outbox_file) = mail.outbox_file {
                self.mail.outbox_file = Some(outbox_file);
            }
            if let Some(subject_prefix) = mail.subject_prefix {
                self.mail.subject_prefix = subject_prefix;
            }
            if let Some(smtp_host) = mail.smtp_host {
                self.mail.smtp_host = Some(smtp_host);
            }
            if let Some(smtp_port) = mail.smtp_port {
                self.mail.smtp_port = smtp_port;
            }
            if let Some(smtp_email) = mail.smtp_email {
                self.mail.smtp_email = Some(smtp_email);
            }
            if let Some(smtp_password) = mail.smtp_password {
                self.mail.smtp_password = Some(secret_value(smtp_password));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FOLIO_ASSISTANT_OWNER_NAME") {
            self.assistant.owner_name = value;
        }
        if let Some(value) = read_env("FOLIO_ASSISTANT_MAX_RESPONSE_LENGTH") {
            self.assistant.max_response_length =
                parse_usize("FOLIO_ASSISTANT_MAX_RESPONSE_LENGTH", &value)?;
        }
        if let Some(value) = read_env("FOLIO_ASSISTANT_SUGGESTION_RESET_INTERVAL") {
            self.assistant.suggestion_reset_interval =
                parse_u64("FOLIO_ASSISTANT_SUGGESTION_RESET_INTERVAL", &value)?;
        }
        if let Some(value) = read_env("FOLIO_ASSISTANT_MAX_TOOL_ROUNDS") {
            self.assistant.max_tool_rounds = parse_u32("FOLIO_ASSISTANT_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("FOLIO_ASSISTANT_DELEGATED_TIMEOUT_SECS") {
            self.assistant.delegated_timeout_secs =
                parse_u64("FOLIO_ASSISTANT_DELEGATED_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FOLIO_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("FOLIO_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FOLIO_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("FOLIO_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("FOLIO_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("FOLIO_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FOLIO_DATA_LEADS_FILE") {
            self.data.leads_file = PathBuf::from(value);
        }
        if let Some(value) = read_env("FOLIO_DATA_UNKNOWN_QUESTIONS_FILE") {
            self.data.unknown_questions_file = PathBuf::from(value);
        }
        if let Some(value) = read_env("FOLIO_DATA_SUMMARY_FILE") {
            self.data.summary_file = PathBuf::from(value);
        }
        if let Some(value) = read_env("FOLIO_DATA_LINKEDIN_FILE") {
            self.data.linkedin_file = PathBuf::from(value);
        }

        if let Some(value) = read_env("FOLIO_MAIL_OUTBOX_FILE") {
            self.mail.outbox_file = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("FOLIO_MAIL_SUBJECT_PREFIX") {
            self.mail.subject_prefix = value;
        }
        if let Some(value) = read_env("FOLIO_MAIL_SMTP_HOST").or_else(|| read_env("SMTP_HOST")) {
            self.mail.smtp_host = Some(value);
        }
        let smtp_port = read_env("FOLIO_MAIL_SMTP_PORT")
            .map(|value| ("FOLIO_MAIL_SMTP_PORT", value))
            .or_else(|| read_env("SMTP_PORT").map(|value| ("SMTP_PORT", value)));
        if let Some((key, value)) = smtp_port {
            self.mail.smtp_port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("FOLIO_MAIL_SMTP_EMAIL").or_else(|| read_env("SMTP_EMAIL")) {
            self.mail.smtp_email = Some(value);
        }
        let smtp_password =
            read_env("FOLIO_MAIL_SMTP_PASSWORD").or_else(|| read_env("SMTP_PASSWORD"));
        if let Some(value) = smtp_password {
            self.mail.smtp_password = Some(secret_value(value));
        }

        if let Some(value) = read_env("FOLIO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FOLIO_SERVER_PORT") {
            self.server.port = parse_u16("FOLIO_SERVER_PORT", &value)?;
        }

        let log_level = read_env("FOLIO_LOGGING_LEVEL").or_else(|| read_env("FOLIO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("FOLIO_LOGGING_FORMAT").or_else(|| read_env("FOLIO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(outbox_file) = overrides.mail_outbox_file {
            self.mail.outbox_file = Some(outbox_file);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_assistant(&self.assistant)?;
        validate_llm(&self.llm)?;
        validate_mail(&self.mail)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read for `explicit_path`, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.owner_name.trim().is_empty() {
        return Err(ConfigError::Validation("assistant.owner_name must not be empty".to_string()));
    }

    if assistant.max_response_length < 20 {
        return Err(ConfigError::Validation(
            "assistant.max_response_length must be at least 20 characters".to_string(),
        ));
    }

    if assistant.suggestion_reset_interval == 0 {
        return Err(ConfigError::Validation(
            "assistant.suggestion_reset_interval must be greater than zero".to_string(),
        ));
    }

    if assistant.max_tool_rounds == 0 || assistant.max_tool_rounds > 20 {
        return Err(ConfigError::Validation(
            "assistant.max_tool_rounds must be in range 1..=20".to_string(),
        ));
    }

    if assistant.delegated_timeout_secs == 0 || assistant.delegated_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "assistant.delegated_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let base_url = llm.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider (set FOLIO_LLM_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if let Some(outbox_file) = &mail.outbox_file {
        if outbox_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "mail.outbox_file must not be empty when set".to_string(),
            ));
        }
    }

    let smtp_fields = [
        mail.smtp_host.is_some(),
        mail.smtp_email.is_some(),
        mail.smtp_password.as_ref().is_some_and(|value| !value.expose_secret().trim().is_empty()),
    ];
    let configured = smtp_fields.iter().filter(|set| **set).count();
    if configured != 0 && configured != smtp_fields.len() {
        return Err(ConfigError::Validation(
            "mail.smtp_host, mail.smtp_email and mail.smtp_password must be set together"
                .to_string(),
        ));
    }
    if mail.smtp_port == 0 {
        return Err(ConfigError::Validation("mail.smtp_port must be greater than zero".to_string()));
    }
    if let Some(email) = &mail.smtp_email {
        if !email.contains('@') {
            return Err(ConfigError::Validation(
                "mail.smtp_email must be an email address".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    assistant: Option<AssistantPatch>,
    llm: Option<LlmPatch>,
    data: Option<DataPatch>,
    mail: Option<MailPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    owner_name: Option<String>,
    max_response_length: Option<usize>,
    suggestion_reset_interval: Option<u64>,
    max_tool_rounds: Option<u32>,
    delegated_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DataPatch {
    leads_file: Option<PathBuf>,
    unknown_questions_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    linkedin_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    outbox_file: Option<PathBuf>,
    subject_prefix: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_email: Option<String>,
    smtp_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
