use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use folio_core::config::SmtpConfig;
use folio_core::domain::conversation::OutboundMessage;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use crate::records::RecordAppender;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Configuración de correo incompleta. Falta el destino de envío.")]
    NotConfigured,
    #[error("Dirección de correo no válida: {0}")]
    InvalidAddress(String),
    #[error("Error de autenticación SMTP: {0}")]
    Authentication(String),
    #[error("Error de destinatario: {0}")]
    Rejected(String),
    #[error("Error al enviar correo: {0}")]
    Delivery(String),
}

/// Relays a confirmed visitor message to the profile owner.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedMail {
    pub subject: String,
    pub reply_to: String,
    pub body: String,
}

impl ComposedMail {
    pub fn compose(message: &OutboundMessage, subject_prefix: &str) -> Self {
        let subject = if subject_prefix.trim().is_empty() {
            message.subject.clone()
        } else {
            format!("{} {}", subject_prefix.trim(), message.subject)
        };

        let body = format!(
            "📧 NUEVO MENSAJE DESDE EL ASISTENTE WEB\n\n\
             👤 Remitente: {sender}\n\
             📝 Asunto: {subject}\n\
             📅 Enviado desde: Asistente Personal\n\n\
             💬 Mensaje:\n{body}\n\n\
             ---\n\
             Para responder, usa Reply-To: {sender}",
            sender = message.sender_email,
            subject = message.subject,
            body = message.body,
        );

        Self { subject, reply_to: message.sender_email.clone(), body }
    }

    pub fn render(&self) -> String {
        format!(
            "Subject: {}\nReply-To: {}\n\n{}\n",
            self.subject, self.reply_to, self.body
        )
    }
}

/// Delivers confirmed messages to the owner's own mailbox through a STARTTLS relay.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    owner: Mailbox,
    subject_prefix: String,
}

impl SmtpMailSender {
    pub fn from_config(
        config: &SmtpConfig,
        subject_prefix: impl Into<String>,
    ) -> Result<Self, MailError> {
        let owner = parse_mailbox(&config.email)?;
        let credentials =
            Credentials::new(config.email.clone(), config.password.expose_secret().to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|error| MailError::Delivery(error.to_string()))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, owner, subject_prefix: subject_prefix.into() })
    }

    /// From and To are the owner; Reply-To is the visitor.
    pub fn build_message(&self, message: &OutboundMessage) -> Result<Message, MailError> {
        let mail = ComposedMail::compose(message, &self.subject_prefix);
        let reply_to = parse_mailbox(&mail.reply_to)?;

        Message::builder()
            .from(self.owner.clone())
            .to(self.owner.clone())
            .reply_to(reply_to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|error| MailError::Delivery(error.to_string()))
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let email = self.build_message(message)?;

        match self.transport.send(email).await {
            Ok(_) => {
                info!(
                    event_name = "mail.smtp.sent",
                    reply_to = %message.sender_email,
                    "visitor message delivered"
                );
                Ok(())
            }
            Err(error) => {
                let code = error.status().map(|code| code.to_string());
                let failure = classify_smtp_failure(code.as_deref(), error.to_string());
                warn!(
                    event_name = "mail.smtp.failed",
                    code = code.as_deref().unwrap_or("none"),
                    error = %failure,
                    "smtp delivery failed"
                );
                Err(failure)
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|error| MailError::InvalidAddress(format!("{address} ({error})")))
}

fn classify_smtp_failure(code: Option<&str>, detail: String) -> MailError {
    match code {
        Some("530" | "534" | "535") => MailError::Authentication(detail),
        Some("550" | "551" | "553") => MailError::Rejected(detail),
        _ => MailError::Delivery(detail),
    }
}

/// Writes composed mail into an outbox file that an external relay drains.
pub struct OutboxMailSender {
    path: PathBuf,
    subject_prefix: String,
    appender: Arc<dyn RecordAppender>,
}

impl OutboxMailSender {
    pub fn new(
        path: impl Into<PathBuf>,
        subject_prefix: impl Into<String>,
        appender: Arc<dyn RecordAppender>,
    ) -> Self {
        Self { path: path.into(), subject_prefix: subject_prefix.into(), appender }
    }
}

#[async_trait]
impl MailSender for OutboxMailSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let mail = ComposedMail::compose(message, &self.subject_prefix);
        self.appender
            .append(&self.path, &mail.render())
            .await
            .map_err(|error| MailError::Delivery(error.to_string()))?;

        info!(
            event_name = "mail.outbox.queued",
            reply_to = %mail.reply_to,
            outbox = %self.path.display(),
            "visitor message queued for delivery"
        );
        Ok(())
    }
}

/// Used when neither SMTP nor an outbox is configured; every send reports the missing configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredMailSender;

#[async_trait]
impl MailSender for UnconfiguredMailSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        warn!(
            event_name = "mail.send.unconfigured",
            reply_to = %message.sender_email,
            "mail delivery requested without smtp or outbox configured"
        );
        Err(MailError::NotConfigured)
    }
}
