//! Send collaborator abstraction.
//!
//! The [`Mailer`] trait decouples the dispatcher from SMTP. Tests use scripted
//! mailers that record messages and fail on demand without touching a network.

use anyhow::{Context, Result, anyhow};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message as Email, SmtpTransport, Transport};
use tracing::{debug, instrument};

use crate::io::config::SmtpConfig;

/// A fully rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Abstraction over delivery backends. An `Err` means the message was not sent.
pub trait Mailer {
    fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Mailer that relays through an SMTP server with STARTTLS and login.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self> {
        cfg.validate_for_send()?;
        let password = cfg.password()?;
        let from: Mailbox = format!("{} <{}>", cfg.from_name, cfg.from_email)
            .parse()
            .with_context(|| format!("parse sender address {}", cfg.from_email))?;
        let transport = SmtpTransport::starttls_relay(&cfg.host)
            .with_context(|| format!("configure SMTP relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), password))
            .build();
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(to = %message.to))]
    fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .with_context(|| format!("parse recipient address {}", message.to))?;
        let email = Email::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .context("build email")?;
        let response = self
            .transport
            .send(&email)
            .map_err(|err| anyhow!("smtp send to {} failed: {err}", message.to))?;
        debug!(code = %response.code(), "smtp accepted message");
        Ok(())
    }
}
