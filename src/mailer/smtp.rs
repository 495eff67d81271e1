//! SMTP mailer via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::{Mailer, OutboundEmail};
use crate::config::SmtpConfig;
use crate::error::MailError;

/// Sends notices through an SMTP relay.
///
/// lettre's transport is blocking; sends run on the blocking pool.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = parse_mailbox("from", &config.from_address)?;

        let mut builder = SmtpTransport::relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn parse_mailbox(field: &'static str, address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e| MailError::InvalidAddress {
        field,
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

/// Build the MIME message: plain text, or text+HTML alternative.
pub fn build_message(from: Mailbox, email: &OutboundEmail) -> Result<Message, MailError> {
    let builder = Message::builder()
        .from(from)
        .to(parse_mailbox("to", &email.to)?)
        .subject(email.subject.as_str());

    let message = match &email.html {
        Some(html) => {
            builder.multipart(MultiPart::alternative_plain_html(email.text.clone(), html.clone()))
        }
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone()),
    };
    message.map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        let message = build_message(self.from.clone(), &email)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Transport(format!("SMTP send task failed: {e}")))?
            .map_err(|e| MailError::Transport(format!("SMTP send failed: {e}")))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Notice email sent");
        Ok(())
    }
}
