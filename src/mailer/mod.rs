//! Outbound notice emails: the `Mailer` seam plus its SMTP implementation.

pub mod notices;
pub mod smtp;

pub use smtp::SmtpMailer;

use async_trait::async_trait;

use crate::error::MailError;

/// A single outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Recipient. May be empty when no address is known; the mailer decides.
    pub to: String,
    pub subject: String,
    pub text: String,
    /// Optional HTML alternative to `text`.
    pub html: Option<String>,
}

/// Sends outbound emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}
