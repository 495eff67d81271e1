//! Inbound submission: multipart form fields and the parsed email inside them.

use std::collections::HashMap;

use axum::extract::Multipart;
use mail_parser::MessageParser;
use serde::Deserialize;

use crate::error::SubmissionError;

/// Relay metadata that travels alongside the email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

/// A forwarded email as received from the relay.
#[derive(Debug, Clone)]
pub struct InboundSubmission {
    /// DKIM result from the relay. Only its presence is checked.
    pub signature: Option<String>,
    pub envelope: Envelope,
    pub raw_email: Vec<u8>,
    /// Relay-provided subject, used for notice reply subjects.
    pub subject_hint: String,
}

/// Text and subject extracted from the raw email. Both non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub text: String,
    pub subject: String,
}

/// Raw form fields collected from a multipart body.
#[derive(Debug, Default)]
pub struct FormFields {
    fields: HashMap<String, Vec<u8>>,
}

impl FormFields {
    /// Record a field. Later duplicates are ignored, matching first-wins forms.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.fields.entry(name.into()).or_insert_with(|| value.into());
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Validate the collected fields into a submission.
    pub fn into_submission(mut self) -> Result<InboundSubmission, SubmissionError> {
        let envelope_json = self
            .text("envelope")
            .ok_or_else(|| SubmissionError::MissingField("envelope".into()))?;
        let envelope: Envelope = serde_json::from_str(&envelope_json)
            .map_err(|e| SubmissionError::InvalidEnvelope(e.to_string()))?;

        let signature = self.text("dkim").filter(|s| !s.trim().is_empty());
        let subject_hint = self.text("subject").unwrap_or_default();
        let raw_email = self
            .fields
            .remove("email")
            .ok_or_else(|| SubmissionError::MissingField("email".into()))?;

        Ok(InboundSubmission {
            signature,
            envelope,
            raw_email,
            subject_hint,
        })
    }
}

impl InboundSubmission {
    /// Read a submission from a multipart request body.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, SubmissionError> {
        let mut fields = FormFields::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| SubmissionError::Multipart(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let bytes = field
                .bytes()
                .await
                .map_err(|e| SubmissionError::Multipart(e.body_text()))?;
            fields.insert(name, bytes.to_vec());
        }
        fields.into_submission()
    }
}

/// Parse the raw MIME email into text and subject.
///
/// HTML-only emails are converted to text by mail-parser.
pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage, SubmissionError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or(SubmissionError::MissingContent)?;

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SubmissionError::MissingContent)?
        .to_string();

    let text = parsed
        .body_text(0)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(SubmissionError::MissingContent)?;

    Ok(ParsedMessage { text, subject })
}
