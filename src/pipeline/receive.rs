//! Receive pipeline: authorize a forwarded email and hand it to the agent.
//!
//! Per request: `Received → Parsed → {Rejected | Uninstalled | Authorized}
//! → HandedOff → Responded`, with `PrefetchFailed` when the scheduling API
//! cannot supply context. Nothing is kept between requests.
//!
//! Authorization failures answer 200 with an empty body so the relay learns
//! nothing about which addresses have accounts and does not retry.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::crypto::ApiKeyCipher;
use crate::error::{HandoffError, SubmissionError};
use crate::handoff::{HandoffDispatcher, HandoffPayload, HandoffUser, agent_endpoint};
use crate::inbound::{InboundSubmission, ParsedMessage, parse_message};
use crate::mailer::{Mailer, OutboundEmail, notices};
use crate::scheduling::SchedulingApi;
use crate::store::{Account, AccountStore};

/// Settings the pipeline needs from [`crate::config::GatewayConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub app_id: String,
    pub app_url: String,
    pub api_key: SecretString,
    pub agent_url: Option<String>,
    pub grace_period: Duration,
}

/// Collaborators the pipeline calls out to.
#[derive(Clone)]
pub struct PipelineDeps {
    pub accounts: Arc<dyn AccountStore>,
    pub scheduling: Arc<dyn SchedulingApi>,
    pub mailer: Arc<dyn Mailer>,
    pub dispatcher: Arc<dyn HandoffDispatcher>,
    pub cipher: Arc<ApiKeyCipher>,
}

/// Terminal state of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Malformed submission (400).
    Invalid(String),
    /// Unknown sender or missing signature (silent 200).
    Rejected,
    /// Account found but the companion app is not installed (200 "ok").
    Uninstalled,
    /// Payload dispatched to the agent (200 "ok").
    HandedOff,
    /// Event types or availability could not be fetched (502).
    PrefetchFailed,
    /// Store or key material unavailable (500).
    Internal,
}

impl IntoResponse for ReceiveOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Rejected => StatusCode::OK.into_response(),
            Self::Uninstalled | Self::HandedOff => (StatusCode::OK, "ok").into_response(),
            Self::PrefetchFailed => StatusCode::BAD_GATEWAY.into_response(),
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl From<SubmissionError> for ReceiveOutcome {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::MissingContent => {
                Self::Invalid(SubmissionError::MissingContent.to_string())
            }
            other => Self::Invalid(format!("Invalid submission: {other}")),
        }
    }
}

/// Result of the authorization check.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// Send the rejection notice to `notify` (possibly empty).
    Denied { notify: String },
    /// Account exists but lacks the app credential.
    NotInstalled,
    /// Proceed to prefetch.
    Granted { user_id: String, email: String },
}

/// Decide whether a submission may proceed. Pure; no side effects.
///
/// The signature/account check strictly precedes the installation check.
pub fn authorize(signature: Option<&str>, account: Option<&Account>, app_id: &str) -> Authorization {
    let signed = signature.is_some_and(|s| !s.trim().is_empty());
    let account = match account {
        Some(a) if signed && !a.email.is_empty() => a,
        _ => {
            return Authorization::Denied {
                notify: account.map(|a| a.email.clone()).unwrap_or_default(),
            };
        }
    };

    if !account.has_installed(app_id) {
        return Authorization::NotInstalled;
    }

    Authorization::Granted {
        user_id: account.id.to_string(),
        email: account.email.clone(),
    }
}

/// The inbound email handoff pipeline.
pub struct ReceivePipeline {
    settings: PipelineSettings,
    deps: PipelineDeps,
}

impl ReceivePipeline {
    pub fn new(settings: PipelineSettings, deps: PipelineDeps) -> Self {
        Self { settings, deps }
    }

    /// Run one submission through the pipeline.
    ///
    /// `origin` is the request's own origin, used to reach the agent when
    /// no agent URL is configured.
    pub async fn handle(&self, submission: InboundSubmission, origin: Option<&str>) -> ReceiveOutcome {
        let parsed = match parse_message(&submission.raw_email) {
            Ok(parsed) => parsed,
            Err(e) => {
                info!(sender = %submission.envelope.from, "Rejecting email without text or subject");
                return e.into();
            }
        };
        debug!(sender = %submission.envelope.from, subject = %parsed.subject, "Email parsed");

        let account = match self.deps.accounts.find_by_email(&submission.envelope.from).await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "Account lookup failed");
                return ReceiveOutcome::Internal;
            }
        };

        let (user_id, email) = match authorize(
            submission.signature.as_deref(),
            account.as_ref(),
            &self.settings.app_id,
        ) {
            Authorization::Denied { notify } => {
                info!(sender = %submission.envelope.from, "Sender not authorized");
                self.notify(notices::rejection_notice(&notify, &submission.subject_hint))
                    .await;
                return ReceiveOutcome::Rejected;
            }
            Authorization::NotInstalled => {
                info!(sender = %submission.envelope.from, app_id = %self.settings.app_id, "App not installed");
                self.notify(notices::install_instructions(
                    &submission.envelope.from,
                    &submission.subject_hint,
                    &self.settings.app_url,
                ))
                .await;
                return ReceiveOutcome::Uninstalled;
            }
            Authorization::Granted { user_id, email } => (user_id, email),
        };

        let payload = match self.prefetch(parsed, user_id, email).await {
            Ok(payload) => payload,
            Err(outcome) => return outcome,
        };

        self.hand_off(payload, origin).await;
        ReceiveOutcome::HandedOff
    }

    /// Encrypt the API key and fetch event types and availability concurrently.
    async fn prefetch(
        &self,
        parsed: ParsedMessage,
        user_id: String,
        email: String,
    ) -> Result<HandoffPayload, ReceiveOutcome> {
        let api_key = self.deps.cipher.encrypt(&self.settings.api_key).map_err(|e| {
            error!(error = %e, "Failed to encrypt API key");
            ReceiveOutcome::Internal
        })?;

        // Same-instant window: the agent gets today's working hours and timezone.
        let now = Utc::now();
        let scheduling = &self.deps.scheduling;
        let (event_types, availability) = tokio::try_join!(
            scheduling.fetch_event_types(&api_key, &user_id),
            scheduling.fetch_availability(&api_key, &user_id, now, now),
        )
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "Context prefetch failed");
            ReceiveOutcome::PrefetchFailed
        })?;

        debug!(
            user_id = %user_id,
            event_types = event_types.len(),
            time_zone = %availability.time_zone,
            "Context prefetched"
        );

        Ok(HandoffPayload {
            message: parsed.text,
            subject: parsed.subject,
            user: HandoffUser {
                id: user_id,
                email,
                api_key_hashed: api_key.hash,
                api_key_iv: api_key.init_vector,
                event_types,
                time_zone: availability.time_zone,
                working_hours: availability.working_hours,
            },
        })
    }

    /// Dispatch without awaiting the agent, then wait out the grace period.
    async fn hand_off(&self, payload: HandoffPayload, origin: Option<&str>) {
        let user_id = payload.user.id.clone();
        let result = match self.settings.agent_url.as_deref().or(origin) {
            Some(base) => {
                self.deps
                    .dispatcher
                    .dispatch(&agent_endpoint(base), payload)
                    .await
            }
            None => Err(HandoffError::NoAgentUrl),
        };

        match result {
            Ok(()) => info!(user_id = %user_id, "Handed off to agent"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Handoff dispatch failed"),
        }

        if !self.settings.grace_period.is_zero() {
            tokio::time::sleep(self.settings.grace_period).await;
        }
    }

    /// Best-effort notice delivery; failures are logged only.
    async fn notify(&self, email: OutboundEmail) {
        let to = email.to.clone();
        if let Err(e) = self.deps.mailer.send(email).await {
            warn!(to = %to, error = %e, "Failed to send notice email");
        }
    }
}
