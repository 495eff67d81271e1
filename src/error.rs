//! Error types for mail-handoff.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Malformed inbound submissions. These are the only failures the relay
/// ever sees as a non-200 status.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Missing form field: {0}")]
    MissingField(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    #[error("Email missing text or subject")]
    MissingContent,
}

/// Account store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Scheduling API (event types / availability) errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{endpoint}: unauthorized")]
    Unauthorized { endpoint: String },

    #[error("{endpoint}: unexpected status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint}: request failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint}: invalid response body: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("API key unavailable: {0}")]
    Crypto(#[from] CryptoError),
}

/// Outbound notice email errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid {field} address {address:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Agent handoff dispatch errors. Never surfaced to the relay.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("No agent URL: none configured and request carried no host header")]
    NoAgentUrl,

    #[error("Handoff queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("Handoff queue worker has stopped")]
    QueueClosed,

    #[error("Agent request failed: {0}")]
    Request(String),

    #[error("Agent responded with status {0}")]
    Status(u16),
}

/// API key encryption errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Invalid hex encoding in {field}: {reason}")]
    Encoding { field: &'static str, reason: String },
}
