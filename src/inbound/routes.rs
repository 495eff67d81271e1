//! HTTP routes for the gateway.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::submission::InboundSubmission;
use crate::pipeline::{ReceiveOutcome, ReceivePipeline};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReceivePipeline>,
}

/// Build the Axum router with the receive and health routes.
pub fn gateway_routes(pipeline: Arc<ReceivePipeline>, max_body_bytes: usize) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/api/receive", post(receive))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mail-handoff"
    }))
}

async fn receive(State(state): State<AppState>, headers: HeaderMap, multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("receive", %request_id);

    async move {
        let submission = match InboundSubmission::from_multipart(multipart).await {
            Ok(submission) => submission,
            Err(e) => {
                tracing::info!(error = %e, "Malformed submission");
                return ReceiveOutcome::from(e).into_response();
            }
        };

        let origin = request_origin(&headers);
        state
            .pipeline
            .handle(submission, origin.as_deref())
            .await
            .into_response()
    }
    .instrument(span)
    .await
}

/// The request's origin (`proto://host`), honouring proxy headers.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = first("x-forwarded-host").or_else(|| first(header::HOST.as_str()))?;
    let proto = first("x-forwarded-proto").unwrap_or("http");
    Some(format!("{proto}://{host}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::crypto::{ApiKeyCipher, EncryptedApiKey};
    use crate::error::{ApiError, HandoffError, MailError, StoreError};
    use crate::handoff::{HandoffDispatcher, HandoffPayload};
    use crate::mailer::{Mailer, OutboundEmail};
    use crate::pipeline::{PipelineDeps, PipelineSettings};
    use crate::scheduling::{Availability, EventType, SchedulingApi};
    use crate::store::{Account, AccountStore};

    struct NoAccounts;

    #[async_trait]
    impl AccountStore for NoAccounts {
        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }
    }

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send(&self, _email: OutboundEmail) -> Result<(), MailError> {
            Ok(())
        }
    }

    struct NoScheduling;

    #[async_trait]
    impl SchedulingApi for NoScheduling {
        async fn fetch_event_types(
            &self,
            _api_key: &EncryptedApiKey,
            _user_id: &str,
        ) -> Result<Vec<EventType>, ApiError> {
            unreachable!("not authorized in route tests")
        }

        async fn fetch_availability(
            &self,
            _api_key: &EncryptedApiKey,
            _user_id: &str,
            _date_from: chrono::DateTime<chrono::Utc>,
            _date_to: chrono::DateTime<chrono::Utc>,
        ) -> Result<Availability, ApiError> {
            unreachable!("not authorized in route tests")
        }
    }

    struct NullDispatcher;

    #[async_trait]
    impl HandoffDispatcher for NullDispatcher {
        async fn dispatch(&self, _url: &str, _payload: HandoffPayload) -> Result<(), HandoffError> {
            Ok(())
        }
    }

    fn app() -> Router {
        let pipeline = ReceivePipeline::new(
            PipelineSettings {
                app_id: "cal-ai".into(),
                app_url: "https://app.example.com".into(),
                api_key: SecretString::from("k".to_string()),
                agent_url: None,
                grace_period: Duration::ZERO,
            },
            PipelineDeps {
                accounts: Arc::new(NoAccounts),
                scheduling: Arc::new(NoScheduling),
                mailer: Arc::new(NullMailer),
                dispatcher: Arc::new(NullDispatcher),
                cipher: Arc::new(
                    ApiKeyCipher::from_hex_key(&SecretString::from("00".repeat(32))).unwrap(),
                ),
            },
        );
        gateway_routes(Arc::new(pipeline), 1024 * 1024)
    }

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(fields: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn receive_request(fields: &[(&str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/receive")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields)))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("mail-handoff"));
    }

    #[tokio::test]
    async fn email_without_subject_is_bad_request() {
        let response = app()
            .oneshot(receive_request(&[
                ("dkim", "pass"),
                ("envelope", r#"{"from":"alice@example.com"}"#),
                ("email", "From: alice@example.com\r\n\r\nbody only"),
                ("subject", ""),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Email missing text or subject");
    }

    #[tokio::test]
    async fn missing_envelope_is_bad_request() {
        let response = app()
            .oneshot(receive_request(&[("email", "Subject: x\r\n\r\ny")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.starts_with("Invalid submission"));
    }

    #[tokio::test]
    async fn unknown_sender_gets_empty_ok() {
        let response = app()
            .oneshot(receive_request(&[
                ("dkim", "pass"),
                ("envelope", r#"{"from":"stranger@example.com"}"#),
                ("email", "Subject: Hello\r\n\r\nBook me in"),
                ("subject", "Hello"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
    }

    #[test]
    fn origin_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        assert_eq!(request_origin(&headers).as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn origin_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.5:8080"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("app.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn origin_missing_without_host() {
        assert!(request_origin(&HeaderMap::new()).is_none());
    }
}
