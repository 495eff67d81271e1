//! Launch-and-forget dispatch: one spawned task per payload.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{HandoffDispatcher, HandoffPayload, post_payload};
use crate::error::HandoffError;

/// Spawns the agent request and returns immediately.
///
/// Nothing awaits the task; its outcome is only logged. Pair with the
/// pipeline's grace period so the request can leave the process.
#[derive(Clone)]
pub struct DetachedDispatcher {
    client: reqwest::Client,
}

impl DetachedDispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HandoffDispatcher for DetachedDispatcher {
    async fn dispatch(&self, agent_url: &str, payload: HandoffPayload) -> Result<(), HandoffError> {
        let client = self.client.clone();
        let url = agent_url.to_string();

        tokio::spawn(async move {
            match post_payload(&client, &url, &payload).await {
                Ok(status) if status.is_success() => {
                    debug!(user_id = %payload.user.id, %status, "Agent accepted handoff");
                }
                Ok(status) => {
                    warn!(user_id = %payload.user.id, %status, "Agent rejected handoff");
                }
                Err(e) => {
                    warn!(user_id = %payload.user.id, error = %e, "Handoff request failed");
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::handoff::agent_endpoint;
    use crate::handoff::test_support::{sample_payload, wait_for_requests};

    #[tokio::test]
    async fn dispatch_returns_before_agent_responds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/agent"))
            .and(body_json(sample_payload()))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = DetachedDispatcher::new(reqwest::Client::new());
        let started = std::time::Instant::now();
        dispatcher
            .dispatch(&agent_endpoint(&server.uri()), sample_payload())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(wait_for_requests(&server, 1).await, 1);
    }

    #[tokio::test]
    async fn unreachable_agent_is_not_an_error() {
        let dispatcher = DetachedDispatcher::new(reqwest::Client::new());
        let result = dispatcher
            .dispatch("http://127.0.0.1:1/api/agent", sample_payload())
            .await;
        assert!(result.is_ok());
    }
}
