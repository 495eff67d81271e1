//! Agent handoff: payload shape and the dispatchers that deliver it.
//!
//! Dispatch never blocks on the agent. `Ok(())` from a dispatcher means the
//! payload has left the request path (spawned or queued), not that the agent
//! accepted it.

pub mod detached;
pub mod queue;

pub use detached::DetachedDispatcher;
pub use queue::{QueuedDispatcher, RetryPolicy, spawn_delivery_worker};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::{HandoffConfig, HandoffMode};
use crate::error::HandoffError;
use crate::scheduling::{EventType, WorkingHours};

/// Agent endpoint path, relative to the agent origin.
pub const AGENT_PATH: &str = "/api/agent";

/// Account identity plus prefetched scheduling context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffUser {
    pub id: String,
    pub email: String,
    pub api_key_hashed: String,
    #[serde(rename = "apiKeyIV")]
    pub api_key_iv: String,
    pub event_types: Vec<EventType>,
    pub time_zone: String,
    pub working_hours: Vec<WorkingHours>,
}

/// JSON body posted to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub message: String,
    pub subject: String,
    pub user: HandoffUser,
}

/// Sends handoff payloads to the agent without waiting for it.
#[async_trait]
pub trait HandoffDispatcher: Send + Sync {
    async fn dispatch(&self, agent_url: &str, payload: HandoffPayload) -> Result<(), HandoffError>;
}

/// Full agent URL for an origin such as `https://app.example.com`.
pub fn agent_endpoint(origin: &str) -> String {
    format!("{}{AGENT_PATH}", origin.trim_end_matches('/'))
}

/// POST a payload once, returning the agent's status.
pub(crate) async fn post_payload(
    client: &reqwest::Client,
    url: &str,
    payload: &HandoffPayload,
) -> Result<StatusCode, HandoffError> {
    client
        .post(url)
        .json(payload)
        .send()
        .await
        .map(|response| response.status())
        .map_err(|e| HandoffError::Request(e.to_string()))
}

/// Build the dispatcher selected by `config.mode`.
///
/// Queued mode also returns the delivery worker's handle.
pub fn build_dispatcher(
    config: &HandoffConfig,
    client: reqwest::Client,
) -> (Arc<dyn HandoffDispatcher>, Option<JoinHandle<()>>) {
    match config.mode {
        HandoffMode::Detached => (Arc::new(DetachedDispatcher::new(client)), None),
        HandoffMode::Queued => {
            let (dispatcher, rx) = QueuedDispatcher::channel(config.queue_capacity);
            let policy = RetryPolicy {
                max_attempts: config.max_attempts,
                base_backoff: config.base_backoff,
            };
            let worker = spawn_delivery_worker(rx, client, policy);
            (Arc::new(dispatcher), Some(worker))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_wire_format() {
        let json = serde_json::to_value(test_support::sample_payload()).unwrap();
        assert_eq!(json["message"], "Can we meet tomorrow at 3pm?");
        assert_eq!(json["subject"], "Meeting");
        let user = &json["user"];
        assert_eq!(user["id"], "42");
        assert_eq!(user["apiKeyHashed"], "deadbeef");
        assert_eq!(user["apiKeyIV"], "00112233445566778899aabb");
        assert_eq!(user["timeZone"], "Europe/Berlin");
        assert_eq!(user["eventTypes"][0]["slug"], "30min");
        assert!(user["workingHours"].as_array().unwrap().is_empty());
    }

    #[test]
    fn agent_endpoint_joins_origin() {
        assert_eq!(
            agent_endpoint("https://app.example.com"),
            "https://app.example.com/api/agent"
        );
        assert_eq!(
            agent_endpoint("http://localhost:3000/"),
            "http://localhost:3000/api/agent"
        );
    }
}
