//! reqwest-backed [`SchedulingApi`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Availability, EventType, SchedulingApi};
use crate::crypto::{ApiKeyCipher, EncryptedApiKey};
use crate::error::ApiError;

/// Longest error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Deserialize)]
struct EventTypesResponse {
    event_types: Vec<EventType>,
}

/// Scheduling API client over HTTP.
///
/// The API key arrives encrypted and is decrypted only to build the
/// request; it is never logged (reqwest errors are stripped of their URL).
#[derive(Clone)]
pub struct HttpSchedulingApi {
    client: reqwest::Client,
    base_url: String,
    cipher: Arc<ApiKeyCipher>,
}

impl HttpSchedulingApi {
    pub fn new(client: reqwest::Client, base_url: &str, cipher: Arc<ApiKeyCipher>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cipher,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        api_key: &EncryptedApiKey,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let key = self.cipher.decrypt(api_key)?;

        let response = self
            .client
            .get(self.url(endpoint))
            .query(&[("apiKey", key.expose_secret())])
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                endpoint: endpoint.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        debug!(endpoint, %status, "Scheduling API responded");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.without_url().to_string(),
        })
    }
}

/// Render a timestamp the way the backend expects (`2026-10-19T09:30:00.000Z`).
pub fn format_api_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl SchedulingApi for HttpSchedulingApi {
    async fn fetch_event_types(
        &self,
        api_key: &EncryptedApiKey,
        user_id: &str,
    ) -> Result<Vec<EventType>, ApiError> {
        let response: EventTypesResponse = self
            .get_json("event-types", api_key, &[("userId", user_id.to_string())])
            .await?;
        Ok(response.event_types)
    }

    async fn fetch_availability(
        &self,
        api_key: &EncryptedApiKey,
        user_id: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Result<Availability, ApiError> {
        self.get_json(
            "availability",
            api_key,
            &[
                ("userId", user_id.to_string()),
                ("dateFrom", format_api_date(date_from)),
                ("dateTo", format_api_date(date_to)),
            ],
        )
        .await
    }
}
