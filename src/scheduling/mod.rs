//! Scheduling API access: event types and availability for context prefetch.

pub mod client;

pub use client::HttpSchedulingApi;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedApiKey;
use crate::error::ApiError;

/// A bookable event type.
///
/// Only `id` is required. Everything the backend sends is passed through to
/// the agent unchanged; missing or null named fields stay absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Duration in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A working-hours block. Fields beyond the core three are passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub days: Vec<u8>,
    /// Minutes from midnight.
    pub start_time: u32,
    /// Minutes from midnight.
    pub end_time: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Availability snapshot for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    #[serde(default)]
    pub busy: Vec<serde_json::Value>,
    #[serde(default)]
    pub date_ranges: Vec<serde_json::Value>,
    pub time_zone: String,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
}

/// The scheduling backend, keyed by an encrypted API key and a user id.
#[async_trait]
pub trait SchedulingApi: Send + Sync {
    /// List the user's bookable event types.
    async fn fetch_event_types(
        &self,
        api_key: &EncryptedApiKey,
        user_id: &str,
    ) -> Result<Vec<EventType>, ApiError>;

    /// Fetch availability between `date_from` and `date_to`.
    async fn fetch_availability(
        &self,
        api_key: &EncryptedApiKey,
        user_id: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Result<Availability, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_decodes_backend_shape() {
        let json = serde_json::json!({
            "busy": [{"start": "2026-10-19T10:00:00Z", "end": "2026-10-19T11:00:00Z"}],
            "timeZone": "Europe/London",
            "dateRanges": [],
            "workingHours": [
                {"days": [1, 2, 3, 4, 5], "startTime": 540, "endTime": 1020, "userId": 7}
            ]
        });
        let availability: Availability = serde_json::from_value(json).unwrap();
        assert_eq!(availability.time_zone, "Europe/London");
        assert_eq!(availability.busy.len(), 1);
        let hours = &availability.working_hours[0];
        assert_eq!(hours.days, vec![1, 2, 3, 4, 5]);
        assert_eq!(hours.start_time, 540);
        assert_eq!(hours.extra.get("userId"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn working_hours_reserialize_with_passthrough_fields() {
        let json = serde_json::json!({"days": [0], "startTime": 0, "endTime": 60, "userId": 3});
        let hours: WorkingHours = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&hours).unwrap(), json);
    }

    #[test]
    fn event_type_passes_through_extra_fields() {
        let json = serde_json::json!({
            "id": 1, "slug": "30min", "length": 30, "title": "30 Minute Meeting",
            "hidden": false, "locations": [{"type": "integrations:zoom"}]
        });
        let et: EventType = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(et.slug.as_deref(), Some("30min"));
        assert_eq!(et.extra.get("hidden"), Some(&serde_json::json!(false)));
        assert_eq!(serde_json::to_value(&et).unwrap(), json);
    }

    #[test]
    fn event_type_tolerates_missing_and_null_fields() {
        let json = serde_json::json!({"id": 9, "title": null, "length": 45});
        let et: EventType = serde_json::from_value(json).unwrap();
        assert_eq!(et.id, 9);
        assert!(et.title.is_none());
        assert!(et.slug.is_none());
        assert_eq!(et.length, Some(45));
        assert_eq!(
            serde_json::to_value(&et).unwrap(),
            serde_json::json!({"id": 9, "length": 45})
        );
    }
}
