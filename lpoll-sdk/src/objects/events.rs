use serde::{Deserialize, Serialize};

/// A wake-up hint published on the notification feed.
///
/// The backend publishes one of these whenever it stores a new event for
/// `channel_id`. The relay never forwards it to clients: it only triggers
/// a refetch, so `event_id` and `timestamp` are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub channel_id: String,
    pub event_id: i64,
    pub timestamp: i64,
}

/// An event row as stored and ordered by the backend.
///
/// The payload is passed through to clients untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub event: serde_json::Value,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_parsing() {
        let payload = r#"{"channel_id":"orders:42","event_id":7,"timestamp":1700000000}"#;
        let event: NotificationEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.channel_id, "orders:42");
        assert_eq!(event.event_id, 7);
        assert_eq!(event.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_notification_missing_field_is_rejected() {
        let payload = r#"{"channel_id":"orders:42","timestamp":1700000000}"#;
        assert!(serde_json::from_str::<NotificationEvent>(payload).is_err());
    }
}
