use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::envelope::Envelope;
use crate::error::RelayError;
use crate::traits::TraitGrouping;

/// Subject given to notifications synthesized per embedded event.
pub const EVENT_SUBJECT: &str = "event";

/// Normalized unit handed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub message: Value,
    pub timestamp: OffsetDateTime,
}

impl Notification {
    pub fn user(&self) -> Option<&Value> {
        self.message.get("user")
    }

    /// Entries of the embedded `events` list, empty when absent.
    pub fn events(&self) -> &[Value] {
        self.message
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Builds the notification delivered to `event` handlers for one entry
    /// of [`Notification::events`].
    pub fn for_event(&self, event: &Value) -> Notification {
        let user = self.user().cloned().unwrap_or(Value::Null);
        let segments = self
            .message
            .get("segments")
            .filter(|segments| !segments.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Notification {
            subject: EVENT_SUBJECT.to_string(),
            message: json!({
                "user": user,
                "segments": segments,
                "event": event,
            }),
            timestamp: self.timestamp,
        }
    }
}

/// Decodes the nested `Message` of a notification envelope.
///
/// `grouping` is applied to an embedded `user` object when provided.
pub fn decode_notification(
    envelope: &Envelope,
    grouping: Option<&dyn TraitGrouping>,
) -> Result<Notification, RelayError> {
    let raw = envelope
        .message
        .as_deref()
        .ok_or_else(|| RelayError::InvalidMessage("envelope has no Message".into()))?;
    let mut message: Value =
        serde_json::from_str(raw).map_err(|err| RelayError::InvalidMessage(err.to_string()))?;

    if let Some(grouping) = grouping
        && let Some(user) = message.get_mut("user").filter(|user| user.is_object())
    {
        *user = grouping.group(user.take());
    }

    let timestamp = OffsetDateTime::parse(&envelope.timestamp, &Rfc3339).map_err(|err| {
        RelayError::InvalidMessage(format!(
            "invalid Timestamp `{}`: {err}",
            envelope.timestamp
        ))
    })?;

    Ok(Notification {
        subject: envelope.subject.clone().unwrap_or_default(),
        message,
        timestamp,
    })
}
