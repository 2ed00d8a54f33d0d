use std::fmt;

/// Fan-out trigger: user batches carrying embedded events.
pub const USER_UPDATE: &str = "user:update";
/// The tenant's own configuration changed.
pub const SHIP_UPDATE: &str = "ship:update";

/// Model names renamed before lookup.
const MODEL_RENAMES: &[(&str, &str)] = &[("user_report", "user"), ("users_segment", "segment")];

/// Canonical event name derived from a notification subject.
///
/// ```
/// use shiprelay_core::EventName;
///
/// assert_eq!(EventName::from_subject("user_report:update").as_str(), "user:update");
/// assert_eq!(EventName::from_subject("users_segment:delete").as_str(), "segment:delete");
/// assert_eq!(EventName::from_subject("widget:create").as_str(), "widget:create");
/// assert_eq!(EventName::from_subject("user_report").as_str(), "user");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName(String);

impl EventName {
    pub fn from_subject(subject: &str) -> Self {
        let mut parts = subject.split(':');
        let model = parts.next().unwrap_or_default();
        let action = parts.next();
        let model = MODEL_RENAMES
            .iter()
            .find(|(from, _)| *from == model)
            .map(|(_, to)| *to)
            .unwrap_or(model);
        let name = [Some(model), action]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(":");
        EventName(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_user_update(&self) -> bool {
        self.0 == USER_UPDATE
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
