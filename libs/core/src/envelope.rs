use serde::{Deserialize, Serialize};

/// Delivery kind announced in the envelope's `Type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeType {
    SubscriptionConfirmation,
    Notification,
    Other(String),
}

impl EnvelopeType {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeType::SubscriptionConfirmation => "SubscriptionConfirmation",
            EnvelopeType::Notification => "Notification",
            EnvelopeType::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for EnvelopeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SubscriptionConfirmation" => EnvelopeType::SubscriptionConfirmation,
            "Notification" => EnvelopeType::Notification,
            _ => EnvelopeType::Other(value),
        }
    }
}

impl From<EnvelopeType> for String {
    fn from(value: EnvelopeType) -> Self {
        value.as_str().to_string()
    }
}

/// Raw decoded delivery, before any notification-specific parsing.
///
/// ```
/// use shiprelay_core::{Envelope, EnvelopeType};
///
/// let raw = r#"{"Type":"Notification","MessageId":"m-1","TopicArn":"arn:t","Subject":"ship:update","Message":"{}","Timestamp":"2024-01-01T00:00:00Z"}"#;
/// let env: Envelope = serde_json::from_str(raw).unwrap();
/// assert_eq!(env.kind, EnvelopeType::Notification);
/// assert_eq!(env.subject.as_deref(), Some("ship:update"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    #[serde(rename = "Type")]
    pub kind: EnvelopeType,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub topic_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(
        rename = "SigningCertURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signing_cert_url: Option<String>,
    #[serde(
        rename = "SubscribeURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subscribe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        rename = "UnsubscribeURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unsubscribe_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_subscription_confirmation() {
        let env: Envelope = serde_json::from_value(json!({
            "Type": "SubscriptionConfirmation",
            "MessageId": "m-1",
            "Token": "tok",
            "TopicArn": "arn:aws:sns:us-east-1:123:topic",
            "Message": "You have chosen to subscribe",
            "SubscribeURL": "https://sns.us-east-1.amazonaws.com/?Action=ConfirmSubscription",
            "Timestamp": "2024-01-01T00:00:00.000Z",
            "SignatureVersion": "1",
            "Signature": "c2ln",
            "SigningCertURL": "https://sns.us-east-1.amazonaws.com/cert.pem"
        }))
        .unwrap();
        assert_eq!(env.kind, EnvelopeType::SubscriptionConfirmation);
        assert_eq!(env.token.as_deref(), Some("tok"));
        assert!(env.subscribe_url.unwrap().contains("ConfirmSubscription"));
        assert!(env.subject.is_none());
    }

    #[test]
    fn unknown_types_are_kept_verbatim() {
        let env: Envelope =
            serde_json::from_value(json!({ "Type": "UnsubscribeConfirmation" })).unwrap();
        assert_eq!(
            env.kind,
            EnvelopeType::Other("UnsubscribeConfirmation".into())
        );
        assert_eq!(env.kind.as_str(), "UnsubscribeConfirmation");
    }

    #[test]
    fn type_is_required() {
        assert!(serde_json::from_value::<Envelope>(json!({ "Subject": "x" })).is_err());
    }
}
