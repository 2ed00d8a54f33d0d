use std::any::Any;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

use crate::ship::ApiError;
use crate::signature::SignatureError;

/// Terminal failure of one pass through the relay pipeline.
///
/// Every variant maps to a transport status via [`RelayError::status`]; the
/// pipeline never retries, redelivery is the sender's job.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid Body: {0}")]
    MalformedBody(String),
    #[error("Invalid Signature: {0}")]
    SignatureInvalid(#[source] SignatureError),
    #[error("Unrecognized Type: {0}")]
    UnrecognizedType(String),
    #[error("Failed to subscribe: {0}")]
    SubscriptionFailed(#[source] anyhow::Error),
    #[error("Invalid Message: {0}")]
    InvalidMessage(String),
    #[error("Failed to resolve ship {ship}: {source}")]
    TenantResolutionFailed {
        ship: String,
        #[source]
        source: Arc<ApiError>,
    },
    #[error("{message}")]
    HandlerFailed {
        message: String,
        status: StatusCode,
    },
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::HandlerFailed { status, .. } => *status,
            RelayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MalformedBody(_) => "malformed_body",
            RelayError::SignatureInvalid(_) => "signature_invalid",
            RelayError::UnrecognizedType(_) => "unrecognized_type",
            RelayError::SubscriptionFailed(_) => "subscription_failed",
            RelayError::InvalidMessage(_) => "invalid_message",
            RelayError::TenantResolutionFailed { .. } => "tenant_resolution_failed",
            RelayError::HandlerFailed { .. } => "handler_failed",
            RelayError::InternalError(_) => "internal_error",
        }
    }
}

/// Error returned by a notification handler.
///
/// Handlers that do not classify their failure get `400 Bad Request`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    status: Option<StatusCode>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::BAD_REQUEST)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::new(format!("{err:#}"))
    }
}

impl From<HandlerError> for RelayError {
    fn from(err: HandlerError) -> Self {
        RelayError::HandlerFailed {
            status: err.status(),
            message: err.message,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_defaults_to_bad_request() {
        let err = HandlerError::new("nope");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let relay: RelayError = err.into();
        assert_eq!(relay.status(), StatusCode::BAD_REQUEST);
        assert_eq!(relay.to_string(), "nope");
        assert_eq!(relay.kind(), "handler_failed");
    }

    #[test]
    fn handler_error_keeps_explicit_status() {
        let err = HandlerError::new("busy").with_status(StatusCode::SERVICE_UNAVAILABLE);
        let relay: RelayError = err.into();
        assert_eq!(relay.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let err = RelayError::InternalError("boom".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            RelayError::MalformedBody("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn panic_payloads_are_readable() {
        let caught = std::panic::catch_unwind::<_, ()>(|| panic!("ship api bug")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "ship api bug");
        let caught = std::panic::catch_unwind::<_, ()>(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "code 7");
    }
}
