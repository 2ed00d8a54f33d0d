use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use shiprelay_telemetry::record_counter;
use tracing::{info, warn};

use crate::error::RelayError;

/// Called with every pipeline error before the response is built.
pub type ErrorObserver = Arc<dyn Fn(&RelayError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Dispatched { invoked: usize },
    Subscribed,
}

/// Plain-text reply sent back to the delivery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RelayResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

pub fn translate(
    result: Result<RelayOutcome, RelayError>,
    observer: Option<&ErrorObserver>,
) -> RelayResponse {
    match result {
        Ok(RelayOutcome::Dispatched { invoked }) => {
            info!(invoked, "notification processed");
            RelayResponse::new(StatusCode::OK, "ok")
        }
        Ok(RelayOutcome::Subscribed) => {
            info!("subscription confirmed");
            RelayResponse::new(StatusCode::OK, "subscribed")
        }
        Err(err) => {
            let status = err.status();
            warn!(kind = err.kind(), %status, error = %err, "notification rejected");
            record_counter(
                "shiprelay_errors_total",
                1,
                &vec![("kind", err.kind().to_string())],
            );
            if let Some(observer) = observer {
                observer(&err);
            }
            RelayResponse::new(status, err.to_string())
        }
    }
}
