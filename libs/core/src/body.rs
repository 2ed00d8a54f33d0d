use axum::body::{Body, to_bytes};
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::RelayError;

/// Default upper bound for an envelope body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Drains `body` and decodes it into an [`Envelope`].
///
/// The body is taken by value: it can only be read once.
pub async fn read_envelope(body: Body, limit: usize) -> Result<Envelope, RelayError> {
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|err| RelayError::MalformedBody(format!("failed to read body: {err}")))?;
    decode_envelope(&bytes)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, RelayError> {
    serde_json::from_slice(bytes).map_err(|err| {
        debug!(error = %err, len = bytes.len(), "rejecting undecodable envelope");
        RelayError::MalformedBody(err.to_string())
    })
}
