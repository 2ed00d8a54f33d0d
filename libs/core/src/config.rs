use crate::body::DEFAULT_MAX_BODY_BYTES;
use crate::signature::DEFAULT_SIGNING_HOST_PATTERN;

/// Pipeline behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Reject envelopes whose signature does not verify. When off, a bad
    /// signature is logged and processing continues.
    pub enforce_signature: bool,
    /// Apply trait grouping to the `user` object of notifications.
    pub group_traits: bool,
    /// Regex the signing certificate host must match.
    pub signing_host_pattern: String,
    pub max_body_bytes: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            enforce_signature: false,
            group_traits: true,
            signing_host_pattern: DEFAULT_SIGNING_HOST_PATTERN.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
