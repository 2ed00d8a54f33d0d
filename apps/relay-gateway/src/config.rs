use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use shiprelay_core::RelayOptions;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub relay: RelayOptions,
    /// Timeout for outbound calls: certificates, handshakes, ship fetches.
    pub http_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = RelayOptions::default();

        let addr = get("RELAY_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .trim()
            .parse::<SocketAddr>()
            .context("invalid RELAY_BIND")?;

        let relay = RelayOptions {
            enforce_signature: get("RELAY_ENFORCE_SIGNATURE")
                .map(|raw| parse_flag("RELAY_ENFORCE_SIGNATURE", &raw))
                .transpose()?
                .unwrap_or(defaults.enforce_signature),
            group_traits: get("RELAY_GROUP_TRAITS")
                .map(|raw| parse_flag("RELAY_GROUP_TRAITS", &raw))
                .transpose()?
                .unwrap_or(defaults.group_traits),
            signing_host_pattern: get("RELAY_SIGNING_HOST_PATTERN")
                .unwrap_or(defaults.signing_host_pattern),
            max_body_bytes: get("RELAY_MAX_BODY_BYTES")
                .map(|raw| raw.trim().parse::<usize>())
                .transpose()
                .context("invalid RELAY_MAX_BODY_BYTES")?
                .unwrap_or(defaults.max_body_bytes),
        };

        let http_timeout = get("RELAY_HTTP_TIMEOUT_SECS")
            .map(|raw| raw.trim().parse::<u64>())
            .transpose()
            .context("invalid RELAY_HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Ok(Self {
            addr,
            relay,
            http_timeout: Duration::from_secs(http_timeout),
        })
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got `{other}`"),
    }
}
