use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::tenant::TenantConfig;

const DEFAULT_SCHEME: &str = "https";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("undecodable ship payload from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("{0}")]
    Other(String),
}

/// Outbound API used to read a tenant's configuration object (its "ship").
#[async_trait]
pub trait ShipApi: Send + Sync {
    async fn fetch_ship(&self, ship_id: &str) -> Result<Value, ApiError>;
}

/// Builds a [`ShipApi`] bound to one tenant's credentials.
pub trait ShipClientFactory: Send + Sync {
    fn client_for(&self, tenant: &TenantConfig) -> Arc<dyn ShipApi>;
}

pub struct HttpShipClient {
    http: reqwest::Client,
    tenant: TenantConfig,
    scheme: String,
}

impl HttpShipClient {
    pub fn new(http: reqwest::Client, tenant: TenantConfig) -> Self {
        Self {
            http,
            tenant,
            scheme: DEFAULT_SCHEME.to_string(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    fn ship_url(&self, ship_id: &str) -> String {
        format!(
            "{}://{}/api/v1/{}",
            self.scheme,
            self.tenant.organization.trim_end_matches('/'),
            ship_id
        )
    }
}

#[async_trait]
impl ShipApi for HttpShipClient {
    async fn fetch_ship(&self, ship_id: &str) -> Result<Value, ApiError> {
        let url = self.ship_url(ship_id);
        debug!(%url, "fetching ship");
        let response = self
            .http
            .get(&url)
            .header("Hull-App-Id", self.tenant.ship.as_str())
            .header("Hull-Access-Token", self.tenant.secret.as_str())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { url, status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
            url,
            reason: err.to_string(),
        })
    }
}

/// Hands out [`HttpShipClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpShipClientFactory {
    http: reqwest::Client,
    scheme: String,
}

impl HttpShipClientFactory {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            scheme: DEFAULT_SCHEME.to_string(),
        }
    }

    /// Organizations are reached over https unless overridden here.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

impl ShipClientFactory for HttpShipClientFactory {
    fn client_for(&self, tenant: &TenantConfig) -> Arc<dyn ShipApi> {
        Arc::new(
            HttpShipClient::new(self.http.clone(), tenant.clone()).with_scheme(self.scheme.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_url_targets_organization_host() {
        let client = HttpShipClient::new(
            reqwest::Client::new(),
            TenantConfig {
                organization: "acme.example.io/".into(),
                ship: "5f1".into(),
                secret: "s3cr3t".into(),
            },
        );
        assert_eq!(client.ship_url("5f1"), "https://acme.example.io/api/v1/5f1");
        let plain = client.with_scheme("http");
        assert_eq!(plain.ship_url("5f1"), "http://acme.example.io/api/v1/5f1");
    }
}
