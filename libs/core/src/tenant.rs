use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::cache::ShipCache;
use crate::error::RelayError;
use crate::event_name::SHIP_UPDATE;
use crate::notification::Notification;
use crate::request::QueryParams;
use crate::ship::{ShipApi, ShipClientFactory};

/// Tenant credentials carried on the delivery URL.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub organization: String,
    pub ship: String,
    pub secret: String,
}

impl TenantConfig {
    /// `None` unless `organization`, `ship` and `secret` are all present.
    pub fn from_query(query: &QueryParams) -> Option<Self> {
        Some(Self {
            organization: query.first("organization")?.to_string(),
            ship: query.first("ship")?.to_string(),
            secret: query.first("secret")?.to_string(),
        })
    }
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("organization", &self.organization)
            .field("ship", &self.ship)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolved tenant: credentials, a bound API client and its ship.
#[derive(Clone)]
pub struct TenantContext {
    pub tenant: TenantConfig,
    pub client: Arc<dyn ShipApi>,
    pub ship: Arc<Value>,
}

pub struct TenantResolver {
    factory: Arc<dyn ShipClientFactory>,
    cache: ShipCache,
}

impl TenantResolver {
    pub fn new(factory: Arc<dyn ShipClientFactory>, cache: ShipCache) -> Self {
        Self { factory, cache }
    }

    pub fn cache(&self) -> &ShipCache {
        &self.cache
    }

    /// Resolves the tenant named by `query`.
    ///
    /// Incomplete credentials skip resolution and yield `Ok(None)`. A
    /// `ship:update` notification drops the cached ship before fetching.
    pub async fn resolve(
        &self,
        query: &QueryParams,
        notification: Option<&Notification>,
    ) -> Result<Option<TenantContext>, RelayError> {
        let Some(tenant) = TenantConfig::from_query(query) else {
            debug!("tenant credentials incomplete; skipping ship resolution");
            return Ok(None);
        };

        let client = self.factory.client_for(&tenant);
        if notification.is_some_and(|n| n.subject == SHIP_UPDATE) {
            info!(ship = %tenant.ship, "ship updated; refreshing cached ship");
            self.cache.invalidate(&tenant.ship);
        }

        let fetcher = client.clone();
        let ship_id = tenant.ship.clone();
        let ship = self
            .cache
            .get_or_fetch(&tenant.ship, move || async move {
                fetcher.fetch_ship(&ship_id).await
            })
            .await
            .map_err(|source| RelayError::TenantResolutionFailed {
                ship: tenant.ship.clone(),
                source,
            })?;

        Ok(Some(TenantContext {
            tenant,
            client,
            ship,
        }))
    }
}
