//! Request-coalescing cache for ship configuration objects.
//!
//! The cache stores the in-flight fetch itself, not its eventual value, so
//! concurrent lookups for one ship id await a single request. There is no
//! expiry: entries leave only through [`ShipCache::invalidate`] or when their
//! fetch fails.
//!
//! Staleness window: a lookup that grabbed an entry just before it was
//! invalidated still completes with that older fetch.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use shiprelay_telemetry::record_counter;
use tracing::{debug, error, warn};

use crate::error::panic_message;
use crate::ship::ApiError;

pub type ShipResult = Result<Arc<Value>, Arc<ApiError>>;

type SharedFetch = Shared<BoxFuture<'static, ShipResult>>;

const FETCH_COUNTER: &str = "shiprelay_ship_fetch_total";

#[derive(Clone, Default)]
pub struct ShipCache {
    entries: Arc<DashMap<String, SharedFetch>>,
}

impl ShipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the entry for `ship_id`; returns whether one existed.
    pub fn invalidate(&self, ship_id: &str) -> bool {
        let removed = self.entries.remove(ship_id).is_some();
        if removed {
            debug!(ship = %ship_id, "ship cache entry invalidated");
        }
        removed
    }

    pub fn contains(&self, ship_id: &str) -> bool {
        self.entries.contains_key(ship_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Joins the cached fetch for `ship_id`, or starts one with `fetch`.
    ///
    /// `fetch` runs only when no entry exists. A failed or panicking fetch is
    /// evicted so the next lookup retries, unless the entry was replaced
    /// meanwhile.
    pub async fn get_or_fetch<F, Fut>(&self, ship_id: &str, fetch: F) -> ShipResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let (pending, started) = match self.entries.entry(ship_id.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let ship = ship_id.to_string();
                let pending = AssertUnwindSafe(fetch())
                    .catch_unwind()
                    .map(move |caught| match caught {
                        Ok(result) => result.map(Arc::new).map_err(Arc::new),
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            error!(ship = %ship, panic = %message, "ship fetch panicked");
                            Err(Arc::new(ApiError::Other(format!(
                                "ship fetch panicked: {message}"
                            ))))
                        }
                    })
                    .boxed()
                    .shared();
                entry.insert(pending.clone());
                (pending, true)
            }
        };

        let outcome = pending.clone().await;
        let label = match (&outcome, started) {
            (Ok(_), true) => "fetched",
            (Ok(_), false) => "shared",
            (Err(_), _) => "failed",
        };
        record_counter(FETCH_COUNTER, 1, &vec![("outcome", label.to_string())]);

        if let Err(err) = &outcome {
            let evicted = self
                .entries
                .remove_if(ship_id, |_, current| current.ptr_eq(&pending))
                .is_some();
            if evicted {
                warn!(ship = %ship_id, error = %err, "ship fetch failed; entry evicted");
            }
        }
        outcome
    }
}
