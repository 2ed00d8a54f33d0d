use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use shiprelay_telemetry::record_counter;
use tracing::{Instrument, debug, error, warn};

use crate::error::RelayError;
use crate::event_name::EventName;
use crate::notification::Notification;
use crate::registry::{HandlerRegistry, SharedHandler};
use crate::request::RequestMeta;
use crate::ship::ShipApi;
use crate::tenant::{TenantConfig, TenantContext};

/// Per-invocation view of the request and its resolved tenant.
#[derive(Clone)]
pub struct DispatchContext {
    pub request: Arc<RequestMeta>,
    pub ship: Option<Arc<Value>>,
    pub tenant: Option<TenantConfig>,
    pub client: Option<Arc<dyn ShipApi>>,
}

impl DispatchContext {
    pub fn new(request: Arc<RequestMeta>, tenant: Option<TenantContext>) -> Self {
        match tenant {
            Some(TenantContext {
                tenant,
                client,
                ship,
            }) => Self {
                request,
                ship: Some(ship),
                tenant: Some(tenant),
                client: Some(client),
            },
            None => Self {
                request,
                ship: None,
                tenant: None,
                client: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub invoked: usize,
}

/// Invokes every handler selected for `name` concurrently and waits for all.
///
/// `user:update` additionally feeds each entry of the message's `events` to
/// every reserved `event` handler. The first failure to complete decides the
/// error; a panicking handler is an internal error.
///
/// Handlers run as detached tasks: dropping the returned future stops the
/// wait, never the handlers themselves.
pub async fn dispatch(
    registry: &HandlerRegistry,
    name: &EventName,
    notification: Arc<Notification>,
    ctx: DispatchContext,
) -> Result<DispatchReport, RelayError> {
    let mut invocations: Vec<(SharedHandler, Arc<Notification>)> = registry
        .handlers_for(name.as_str())
        .into_iter()
        .map(|handler| (handler, notification.clone()))
        .collect();

    if name.is_user_update() && !notification.events().is_empty() {
        let event_handlers = registry.event_handlers();
        for event in notification.events() {
            let per_event = Arc::new(notification.for_event(event));
            for handler in &event_handlers {
                invocations.push((handler.clone(), per_event.clone()));
            }
        }
    }

    let invoked = invocations.len();
    if invoked == 0 {
        debug!(event = %name, "no handlers registered");
        return Ok(DispatchReport { invoked });
    }

    let mut running: FuturesUnordered<_> = invocations
        .into_iter()
        .map(|(handler, notification)| {
            let ctx = ctx.clone();
            tokio::spawn(
                async move { handler.handle(notification, ctx).await }.in_current_span(),
            )
        })
        .collect();
    record_counter(
        "shiprelay_handler_invocations_total",
        invoked as u64,
        &vec![("event", name.to_string())],
    );

    let mut first_failure: Option<RelayError> = None;
    while let Some(joined) = running.next().await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => {
                warn!(event = %name, error = %err, status = %err.status(), "handler failed");
                RelayError::from(err)
            }
            Err(join_err) => {
                error!(event = %name, error = %join_err, "handler panicked");
                RelayError::InternalError(format!("handler aborted: {join_err}"))
            }
        };
        first_failure.get_or_insert(failure);
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(DispatchReport { invoked }),
    }
}
