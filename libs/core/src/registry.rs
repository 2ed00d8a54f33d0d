use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::dispatch::DispatchContext;
use crate::error::HandlerError;
use crate::notification::{EVENT_SUBJECT, Notification};

/// Caller-supplied reaction to a notification.
///
/// Any `Fn(Arc<Notification>, DispatchContext) -> impl Future<Output =
/// Result<(), HandlerError>>` closure is a handler.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(
        &self,
        notification: Arc<Notification>,
        ctx: DispatchContext,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> NotificationHandler for F
where
    F: Fn(Arc<Notification>, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        notification: Arc<Notification>,
        ctx: DispatchContext,
    ) -> Result<(), HandlerError> {
        (self)(notification, ctx).await
    }
}

pub type SharedHandler = Arc<dyn NotificationHandler>;

/// Pins a closure to the handler signature so its argument and error types
/// are inferred.
pub fn handler_fn<F, Fut>(f: F) -> F
where
    F: Fn(Arc<Notification>, DispatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    f
}

#[derive(Default)]
struct Handlers {
    named: HashMap<String, Vec<SharedHandler>>,
    event: Vec<SharedHandler>,
}

/// Event name to ordered handler lists, plus the reserved `event` list fed
/// by `user:update` fan-out. Registration only ever adds.
#[derive(Default)]
pub struct HandlerRegistry {
    inner: RwLock<Handlers>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` under `name`; the name `event` targets the reserved list.
    pub fn on(&self, name: impl Into<String>, handler: impl NotificationHandler + 'static) {
        self.on_shared(name, Arc::new(handler));
    }

    pub fn on_shared(&self, name: impl Into<String>, handler: SharedHandler) {
        let name = name.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if name == EVENT_SUBJECT {
            inner.event.push(handler);
        } else {
            inner.named.entry(name).or_default().push(handler);
        }
    }

    pub fn on_event(&self, handler: impl NotificationHandler + 'static) {
        self.on_shared(EVENT_SUBJECT, Arc::new(handler));
    }

    pub fn register_all<I, N>(&self, handlers: I)
    where
        I: IntoIterator<Item = (N, SharedHandler)>,
        N: Into<String>,
    {
        for (name, handler) in handlers {
            self.on_shared(name, handler);
        }
    }

    /// Snapshot of the handlers registered under `name`, in registration order.
    pub fn handlers_for(&self, name: &str) -> Vec<SharedHandler> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.named.get(name).cloned().unwrap_or_default()
    }

    pub fn event_handlers(&self) -> Vec<SharedHandler> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.event.clone()
    }

    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = inner.named.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total number of registered handlers, reserved list included.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.named.values().map(Vec::len).sum::<usize>() + inner.event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
