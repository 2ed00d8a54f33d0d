use std::sync::Arc;

use shiprelay_core::{
    DispatchContext, EVENT_SUBJECT, HandlerError, HandlerRegistry, Notification, SHIP_UPDATE,
    USER_UPDATE,
};
use tracing::info;

/// Event names the stock binary logs.
pub const LOGGED_EVENTS: &[&str] = &[
    USER_UPDATE,
    SHIP_UPDATE,
    "segment:update",
    "segment:delete",
    EVENT_SUBJECT,
];

async fn log_notification(
    notification: Arc<Notification>,
    ctx: DispatchContext,
) -> Result<(), HandlerError> {
    info!(
        subject = %notification.subject,
        timestamp = %notification.timestamp,
        ship = ctx.tenant.as_ref().map(|t| t.ship.as_str()).unwrap_or(""),
        events = notification.events().len(),
        "notification received"
    );
    Ok(())
}

pub fn register_logging_handlers(registry: &HandlerRegistry) {
    for name in LOGGED_EVENTS {
        registry.on(*name, log_notification);
    }
}
