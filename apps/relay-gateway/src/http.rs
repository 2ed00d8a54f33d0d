use std::sync::Arc;

use axum::{
    Router, debug_handler,
    extract::{Extension, Request},
    routing::{any, get},
};
use shiprelay_core::{RelayPipeline, RelayResponse};

pub fn build_router(pipeline: Arc<RelayPipeline>) -> Router {
    Router::new()
        .route("/", any(relay))
        .route("/notify", any(relay))
        .route("/healthz", get(healthz))
        .layer(Extension(pipeline))
}

#[debug_handler]
async fn relay(
    Extension(pipeline): Extension<Arc<RelayPipeline>>,
    request: Request,
) -> RelayResponse {
    pipeline.handle(request).await
}

async fn healthz() -> &'static str {
    "ok"
}
