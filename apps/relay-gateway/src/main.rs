use std::sync::Arc;

use anyhow::Result;
use axum::serve;
use shiprelay_gateway::config::GatewayConfig;
use shiprelay_gateway::{build_pipeline, http::build_router};
use shiprelay_telemetry::install as init_telemetry;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry("shiprelay-gateway")?;

    let config = GatewayConfig::from_env()?;
    if !config.relay.enforce_signature {
        warn!("signature enforcement is off; unverifiable deliveries are processed");
    }
    let pipeline = Arc::new(build_pipeline(&config)?);
    let router = build_router(pipeline);
    let listener = TcpListener::bind(config.addr).await?;
    info!("shiprelay-gateway listening on {}", config.addr);

    serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
