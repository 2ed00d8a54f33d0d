pub mod config;
pub mod handlers;
pub mod http;

use anyhow::{Context, Result};
use shiprelay_core::RelayPipeline;

use crate::config::GatewayConfig;

/// Builds the pipeline with HTTP collaborators bounded by the configured timeout.
pub fn build_pipeline(config: &GatewayConfig) -> Result<RelayPipeline> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("build outbound http client")?;
    let pipeline = RelayPipeline::builder()
        .options(config.relay.clone())
        .http_client(http)
        .build()
        .context("invalid relay options")?;
    handlers::register_logging_handlers(pipeline.registry());
    Ok(pipeline)
}
