//! Telemetry helpers shared by shiprelay services.
//! Installs the tracing subscriber and exposes small metric recorders over
//! the `metrics` facade.

use anyhow::Result;

mod config;
mod metrics;
mod tracing_init;

pub use config::{LogFormat, TelemetryConfig};
pub use self::metrics::{Labels, record_counter, record_histogram};
pub use tracing_init::init_telemetry;

/// Installs the shared subscriber configured from `RUST_LOG` and `LOG_FORMAT`.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        service_name,
        env!("CARGO_PKG_VERSION"),
    ))
}
