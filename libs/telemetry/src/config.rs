use std::env;

/// Log output layout for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub log_format: LogFormat,
    pub default_filter: String,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, default_service_version: &str) -> Self {
        Self::from_lookup(default_service_name, default_service_version, |key| {
            env::var(key).ok()
        })
    }

    /// Same as [`TelemetryConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(
        default_service_name: &str,
        default_service_version: &str,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name =
            lookup("OTEL_SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let service_version = lookup("OTEL_SERVICE_VERSION")
            .unwrap_or_else(|| default_service_version.to_string());
        let environment = lookup("OTEL_RESOURCE_ATTRIBUTES")
            .and_then(parse_environment_from_resource)
            .or_else(|| lookup("DEPLOYMENT_ENV"))
            .unwrap_or_else(|| "dev".into());
        let log_format = match lookup("LOG_FORMAT") {
            Some(value) if matches!(value.to_lowercase().as_str(), "text" | "pretty" | "plain") => {
                LogFormat::Text
            }
            _ => LogFormat::Json,
        };
        let default_filter = lookup("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "info".into());

        Self {
            service_name,
            service_version,
            environment,
            log_format,
            default_filter,
        }
    }
}

fn parse_environment_from_resource(value: String) -> Option<String> {
    value.split(',').find_map(|kv| {
        let (key, val) = kv.split_once('=')?;
        (key.trim() == "deployment.environment").then(|| val.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_json_and_info() {
        let cfg = TelemetryConfig::from_lookup("relay", "0.1.0", lookup(&[]));
        assert_eq!(cfg.service_name, "relay");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.default_filter, "info");
        assert_eq!(cfg.environment, "dev");
    }

    #[test]
    fn text_formats_are_recognised() {
        for value in ["text", "Pretty", "PLAIN"] {
            let cfg = TelemetryConfig::from_lookup("relay", "0.1.0", lookup(&[("LOG_FORMAT", value)]));
            assert_eq!(cfg.log_format, LogFormat::Text, "{value}");
        }
    }

    #[test]
    fn environment_prefers_resource_attributes() {
        let cfg = TelemetryConfig::from_lookup(
            "relay",
            "0.1.0",
            lookup(&[
                ("OTEL_RESOURCE_ATTRIBUTES", "service.team=core, deployment.environment=prod"),
                ("DEPLOYMENT_ENV", "staging"),
            ]),
        );
        assert_eq!(cfg.environment, "prod");
    }
}
