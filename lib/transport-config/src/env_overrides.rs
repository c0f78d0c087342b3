use config::{builder::BuilderState, ConfigBuilder, ConfigError, Value};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

/// Environment variables that take precedence over the configuration file.
#[derive(Envconfig)]
pub struct EnvVarOverrides {
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    #[envconfig(from = "GRAPHIQL_ENABLED")]
    pub graphiql_enabled: Option<bool>,

    #[envconfig(from = "PORT")]
    pub http_port: Option<u64>,
    #[envconfig(from = "HOST")]
    pub http_host: Option<String>,

    #[envconfig(from = "BATCHING_MAX_OPERATIONS")]
    pub batching_max_operations: Option<u64>,
    #[envconfig(from = "MULTIPART_UPLOADS_ENABLED")]
    pub multipart_uploads_enabled: Option<bool>,
    #[envconfig(from = "WEBSOCKET_ENABLED")]
    pub websocket_enabled: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
}

impl EnvVarOverrides {
    /// Configuration keys paired with the values set in the environment.
    fn into_entries(self) -> Vec<(&'static str, Value)> {
        let entries: [(&'static str, Option<Value>); 9] = [
            ("log.level", self.log_level.map(|level| level.as_str().into())),
            ("log.format", self.log_format.map(|format| format.as_str().into())),
            ("log.filter", self.log_filter.map(Value::from)),
            ("graphiql.enabled", self.graphiql_enabled.map(Value::from)),
            ("http.port", self.http_port.map(Value::from)),
            ("http.host", self.http_host.map(Value::from)),
            (
                "batching.max_operations",
                self.batching_max_operations.map(Value::from),
            ),
            ("uploads.enabled", self.multipart_uploads_enabled.map(Value::from)),
            ("websocket.enabled", self.websocket_enabled.map(Value::from)),
        ];

        entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect()
    }

    pub fn apply_overrides<T: BuilderState>(
        self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        for (key, value) in self.into_entries() {
            debug!(key, value = ?value, "configuration overridden from the environment");
            config = config.set_override(key, value)?;
        }

        Ok(config)
    }
}
