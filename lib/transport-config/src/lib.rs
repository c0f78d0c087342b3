pub mod batching;
mod env_overrides;
pub mod graphiql;
pub mod http_server;
pub mod log;
pub mod subscriptions;
pub mod uploads;
pub mod websocket;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    batching::BatchingConfig,
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    graphiql::GraphiQLConfig,
    http_server::HttpServerConfig,
    log::LoggingConfig,
    subscriptions::SubscriptionsConfig,
    uploads::UploadsConfig,
    websocket::WebSocketConfig,
};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// The logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Configuration for the HTTP server/listener and the GraphQL endpoint.
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Configuration for the GraphQL IDE served to browsers.
    #[serde(default)]
    pub graphiql: GraphiQLConfig,

    /// Operation batching. Batched requests are rejected when this is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batching: Option<BatchingConfig>,

    /// File uploads via `multipart/form-data`.
    #[serde(default)]
    pub uploads: UploadsConfig,

    /// GraphQL over WebSocket.
    #[serde(default)]
    pub websocket: WebSocketConfig,

    /// Subscriptions delivered over HTTP.
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
}

impl TransportConfig {
    pub fn graphql_path(&self) -> &str {
        &self.http.graphql_endpoint
    }

    /// JSON schema describing the configuration file.
    pub fn config_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(TransportConfig)).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "transport.config.yaml",
    "transport.config.yml",
    "transport.config.json",
    "transport.config.json5",
];

pub fn load_config(
    override_config_path: Option<String>,
) -> Result<TransportConfig, TransportConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let as_file: File<FileSourceFile, _> = std::path::PathBuf::from(path_str).into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<TransportConfig>()?)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<TransportConfig, TransportConfigError> {
    Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<TransportConfig>()
        .map_err(TransportConfigError::ConfigLoadError)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        graphiql::GraphQLIde,
        log::{LogFormat, LogLevel},
        websocket::WebSocketSubprotocol,
    };

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_yaml_config("").expect("empty config should parse");

        assert_eq!(config.graphql_path(), "/graphql");
        assert_eq!(config.http.address(), "0.0.0.0:4000");
        assert!(config.http.allow_queries_via_get);
        assert!(config.graphiql.enabled);
        assert_eq!(config.graphiql.ide, GraphQLIde::GraphiQL);
        assert!(config.batching.is_none());
        assert!(!config.uploads.enabled);
        assert!(!config.uploads.strict);
        assert!(config.websocket.enabled);
        assert_eq!(
            config.websocket.subprotocols,
            vec![
                WebSocketSubprotocol::GraphQLTransportWs,
                WebSocketSubprotocol::GraphQLWs
            ]
        );
        assert_eq!(
            config.websocket.connection_init_wait_timeout,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.subscriptions.multipart_heartbeat_interval,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn parses_full_config() {
        let raw = r#"
log:
  level: warn
  format: json
  filter: "graphql_transport=trace"
http:
  port: 8080
  graphql_endpoint: /api/graphql
  allow_queries_via_get: false
graphiql:
  ide: apollo-sandbox
batching:
  max_operations: 10
uploads:
  enabled: true
  strict: true
websocket:
  subprotocols: [graphql-ws]
  connection_init_wait_timeout: 3s
subscriptions:
  multipart_heartbeat_interval: 250ms
"#;
        let config = parse_yaml_config(raw).expect("config should parse");

        assert_eq!(config.log.level, LogLevel::Warn);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.env_filter_str(), "graphql_transport=trace");
        assert_eq!(config.http.address(), "0.0.0.0:8080");
        assert_eq!(config.graphql_path(), "/api/graphql");
        assert!(!config.http.allow_queries_via_get);
        assert_eq!(config.graphiql.ide, GraphQLIde::ApolloSandbox);
        assert_eq!(
            config.batching,
            Some(BatchingConfig { max_operations: 10 })
        );
        assert!(config.uploads.enabled);
        assert!(config.uploads.strict);
        assert_eq!(
            config.websocket.subprotocols,
            vec![WebSocketSubprotocol::GraphQLWs]
        );
        assert_eq!(
            config.websocket.connection_init_wait_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(
            config.subscriptions.multipart_heartbeat_interval,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = parse_yaml_config("batching:\n  max_operations: 2\n  mode: parallel\n");
        assert!(result.is_err());
    }

    #[test]
    fn level_is_used_as_filter_when_no_filter_is_set() {
        let config = parse_yaml_config("log:\n  level: error\n").expect("config should parse");
        assert_eq!(config.log.env_filter_str(), "error");
    }

    #[test]
    fn schema_lists_top_level_sections() {
        let schema = TransportConfig::config_schema();
        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .expect("schema should describe properties");

        for section in ["log", "http", "graphiql", "batching", "uploads", "websocket"] {
            assert!(properties.contains_key(section), "missing section {section}");
        }
    }
}
