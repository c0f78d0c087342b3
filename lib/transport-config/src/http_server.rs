use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The HTTP listener and the GraphQL endpoint behind it.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct HttpServerConfig {
    /// Interface to listen on (`HOST`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path answering GraphQL requests, IDE page loads and WebSocket upgrades.
    #[serde(default = "default_graphql_endpoint")]
    pub graphql_endpoint: String,

    /// Largest accepted request body in bytes. Bigger bodies get a `413`.
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: usize,

    /// Accept operations sent with `GET` query parameters.
    ///
    /// Turning this off leaves the IDE page reachable over `GET`.
    #[serde(default = "enabled")]
    pub allow_queries_via_get: bool,
}

impl HttpServerConfig {
    /// `host:port`, ready to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            graphql_endpoint: default_graphql_endpoint(),
            max_request_body_size: default_max_request_body_size(),
            allow_queries_via_get: enabled(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    4000
}

fn default_graphql_endpoint() -> String {
    String::from("/graphql")
}

// 2 MiB
fn default_max_request_body_size() -> usize {
    2 << 20
}

fn enabled() -> bool {
    true
}
