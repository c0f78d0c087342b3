use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const GRAPHQL_TRANSPORT_WS_PROTOCOL: &str = "graphql-transport-ws";
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct WebSocketConfig {
    /// Enables/disables WebSocket connections on the GraphQL endpoint.
    ///
    /// You can override this setting by setting the `WEBSOCKET_ENABLED` environment variable to `true` or `false`.
    #[serde(default = "default_websocket_enabled")]
    pub enabled: bool,

    /// The subscription sub-protocols the server is willing to speak.
    ///
    /// The client's order of preference decides among the protocols both sides support.
    #[serde(default = "default_subprotocols")]
    pub subprotocols: Vec<WebSocketSubprotocol>,

    /// How long a client may wait before sending its connection initialisation message.
    #[serde(
        default = "default_connection_init_wait_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    #[schemars(with = "String")]
    pub connection_init_wait_timeout: Duration,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketSubprotocol {
    #[serde(rename = "graphql-transport-ws")]
    GraphQLTransportWs,
    #[serde(rename = "graphql-ws")]
    GraphQLWs,
}

impl WebSocketSubprotocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            WebSocketSubprotocol::GraphQLTransportWs => GRAPHQL_TRANSPORT_WS_PROTOCOL,
            WebSocketSubprotocol::GraphQLWs => GRAPHQL_WS_PROTOCOL,
        }
    }
}

fn default_websocket_enabled() -> bool {
    true
}

fn default_subprotocols() -> Vec<WebSocketSubprotocol> {
    vec![
        WebSocketSubprotocol::GraphQLTransportWs,
        WebSocketSubprotocol::GraphQLWs,
    ]
}

fn default_connection_init_wait_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: default_websocket_enabled(),
            subprotocols: default_subprotocols(),
            connection_init_wait_timeout: default_connection_init_wait_timeout(),
        }
    }
}
