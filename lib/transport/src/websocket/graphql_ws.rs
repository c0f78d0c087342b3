//! Messages of the legacy `graphql-ws` sub-protocol (subscriptions-transport-ws).
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{codec::OperationRequest, error::TransportError, response::ExecutionResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Map<String, Value>>,
    },
    Start {
        id: String,
        payload: OperationRequest,
    },
    Stop {
        id: String,
    },
    ConnectionTerminate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    ConnectionError {
        payload: Value,
    },
    Data {
        id: String,
        payload: ExecutionResult,
    },
    Error {
        id: String,
        payload: Value,
    },
    Complete {
        id: String,
    },
    /// Keep-alive.
    Ka,
}

impl ServerMessage {
    pub fn data(id: &str, result: ExecutionResult) -> Self {
        ServerMessage::Data {
            id: id.to_string(),
            payload: result,
        }
    }

    pub fn complete(id: &str) -> Self {
        ServerMessage::Complete { id: id.to_string() }
    }

    pub fn to_text(&self) -> Result<String, TransportError> {
        sonic_rs::to_string(self).map_err(TransportError::Serialization)
    }
}
