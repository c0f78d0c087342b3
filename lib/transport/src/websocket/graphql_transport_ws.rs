//! Messages of the GraphQL over WebSocket Transport Protocol (`graphql-transport-ws`)
//! as per https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    codec::OperationRequest,
    error::TransportError,
    response::{ExecutionResult, GraphQLError},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Map<String, Value>>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Subscribe {
        id: String,
        payload: OperationRequest,
    },
    Complete {
        id: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Next {
        id: String,
        payload: ExecutionResult,
    },
    Error {
        id: String,
        payload: Vec<GraphQLError>,
    },
    Complete {
        id: String,
    },
}

impl ServerMessage {
    pub fn ack() -> Self {
        ServerMessage::ConnectionAck { payload: None }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong { payload: None }
    }

    pub fn next(id: &str, result: ExecutionResult) -> Self {
        ServerMessage::Next {
            id: id.to_string(),
            payload: result,
        }
    }

    pub fn error(id: &str, errors: &[GraphQLError]) -> Self {
        ServerMessage::Error {
            id: id.to_string(),
            payload: errors.to_vec(),
        }
    }

    pub fn complete(id: &str) -> Self {
        ServerMessage::Complete { id: id.to_string() }
    }

    pub fn to_text(&self) -> Result<String, TransportError> {
        sonic_rs::to_string(self).map_err(TransportError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_client_messages() {
        let init: ClientMessage =
            sonic_rs::from_str(r#"{"type":"connection_init","payload":{"token":"abc"}}"#).unwrap();
        assert_eq!(
            init,
            ClientMessage::ConnectionInit {
                payload: json!({"token": "abc"}).as_object().cloned()
            }
        );

        let ping: ClientMessage = sonic_rs::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping { payload: None });

        let subscribe: ClientMessage = sonic_rs::from_str(
            r#"{"id":"1","type":"subscribe","payload":{"query":"subscription { tick }","variables":null}}"#,
        )
        .unwrap();
        let ClientMessage::Subscribe { id, payload } = subscribe else {
            panic!("expected a subscribe message");
        };
        assert_eq!(id, "1");
        assert_eq!(payload.query.as_deref(), Some("subscription { tick }"));
        assert_eq!(payload.variables, None);
    }

    #[test]
    fn rejects_unknown_message_types() {
        assert!(sonic_rs::from_str::<ClientMessage>(r#"{"type":"start","id":"1"}"#).is_err());
    }

    #[test]
    fn serializes_server_messages() {
        insta::assert_snapshot!(ServerMessage::ack().to_text().unwrap(), @r#"{"type":"connection_ack"}"#);
        insta::assert_snapshot!(
            ServerMessage::next("1", ExecutionResult::from_data(json!({"tick": 1}))).to_text().unwrap(),
            @r#"{"type":"next","id":"1","payload":{"data":{"tick":1}}}"#
        );
        insta::assert_snapshot!(
            ServerMessage::error("1", &[GraphQLError::from("bad")]).to_text().unwrap(),
            @r#"{"type":"error","id":"1","payload":[{"message":"bad"}]}"#
        );
        insta::assert_snapshot!(ServerMessage::complete("1").to_text().unwrap(), @r#"{"type":"complete","id":"1"}"#);
    }
}
