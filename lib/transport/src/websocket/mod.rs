//! GraphQL over WebSocket: the host-independent socket wrapper, sub-protocol
//! negotiation and the message models of both supported sub-protocols.

use graphql_transport_config::websocket::WebSocketSubprotocol;
use tracing::debug;

pub mod graphql_transport_ws;
pub mod graphql_ws;
mod normalizer;

pub use normalizer::{
    HostError, HostEvent, Message, OutboundFrame, SocketLike, WebSocketClient,
};

#[cfg(test)]
pub(crate) use normalizer::tests::ScriptedSocket;

pub const NORMAL_CLOSURE: u16 = 1000;

/// Close codes sent by the server. The 44xx codes follow the graphql-transport-ws protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    UnsupportedData,
    SubprotocolNotAcceptable,
    ConnectionInitTimeout,
    TooManyInitialisationRequests,
    Unauthorized,
    Forbidden(String),
    BadRequest(String),
    SubscriberAlreadyExists(String),
    InternalServerError(Option<String>),
}

impl CloseCode {
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => NORMAL_CLOSURE,
            CloseCode::UnsupportedData => 1003,
            CloseCode::SubprotocolNotAcceptable => 4406,
            CloseCode::ConnectionInitTimeout => 4408,
            CloseCode::TooManyInitialisationRequests => 4429,
            CloseCode::Unauthorized => 4401,
            CloseCode::Forbidden(_) => 4403,
            CloseCode::BadRequest(_) => 4400,
            CloseCode::SubscriberAlreadyExists(_) => 4409,
            CloseCode::InternalServerError(_) => 4500,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            CloseCode::Normal => String::new(),
            CloseCode::UnsupportedData => "Unsupported data".to_string(),
            CloseCode::SubprotocolNotAcceptable => "Subprotocol not acceptable".to_string(),
            CloseCode::ConnectionInitTimeout => "Connection initialisation timeout".to_string(),
            CloseCode::TooManyInitialisationRequests => {
                "Too many initialisation requests".to_string()
            }
            CloseCode::Unauthorized => "Unauthorized".to_string(),
            CloseCode::Forbidden(reason) | CloseCode::BadRequest(reason) => reason.clone(),
            CloseCode::SubscriberAlreadyExists(id) => format!("Subscriber for {id} already exists"),
            CloseCode::InternalServerError(reason) => reason
                .clone()
                .unwrap_or_else(|| "Internal Server Error".to_string()),
        }
    }
}

impl<S: SocketLike> WebSocketClient<S> {
    pub async fn close_with_code(&mut self, close: CloseCode) {
        self.close_with(close.code(), &close.reason()).await
    }
}

/// Splits `Sec-WebSocket-Protocol` header values into protocol names.
pub fn requested_subprotocols<'a>(header_values: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    header_values
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .collect()
}

/// Picks the first protocol in the client's order that the server supports.
pub fn pick_subprotocol<'a>(
    requested: impl IntoIterator<Item = &'a str>,
    supported: &[WebSocketSubprotocol],
) -> Option<WebSocketSubprotocol> {
    let picked = requested.into_iter().find_map(|name| {
        supported
            .iter()
            .copied()
            .find(|protocol| protocol.as_str() == name)
    });
    debug!(protocol = ?picked, "negotiated websocket sub-protocol");
    picked
}
