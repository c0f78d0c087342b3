use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::NORMAL_CLOSURE;
use crate::error::TransportError;

/// One event as a host's socket primitive reports it.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Text the host delivers as-is.
    Text(String),
    /// A "send" event carrying a text data frame, which GraphQL sub-protocols fill with JSON.
    Send(String),
    Binary(Bytes),
    /// A sentinel close message, for hosts that report disconnects in-band.
    Close { code: u16, reason: Option<String> },
}

/// How a host's socket primitive fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    /// The peer went away. Hosts that raise on disconnect report it this way.
    #[error("disconnected with code {code}")]
    Disconnected { code: u16, reason: Option<String> },
    #[error("timed out")]
    TimedOut,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Bytes),
}

/// The socket primitives a host adapter provides.
#[async_trait]
pub trait SocketLike: Send {
    /// Waits for the next event. `timeout` is honoured when the host supports it.
    async fn recv(&mut self, timeout: Option<Duration>) -> Result<HostEvent, HostError>;
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), HostError>;
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), HostError>;
    /// The sub-protocol agreed on during the handshake.
    fn subprotocol(&self) -> Option<&str>;
}

/// A normalized socket event.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Json(String),
    Bytes(Bytes),
    Close { code: u16, reason: Option<String> },
}

impl Message {
    /// Decodes a `Json` or `Text` payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        match self {
            Message::Json(text) | Message::Text(text) => {
                sonic_rs::from_str(text).map_err(TransportError::MalformedJson)
            }
            Message::Bytes(_) | Message::Close { .. } => {
                Err(TransportError::UnexpectedMessage("a JSON text message"))
            }
        }
    }
}

#[derive(Debug, Default)]
struct WebSocketClientState {
    closed: bool,
    close_code: Option<u16>,
    close_reason: Option<String>,
}

/// Wraps a host socket so that both disconnect styles, a raised error and an
/// in-band close message, end up in the same closed state.
///
/// Once closed, `receive` keeps answering with the same [`Message::Close`]
/// without touching the host socket again.
pub struct WebSocketClient<S> {
    socket: S,
    state: WebSocketClientState,
}

impl<S: SocketLike> WebSocketClient<S> {
    pub fn new(socket: S) -> Self {
        Self {
            socket,
            state: WebSocketClientState::default(),
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn accepted_subprotocol(&self) -> Option<&str> {
        self.socket.subprotocol()
    }

    pub fn closed(&self) -> bool {
        self.state.closed
    }

    /// Fails while the socket is open.
    pub fn close_code(&self) -> Result<u16, TransportError> {
        match (self.state.closed, self.state.close_code) {
            (true, Some(code)) => Ok(code),
            _ => Err(TransportError::SocketStillOpen),
        }
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.state.close_reason.as_deref()
    }

    pub async fn receive(&mut self, timeout: Option<Duration>) -> Result<Message, TransportError> {
        if self.state.closed {
            return Ok(self.close_message());
        }

        match self.socket.recv(timeout).await {
            Ok(HostEvent::Text(text)) => Ok(Message::Text(text)),
            Ok(HostEvent::Send(text)) => Ok(Message::Json(text)),
            Ok(HostEvent::Binary(bytes)) => Ok(Message::Bytes(bytes)),
            Ok(HostEvent::Close { code, reason }) | Err(HostError::Disconnected { code, reason }) => {
                self.mark_closed(code, reason);
                Ok(self.close_message())
            }
            Err(HostError::TimedOut) => Err(TransportError::ReceiveTimeout),
            Err(HostError::Other(err)) => Err(TransportError::Host(err)),
        }
    }

    /// Receives one message and decodes its JSON payload.
    pub async fn receive_json<T: DeserializeOwned>(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        self.receive(timeout).await?.json()
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(OutboundFrame::Text(text.into())).await
    }

    pub async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), TransportError> {
        let text = sonic_rs::to_string(value).map_err(TransportError::Serialization)?;
        self.send(OutboundFrame::Text(text)).await
    }

    pub async fn send_bytes(&mut self, bytes: Bytes) -> Result<(), TransportError> {
        self.send(OutboundFrame::Binary(bytes)).await
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        if self.state.closed {
            return Err(TransportError::SocketClosed);
        }

        match self.socket.send(frame).await {
            Ok(()) => Ok(()),
            Err(HostError::Disconnected { code, reason }) => {
                self.mark_closed(code, reason);
                Err(TransportError::SocketClosed)
            }
            Err(HostError::TimedOut) => Err(TransportError::Host("send timed out".to_string())),
            Err(HostError::Other(err)) => Err(TransportError::Host(err)),
        }
    }

    /// Closes with a normal closure. Closing twice is a no-op.
    pub async fn close(&mut self) {
        self.close_with(NORMAL_CLOSURE, "").await
    }

    pub async fn close_with(&mut self, code: u16, reason: &str) {
        if self.state.closed {
            return;
        }

        if let Err(err) = self.socket.close(code, reason).await {
            debug!(code, "close frame not delivered: {}", err);
        }
        let reason = (!reason.is_empty()).then(|| reason.to_string());
        self.mark_closed(code, reason);
    }

    fn mark_closed(&mut self, code: u16, reason: Option<String>) {
        debug!(code, reason = ?reason, "websocket closed");
        self.state = WebSocketClientState {
            closed: true,
            close_code: Some(code),
            close_reason: reason,
        };
    }

    fn close_message(&self) -> Message {
        Message::Close {
            code: self.state.close_code.unwrap_or(NORMAL_CLOSURE),
            reason: self.state.close_reason.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use serde_json::{json, Value};

    use super::*;

    /// A host that replays a fixed script of receive outcomes.
    #[derive(Default)]
    pub(crate) struct ScriptedSocket {
        pub script: VecDeque<Result<HostEvent, HostError>>,
        pub sent: Vec<OutboundFrame>,
        pub closed_with: Option<(u16, String)>,
        pub recv_calls: usize,
        pub protocol: Option<String>,
        pub fail_sends: Option<HostError>,
    }

    impl ScriptedSocket {
        pub fn new(script: impl IntoIterator<Item = Result<HostEvent, HostError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SocketLike for ScriptedSocket {
        async fn recv(&mut self, _timeout: Option<Duration>) -> Result<HostEvent, HostError> {
            self.recv_calls += 1;
            self.script.pop_front().unwrap_or(Err(HostError::Other(
                "receive called on an exhausted script".to_string(),
            )))
        }

        async fn send(&mut self, frame: OutboundFrame) -> Result<(), HostError> {
            if let Some(err) = self.fail_sends.clone() {
                return Err(err);
            }
            self.sent.push(frame);
            Ok(())
        }

        async fn close(&mut self, code: u16, reason: &str) -> Result<(), HostError> {
            self.closed_with = Some((code, reason.to_string()));
            Ok(())
        }

        fn subprotocol(&self) -> Option<&str> {
            self.protocol.as_deref()
        }
    }

    fn going_away() -> Message {
        Message::Close {
            code: 1001,
            reason: Some("going away".to_string()),
        }
    }

    #[tokio::test]
    async fn raised_disconnect_is_a_close_message() {
        let mut client = WebSocketClient::new(ScriptedSocket::new([Err(
            HostError::Disconnected {
                code: 1001,
                reason: Some("going away".to_string()),
            },
        )]));

        assert_eq!(client.receive(None).await.unwrap(), going_away());
        assert_eq!(client.receive(None).await.unwrap(), going_away());

        assert_eq!(client.socket().recv_calls, 1);
        assert!(client.closed());
        assert_eq!(client.close_code().unwrap(), 1001);
        assert_eq!(client.close_reason(), Some("going away"));
    }

    #[tokio::test]
    async fn in_band_close_reaches_the_same_state() {
        let mut client = WebSocketClient::new(ScriptedSocket::new([Ok(HostEvent::Close {
            code: 1001,
            reason: Some("going away".to_string()),
        })]));

        assert_eq!(client.receive(None).await.unwrap(), going_away());
        assert_eq!(client.receive(None).await.unwrap(), going_away());

        assert_eq!(client.socket().recv_calls, 1);
        assert_eq!(client.close_code().unwrap(), 1001);
        assert_eq!(client.close_reason(), Some("going away"));
    }

    #[tokio::test]
    async fn classifies_data_events_in_order() {
        let mut client = WebSocketClient::new(ScriptedSocket::new([
            Ok(HostEvent::Send(r#"{"type":"ping"}"#.to_string())),
            Ok(HostEvent::Text("hello".to_string())),
            Ok(HostEvent::Binary(Bytes::from_static(b"\x00\x01"))),
        ]));

        assert_eq!(
            client.receive(None).await.unwrap(),
            Message::Json(r#"{"type":"ping"}"#.to_string())
        );
        assert_eq!(
            client.receive(None).await.unwrap(),
            Message::Text("hello".to_string())
        );
        assert_eq!(
            client.receive(None).await.unwrap(),
            Message::Bytes(Bytes::from_static(b"\x00\x01"))
        );
        assert!(!client.closed());
    }

    #[tokio::test]
    async fn timeouts_leave_the_socket_open() {
        let mut client = WebSocketClient::new(ScriptedSocket::new([
            Err(HostError::TimedOut),
            Ok(HostEvent::Send("{}".to_string())),
        ]));

        assert!(matches!(
            client.receive(Some(Duration::from_millis(5))).await,
            Err(TransportError::ReceiveTimeout)
        ));
        assert!(!client.closed());
        assert_eq!(client.receive(None).await.unwrap(), Message::Json("{}".to_string()));
    }

    #[tokio::test]
    async fn close_code_before_close_fails_fast() {
        let client = WebSocketClient::new(ScriptedSocket::default());
        assert!(matches!(client.close_code(), Err(TransportError::SocketStillOpen)));
        assert_eq!(client.close_reason(), None);
    }

    #[tokio::test]
    async fn sending_after_close_fails() {
        let mut client = WebSocketClient::new(ScriptedSocket::default());
        client.send_text("before").await.unwrap();
        client.close().await;

        assert!(matches!(
            client.send_text("after").await,
            Err(TransportError::SocketClosed)
        ));
        assert!(matches!(
            client.send_json(&json!({"a": 1})).await,
            Err(TransportError::SocketClosed)
        ));
        assert!(matches!(
            client.send_bytes(Bytes::from_static(b"x")).await,
            Err(TransportError::SocketClosed)
        ));
        assert_eq!(client.socket().sent, vec![OutboundFrame::Text("before".to_string())]);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut client = WebSocketClient::new(ScriptedSocket::default());

        client.close_with(4406, "Subprotocol not acceptable").await;
        client.close().await;

        assert_eq!(
            client.socket().closed_with,
            Some((4406, "Subprotocol not acceptable".to_string()))
        );
        assert_eq!(client.close_code().unwrap(), 4406);
        assert_eq!(
            client.receive(None).await.unwrap(),
            Message::Close {
                code: 4406,
                reason: Some("Subprotocol not acceptable".to_string())
            }
        );
        assert_eq!(client.socket().recv_calls, 0);
    }

    #[tokio::test]
    async fn plain_close_is_a_normal_closure() {
        let mut client = WebSocketClient::new(ScriptedSocket::default());
        client.close().await;

        assert_eq!(client.close_code().unwrap(), 1000);
        assert_eq!(client.close_reason(), None);
    }

    #[tokio::test]
    async fn disconnect_during_send_closes_the_client() {
        let mut socket = ScriptedSocket::default();
        socket.fail_sends = Some(HostError::Disconnected {
            code: 1006,
            reason: None,
        });
        let mut client = WebSocketClient::new(socket);

        assert!(matches!(
            client.send_text("lost").await,
            Err(TransportError::SocketClosed)
        ));
        assert!(client.closed());
        assert_eq!(client.close_code().unwrap(), 1006);
    }

    #[tokio::test]
    async fn receives_json_payloads() {
        let mut client = WebSocketClient::new(ScriptedSocket::new([
            Ok(HostEvent::Send(r#"{"type":"connection_init"}"#.to_string())),
            Ok(HostEvent::Binary(Bytes::from_static(b"{}"))),
            Ok(HostEvent::Send("not json".to_string())),
        ]));

        let value: Value = client.receive_json(None).await.unwrap();
        assert_eq!(value, json!({"type": "connection_init"}));

        assert!(matches!(
            client.receive_json::<Value>(None).await,
            Err(TransportError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            client.receive_json::<Value>(None).await,
            Err(TransportError::MalformedJson(_))
        ));
    }
}
