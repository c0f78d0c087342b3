use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use graphql_transport::{
    async_trait,
    websocket::{HostError, HostEvent, OutboundFrame, SocketLike},
};

/// Reported when the connection drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code for a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// An upgraded axum socket.
pub struct AxumSocket {
    inner: WebSocket,
    protocol: Option<String>,
}

impl AxumSocket {
    pub fn new(inner: WebSocket) -> Self {
        let protocol = inner
            .protocol()
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Self { inner, protocol }
    }
}

fn dropped(err: Option<axum::Error>) -> HostError {
    HostError::Disconnected {
        code: ABNORMAL_CLOSURE,
        reason: err.map(|err| err.to_string()),
    }
}

#[async_trait]
impl SocketLike for AxumSocket {
    async fn recv(&mut self, timeout: Option<Duration>) -> Result<HostEvent, HostError> {
        loop {
            let next = match timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.inner.recv())
                    .await
                    .map_err(|_| HostError::TimedOut)?,
                None => self.inner.recv().await,
            };

            return match next {
                None => Err(dropped(None)),
                Some(Err(err)) => Err(dropped(Some(err))),
                Some(Ok(WsMessage::Text(text))) => Ok(HostEvent::Send(text.as_str().to_owned())),
                Some(Ok(WsMessage::Binary(bytes))) => Ok(HostEvent::Binary(bytes)),
                Some(Ok(WsMessage::Close(frame))) => Ok(match frame {
                    Some(frame) => HostEvent::Close {
                        code: frame.code,
                        reason: (!frame.reason.is_empty()).then(|| frame.reason.as_str().to_owned()),
                    },
                    None => HostEvent::Close {
                        code: NO_STATUS_RECEIVED,
                        reason: None,
                    },
                }),
                // answered by axum
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            };
        }
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), HostError> {
        let message = match frame {
            OutboundFrame::Text(text) => WsMessage::Text(text.into()),
            OutboundFrame::Binary(bytes) => WsMessage::Binary(bytes),
        };
        self.inner
            .send(message)
            .await
            .map_err(|err| dropped(Some(err)))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), HostError> {
        self.inner
            .send(WsMessage::Close(Some(CloseFrame {
                code,
                reason: reason.to_owned().into(),
            })))
            .await
            .map_err(|err| dropped(Some(err)))
    }

    fn subprotocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }
}
