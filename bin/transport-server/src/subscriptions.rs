//! A minimal subscription loop for both WebSocket sub-protocols. Operations of one
//! connection run one after another.

use std::time::Instant;

use futures::StreamExt;
use graphql_transport::{
    config::websocket::WebSocketSubprotocol,
    websocket::{graphql_transport_ws, graphql_ws, CloseCode, Message, SocketLike, WebSocketClient},
    ExecutionEngine, GraphQLError, GraphQLTransport, TransportError,
};
use http::HeaderMap;
use serde_json::json;
use tracing::{debug, error};

pub async fn serve_connection<E: ExecutionEngine, S: SocketLike>(
    transport: &GraphQLTransport<E>,
    client: &mut WebSocketClient<S>,
    protocol: WebSocketSubprotocol,
    headers: &HeaderMap,
) {
    let outcome = match protocol {
        WebSocketSubprotocol::GraphQLTransportWs => {
            serve_graphql_transport_ws(transport, client, headers).await
        }
        WebSocketSubprotocol::GraphQLWs => serve_graphql_ws(transport, client, headers).await,
    };

    match outcome {
        Ok(()) => debug!("websocket connection finished"),
        Err(TransportError::SocketClosed) => debug!("websocket closed while sending"),
        Err(err) => {
            error!("websocket connection failed: {}", err);
            client
                .close_with_code(CloseCode::InternalServerError(None))
                .await;
        }
    }
}

async fn serve_graphql_transport_ws<E: ExecutionEngine, S: SocketLike>(
    transport: &GraphQLTransport<E>,
    client: &mut WebSocketClient<S>,
    headers: &HeaderMap,
) -> Result<(), TransportError> {
    use graphql_transport_ws::{ClientMessage, ServerMessage};

    // the wait for connection_init is measured from connection start, not per frame
    let init_deadline = Instant::now() + transport.config().websocket.connection_init_wait_timeout;
    let mut acknowledged = false;

    loop {
        let timeout =
            (!acknowledged).then(|| init_deadline.saturating_duration_since(Instant::now()));
        let message = match client.receive(timeout).await {
            Ok(message) => message,
            Err(TransportError::ReceiveTimeout) => {
                client.close_with_code(CloseCode::ConnectionInitTimeout).await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match message {
            Message::Close { code, .. } => {
                debug!(code, "peer closed the connection");
                return Ok(());
            }
            Message::Bytes(_) => {
                client
                    .close_with_code(CloseCode::BadRequest(
                        "Binary messages are not supported".to_string(),
                    ))
                    .await;
                return Ok(());
            }
            Message::Json(_) | Message::Text(_) => {}
        }

        let Ok(parsed) = message.json::<ClientMessage>() else {
            client
                .close_with_code(CloseCode::BadRequest("Invalid message received".to_string()))
                .await;
            return Ok(());
        };

        match parsed {
            ClientMessage::ConnectionInit { .. } => {
                if acknowledged {
                    client
                        .close_with_code(CloseCode::TooManyInitialisationRequests)
                        .await;
                    return Ok(());
                }
                acknowledged = true;
                client.send_text(ServerMessage::ack().to_text()?).await?;
            }
            ClientMessage::Ping { .. } => {
                client.send_text(ServerMessage::pong().to_text()?).await?;
            }
            ClientMessage::Pong { .. } | ClientMessage::Complete { .. } => {}
            ClientMessage::Subscribe { id, payload } => {
                if !acknowledged {
                    client.close_with_code(CloseCode::Unauthorized).await;
                    return Ok(());
                }

                match transport.execute_subscription(payload, headers).await {
                    Ok(mut results) => {
                        while let Some(result) = results.next().await {
                            client
                                .send_text(ServerMessage::next(&id, result).to_text()?)
                                .await?;
                        }
                        client
                            .send_text(ServerMessage::complete(&id).to_text()?)
                            .await?;
                    }
                    Err(err) => {
                        let errors = [GraphQLError::from(err.to_string())];
                        client
                            .send_text(ServerMessage::error(&id, &errors).to_text()?)
                            .await?;
                    }
                }
            }
        }
    }
}

async fn serve_graphql_ws<E: ExecutionEngine, S: SocketLike>(
    transport: &GraphQLTransport<E>,
    client: &mut WebSocketClient<S>,
    headers: &HeaderMap,
) -> Result<(), TransportError> {
    use graphql_ws::{ClientMessage, ServerMessage};

    loop {
        let message = client.receive(None).await?;

        match message {
            Message::Close { code, .. } => {
                debug!(code, "peer closed the connection");
                return Ok(());
            }
            Message::Bytes(_) => {
                client.close_with_code(CloseCode::UnsupportedData).await;
                return Ok(());
            }
            Message::Json(_) | Message::Text(_) => {}
        }

        let parsed = match message.json::<ClientMessage>() {
            Ok(parsed) => parsed,
            Err(err) => {
                let error = ServerMessage::ConnectionError {
                    payload: json!({ "message": err.to_string() }),
                };
                client.send_text(error.to_text()?).await?;
                continue;
            }
        };

        match parsed {
            ClientMessage::ConnectionInit { .. } => {
                client
                    .send_text(ServerMessage::ConnectionAck.to_text()?)
                    .await?;
                client.send_text(ServerMessage::Ka.to_text()?).await?;
            }
            ClientMessage::Start { id, payload } => {
                match transport.execute_subscription(payload, headers).await {
                    Ok(mut results) => {
                        while let Some(result) = results.next().await {
                            client
                                .send_text(ServerMessage::data(&id, result).to_text()?)
                                .await?;
                        }
                    }
                    Err(err) => {
                        let error = ServerMessage::Error {
                            id: id.clone(),
                            payload: json!({ "message": err.to_string() }),
                        };
                        client.send_text(error.to_text()?).await?;
                    }
                }
                client
                    .send_text(ServerMessage::complete(&id).to_text()?)
                    .await?;
            }
            ClientMessage::Stop { .. } => {}
            ClientMessage::ConnectionTerminate => {
                client.close().await;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, time::Duration};

    use graphql_transport::{
        async_trait,
        config::TransportConfig,
        websocket::{HostError, HostEvent, OutboundFrame},
    };
    use serde_json::Value;

    use super::*;
    use crate::engine::EchoEngine;

    #[derive(Default)]
    struct TestSocket {
        incoming: VecDeque<Result<HostEvent, HostError>>,
        sent: Vec<Value>,
        closed_with: Option<u16>,
        recv_delay: Duration,
        recv_timeouts: Vec<Option<Duration>>,
    }

    #[async_trait]
    impl SocketLike for TestSocket {
        async fn recv(&mut self, timeout: Option<Duration>) -> Result<HostEvent, HostError> {
            self.recv_timeouts.push(timeout);
            if !self.recv_delay.is_zero() {
                tokio::time::sleep(self.recv_delay).await;
            }
            self.incoming.pop_front().unwrap_or(Err(HostError::Disconnected {
                code: 1006,
                reason: None,
            }))
        }

        async fn send(&mut self, frame: OutboundFrame) -> Result<(), HostError> {
            if let OutboundFrame::Text(text) = frame {
                self.sent.push(serde_json::from_str(&text).unwrap());
            }
            Ok(())
        }

        async fn close(&mut self, code: u16, _reason: &str) -> Result<(), HostError> {
            self.closed_with = Some(code);
            Ok(())
        }

        fn subprotocol(&self) -> Option<&str> {
            None
        }
    }

    fn transport() -> GraphQLTransport<EchoEngine> {
        transport_with(TransportConfig::default())
    }

    fn transport_with(config: TransportConfig) -> GraphQLTransport<EchoEngine> {
        GraphQLTransport::new(
            EchoEngine {
                tick_interval: Duration::from_millis(1),
            },
            config,
        )
    }

    fn client(messages: &[&str]) -> WebSocketClient<TestSocket> {
        WebSocketClient::new(TestSocket {
            incoming: messages
                .iter()
                .map(|text| Ok(HostEvent::Send(text.to_string())))
                .collect(),
            ..Default::default()
        })
    }

    fn sent_types(client: &WebSocketClient<TestSocket>) -> Vec<String> {
        client
            .socket()
            .sent
            .iter()
            .map(|message| message["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn graphql_transport_ws_session() {
        let mut client = client(&[
            r#"{"type":"connection_init"}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"subscribe","id":"1","payload":{"query":"subscription { tick }"}}"#,
            r#"{"type":"complete","id":"1"}"#,
        ]);

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLTransportWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(
            sent_types(&client),
            vec!["connection_ack", "pong", "next", "next", "next", "complete"]
        );
        assert_eq!(client.socket().sent[2]["payload"]["data"]["tick"], json!(1));
        assert_eq!(client.close_code().unwrap(), 1006);
    }

    #[tokio::test]
    async fn subscribing_before_init_is_unauthorized() {
        let mut client = client(&[
            r#"{"type":"subscribe","id":"1","payload":{"query":"subscription { tick }"}}"#,
        ]);

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLTransportWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(client.socket().closed_with, Some(4401));
        assert!(client.socket().sent.is_empty());
    }

    #[tokio::test]
    async fn second_init_is_rejected() {
        let mut client = client(&[r#"{"type":"connection_init"}"#, r#"{"type":"connection_init"}"#]);

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLTransportWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(client.socket().closed_with, Some(4429));
    }

    #[tokio::test]
    async fn missing_init_times_out() {
        let mut client = WebSocketClient::new(TestSocket {
            incoming: VecDeque::from([Err(HostError::TimedOut)]),
            ..Default::default()
        });

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLTransportWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(client.close_code().unwrap(), 4408);
    }

    #[tokio::test]
    async fn pings_do_not_extend_the_init_wait() {
        let mut config = TransportConfig::default();
        config.websocket.connection_init_wait_timeout = Duration::from_millis(50);
        let ping = || Ok(HostEvent::Send(r#"{"type":"ping"}"#.to_string()));
        let mut client = WebSocketClient::new(TestSocket {
            incoming: VecDeque::from([ping(), ping(), ping(), Err(HostError::TimedOut)]),
            recv_delay: Duration::from_millis(20),
            ..Default::default()
        });

        serve_connection(
            &transport_with(config),
            &mut client,
            WebSocketSubprotocol::GraphQLTransportWs,
            &HeaderMap::new(),
        )
        .await;

        let timeouts: Vec<Duration> = client
            .socket()
            .recv_timeouts
            .iter()
            .map(|timeout| timeout.expect("init wait should be bounded"))
            .collect();
        assert_eq!(timeouts.len(), 4);
        assert!(timeouts.windows(2).all(|pair| pair[1] <= pair[0]));
        // three delayed receives already used at least 40ms of the 50ms
        assert!(timeouts[2] <= Duration::from_millis(10));
        assert_eq!(timeouts[3], Duration::ZERO);
        assert_eq!(client.close_code().unwrap(), 4408);
    }

    #[tokio::test]
    async fn graphql_ws_session() {
        let mut client = client(&[
            r#"{"type":"connection_init","payload":{}}"#,
            r#"{"type":"start","id":"a","payload":{"query":"subscription { tick }"}}"#,
            r#"{"type":"stop","id":"a"}"#,
            r#"{"type":"connection_terminate"}"#,
        ]);

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(
            sent_types(&client),
            vec!["connection_ack", "ka", "data", "data", "data", "complete"]
        );
        assert_eq!(client.socket().closed_with, Some(1000));
    }

    #[tokio::test]
    async fn graphql_ws_reports_invalid_messages() {
        let mut client = client(&["not json", r#"{"type":"connection_terminate"}"#]);

        serve_connection(
            &transport(),
            &mut client,
            WebSocketSubprotocol::GraphQLWs,
            &HeaderMap::new(),
        )
        .await;

        assert_eq!(sent_types(&client), vec!["connection_error"]);
    }
}
