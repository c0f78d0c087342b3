use std::sync::Arc;

use bytes::Bytes;
use futures::{future::join_all, stream::BoxStream};
use graphql_transport_config::{websocket::WebSocketSubprotocol, TransportConfig};
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, HeaderValue, Method, Response, StatusCode,
};
use tracing::{debug, trace, warn};

use crate::{
    classify::{classify, classify_body, validate_batch, RequestMode},
    codec::{
        decode_body, decode_operations, decode_query_params, encode, ExecutionOutcome,
        GetQueryParams, OperationBatch, OperationRequest,
    },
    engine::{ExecutionEngine, ExecutionRequest, RequestContext},
    error::TransportError,
    graphiql::ide_response,
    header::{
        is_multipart_subscription, negotiate_response_content_type, BodyKind,
        ResponseContentType, MULTIPART_SUBSCRIPTION_CONTENT_TYPE,
    },
    multipart::{parse_multipart, FileSet},
    multipart_subscribe::create_stream,
    request::RequestLike,
    response::ExecutionResult,
    upload_map::bind_operations,
    websocket::{pick_subprotocol, CloseCode, SocketLike, WebSocketClient},
};

/// What the host should send back for an HTTP request.
pub enum TransportResponse {
    Complete(Response<Bytes>),
    Streaming {
        content_type: &'static str,
        stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    },
}

impl TransportResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportResponse::Complete(response) => response.status(),
            TransportResponse::Streaming { .. } => StatusCode::OK,
        }
    }
}

impl From<TransportError> for TransportResponse {
    fn from(err: TransportError) -> Self {
        TransportResponse::Complete(err.into_response())
    }
}

/// Drives an [`ExecutionEngine`] from HTTP requests and WebSocket connections.
pub struct GraphQLTransport<E> {
    engine: Arc<E>,
    config: Arc<TransportConfig>,
}

impl<E> Clone for GraphQLTransport<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
        }
    }
}

struct DecodedOperations {
    operations: OperationBatch,
    uploads: Arc<FileSet>,
}

impl<E: ExecutionEngine> GraphQLTransport<E> {
    pub fn new(engine: E, config: TransportConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Handles one HTTP request. Failures are rendered as GraphQL error responses.
    pub async fn handle_http<R: RequestLike + ?Sized>(
        &self,
        request: &R,
        body: Bytes,
    ) -> TransportResponse {
        match self.process_http(request, body).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    code = err.graphql_error_code(),
                    status = err.status_code().as_u16(),
                    "request failed: {}",
                    err
                );
                err.into()
            }
        }
    }

    async fn process_http<R: RequestLike + ?Sized>(
        &self,
        request: &R,
        body: Bytes,
    ) -> Result<TransportResponse, TransportError> {
        let mode = classify(request)?;

        if mode == RequestMode::IdeRender {
            return ide_response(&self.config.graphiql, self.config.graphql_path())
                .map(TransportResponse::Complete);
        }

        let response_content_type = negotiate_response_content_type(request.header_str(&ACCEPT))?;
        let decoded = self.read_operations(request, mode, body).await?;
        let mode = classify_body(mode, &decoded.operations);
        debug!(mode = ?mode, "decoded operations");

        let context = Arc::new(RequestContext {
            method: request.method().clone(),
            headers: request.headers().clone(),
            mode: Some(mode),
        });

        match decoded.operations {
            OperationBatch::Batch(requests) => {
                validate_batch(&requests, mode, self.config.batching.as_ref())?;
                let requests = requests
                    .into_iter()
                    .map(|operation| execution_request(operation, &decoded.uploads, &context))
                    .collect::<Result<Vec<_>, _>>()?;

                let results =
                    join_all(requests.into_iter().map(|request| self.engine.execute(request)))
                        .await;
                let body = encode(&ExecutionOutcome::Batch(results), mode)?;
                Ok(complete(StatusCode::OK, response_content_type, body))
            }
            OperationBatch::Single(operation) => {
                let request = execution_request(operation, &decoded.uploads, &context)?;

                if mode == RequestMode::MultipartSubscription {
                    let results = self.engine.subscribe(request).await;
                    return Ok(TransportResponse::Streaming {
                        content_type: MULTIPART_SUBSCRIPTION_CONTENT_TYPE,
                        stream: create_stream(
                            results,
                            self.config.subscriptions.multipart_heartbeat_interval,
                        ),
                    });
                }

                let result = self.engine.execute(request).await;
                // application/graphql-response+json answers a result without data with 400
                let status = match (response_content_type, &result.data) {
                    (ResponseContentType::GraphQLResponseJSON, None) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::OK,
                };
                let body = encode(&ExecutionOutcome::Single(result), mode)?;
                Ok(complete(status, response_content_type, body))
            }
        }
    }

    async fn read_operations<R: RequestLike + ?Sized>(
        &self,
        request: &R,
        mode: RequestMode,
        body: Bytes,
    ) -> Result<DecodedOperations, TransportError> {
        if *request.method() == Method::GET {
            trace!("processing GET GraphQL operation");
            if !self.config.http.allow_queries_via_get {
                return Err(TransportError::QueriesViaGetDisabled);
            }
            let params = GetQueryParams::from_query_string(request.query_string())?;
            return Ok(DecodedOperations {
                operations: OperationBatch::Single(decode_query_params(params)?),
                uploads: Arc::default(),
            });
        }

        trace!("processing POST GraphQL request");
        let max_size = self.config.http.max_request_body_size;
        if body.len() > max_size {
            return Err(TransportError::PayloadTooLarge(max_size));
        }

        let content_type = request.header_str(&CONTENT_TYPE);
        let kind = match content_type {
            Some(value)
                if mode == RequestMode::MultipartSubscription
                    && is_multipart_subscription(value) =>
            {
                BodyKind::Json
            }
            _ => BodyKind::from_content_type(content_type)?,
        };

        match kind {
            BodyKind::Json => Ok(DecodedOperations {
                operations: decode_operations(decode_body(&body)?)?,
                uploads: Arc::default(),
            }),
            BodyKind::MultipartFormData => {
                if !self.config.uploads.enabled {
                    return Err(TransportError::UploadsDisabled);
                }
                let multipart = parse_multipart(content_type.unwrap_or_default(), body).await?;
                let operations = bind_operations(
                    multipart.operations,
                    &multipart.map,
                    &multipart.files,
                    self.config.uploads.strict,
                )?;
                debug!(files = multipart.files.len(), "bound multipart uploads");
                Ok(DecodedOperations {
                    operations: decode_operations(operations)?,
                    uploads: Arc::new(multipart.files),
                })
            }
        }
    }

    /// Runs an operation received over a WebSocket as a subscription.
    pub async fn execute_subscription(
        &self,
        operation: OperationRequest,
        headers: &HeaderMap,
    ) -> Result<BoxStream<'static, ExecutionResult>, TransportError> {
        let context = Arc::new(RequestContext {
            method: Method::GET,
            headers: headers.clone(),
            mode: None,
        });
        let request = execution_request(operation, &Arc::default(), &context)?;
        Ok(self.engine.subscribe(request).await)
    }

    /// The sub-protocol to accept for a WebSocket upgrade, or `None` when WebSockets
    /// are disabled or nothing the client asked for is supported.
    pub fn select_subprotocol<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a str>,
    ) -> Option<WebSocketSubprotocol> {
        if !self.config.websocket.enabled {
            return None;
        }
        pick_subprotocol(requested, &self.config.websocket.subprotocols)
    }

    /// Wraps an upgraded socket. A socket without an acceptable sub-protocol is
    /// closed with 4406 and handed back in the error.
    pub async fn accept_websocket<S: SocketLike>(
        &self,
        socket: S,
    ) -> Result<(WebSocketClient<S>, WebSocketSubprotocol), WebSocketClient<S>> {
        let mut client = WebSocketClient::new(socket);
        let protocol = client
            .accepted_subprotocol()
            .and_then(|name| self.select_subprotocol([name]));

        match protocol {
            Some(protocol) => {
                debug!(protocol = protocol.as_str(), "websocket accepted");
                Ok((client, protocol))
            }
            None => {
                warn!(
                    requested = ?client.accepted_subprotocol(),
                    "closing websocket without an acceptable sub-protocol"
                );
                client
                    .close_with_code(CloseCode::SubprotocolNotAcceptable)
                    .await;
                Err(client)
            }
        }
    }
}

fn execution_request(
    operation: OperationRequest,
    uploads: &Arc<FileSet>,
    context: &Arc<RequestContext>,
) -> Result<ExecutionRequest, TransportError> {
    let query = operation.query.ok_or(TransportError::MissingQuery)?;
    Ok(ExecutionRequest {
        query,
        operation_name: operation.operation_name,
        variables: operation.variables.unwrap_or_default(),
        extensions: operation.extensions,
        uploads: uploads.clone(),
        context: context.clone(),
    })
}

fn complete(
    status: StatusCode,
    content_type: ResponseContentType,
    body: Bytes,
) -> TransportResponse {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type.as_str()),
    );
    TransportResponse::Complete(response)
}
