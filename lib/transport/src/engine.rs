use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

use crate::{classify::RequestMode, multipart::FileSet, response::ExecutionResult};

/// Request metadata handed to the engine next to the operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub headers: HeaderMap,
    /// `None` for operations received over a WebSocket.
    pub mode: Option<RequestMode>,
}

/// A decoded operation, ready to run. Variables already hold file references
/// when the request was a multipart upload.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Map<String, Value>,
    pub extensions: Option<Map<String, Value>>,
    /// Files of a multipart upload, keyed the way the variables reference them.
    pub uploads: Arc<FileSet>,
    pub context: Arc<RequestContext>,
}

/// The GraphQL executor this transport drives. Parsing, validation and resolution
/// all happen behind it.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + 'static {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;

    /// Runs a subscription. Engines without subscription support answer with
    /// a single result.
    async fn subscribe(&self, request: ExecutionRequest) -> BoxStream<'static, ExecutionResult> {
        let result = self.execute(request).await;
        stream::once(async move { result }).boxed()
    }
}
