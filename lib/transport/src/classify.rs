use graphql_transport_config::batching::BatchingConfig;
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, Method,
};
use tracing::{debug, warn};

use crate::{
    codec::{OperationBatch, OperationRequest},
    error::TransportError,
    header::{accepts_html, is_multipart_subscription},
    request::RequestLike,
};

/// How a request is handled, decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    IdeRender,
    SingleOperation,
    BatchOperation,
    MultipartSubscription,
}

pub fn is_request_allowed(method: &Method) -> bool {
    method == Method::GET || method == Method::POST
}

/// Classifies a request from its metadata alone. A body is never read here, so a
/// batch is only recognized later by [`classify_body`].
pub fn classify<R: RequestLike + ?Sized>(request: &R) -> Result<RequestMode, TransportError> {
    classify_parts(request.method(), request.headers(), request.query_string())
}

pub fn classify_parts(
    method: &Method,
    headers: &HeaderMap,
    query_string: Option<&str>,
) -> Result<RequestMode, TransportError> {
    if !is_request_allowed(method) {
        warn!("unsupported HTTP method: {}", method);
        return Err(TransportError::MethodNotAllowed(method.clone()));
    }

    let header = |name| headers.get(name).and_then(|value| value.to_str().ok());

    let mode = if method == Method::GET
        && !has_query_param(query_string)
        && accepts_html(header(ACCEPT))
    {
        RequestMode::IdeRender
    } else if header(CONTENT_TYPE).is_some_and(is_multipart_subscription)
        || header(ACCEPT).is_some_and(is_multipart_subscription)
    {
        RequestMode::MultipartSubscription
    } else {
        RequestMode::SingleOperation
    };

    debug!(mode = ?mode, method = %method, "classified request");

    Ok(mode)
}

/// Looks for the `query` key only. A query string that does not decode counts as
/// carrying one, so it fails when the operation is read instead of showing the IDE.
fn has_query_param(query_string: Option<&str>) -> bool {
    let Some(raw) = query_string.filter(|raw| !raw.is_empty()) else {
        return false;
    };

    match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
        Ok(pairs) => pairs.iter().any(|(key, _)| key == "query"),
        Err(err) => {
            debug!("undecodable query string: {}", err);
            true
        }
    }
}

/// Upgrades a single-operation request to a batch once the body turned out to be a list.
pub fn classify_body(mode: RequestMode, operations: &OperationBatch) -> RequestMode {
    match (mode, operations.is_batch()) {
        (RequestMode::SingleOperation, true) => RequestMode::BatchOperation,
        _ => mode,
    }
}

/// Checks a batch against the batching configuration. `None` means batching is off.
pub fn validate_batch(
    requests: &[OperationRequest],
    mode: RequestMode,
    config: Option<&BatchingConfig>,
) -> Result<(), TransportError> {
    let Some(config) = config else {
        warn!("rejecting batch of {} operations, batching is disabled", requests.len());
        return Err(TransportError::BatchingDisabled);
    };

    if mode == RequestMode::MultipartSubscription {
        warn!("rejecting batch sent as a multipart subscription");
        return Err(TransportError::UnsupportedBatchMode);
    }

    if requests.len() > config.max_operations {
        warn!(
            "rejecting batch of {} operations, the limit is {}",
            requests.len(),
            config.max_operations
        );
        return Err(TransportError::TooManyOperations {
            max: config.max_operations,
            received: requests.len(),
        });
    }

    Ok(())
}
