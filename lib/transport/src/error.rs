use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Response, StatusCode};
use serde::Serialize;
use strum::IntoStaticStr;
use tracing::error;

use crate::{
    classify::RequestMode,
    response::{GraphQLError, GraphQLErrorExtensions},
};

#[derive(Debug, thiserror::Error, IntoStaticStr)]
pub enum TransportError {
    // HTTP-related errors
    #[error("Unsupported HTTP method: {0}")]
    #[strum(serialize = "METHOD_NOT_ALLOWED")]
    MethodNotAllowed(Method),
    #[error("Header '{0}' has invalid value")]
    #[strum(serialize = "INVALID_HEADER")]
    InvalidHeaderValue(HeaderName),
    #[error("Unsupported content type")]
    #[strum(serialize = "UNSUPPORTED_CONTENT_TYPE")]
    UnsupportedContentType,
    #[error("Request body exceeds the maximum allowed size: {0}")]
    #[strum(serialize = "PAYLOAD_TOO_LARGE")]
    PayloadTooLarge(usize),
    #[error("Failed to read the request body: {0}")]
    #[strum(serialize = "BODY_READ_FAILED")]
    BodyRead(String),
    #[error("Queries are not allowed when using GET")]
    #[strum(serialize = "BAD_REQUEST")]
    QueriesViaGetDisabled,
    #[error("Not Found")]
    #[strum(serialize = "NOT_FOUND")]
    IdeDisabled,

    // Operation decoding
    #[error("Unable to parse request body as JSON")]
    #[strum(serialize = "BAD_REQUEST")]
    MalformedJson(#[source] sonic_rs::Error),
    #[error("No GraphQL query found in the request")]
    #[strum(serialize = "BAD_REQUEST")]
    MissingQuery,
    #[error("Invalid GraphQL request payload: {0}")]
    #[strum(serialize = "BAD_REQUEST")]
    InvalidOperations(String),

    // Batching
    #[error("Batching is not enabled")]
    #[strum(serialize = "BATCHING_DISABLED")]
    BatchingDisabled,
    #[error("Batching is not supported for multipart subscriptions")]
    #[strum(serialize = "BATCHING_NOT_SUPPORTED")]
    UnsupportedBatchMode,
    #[error("Too many operations")]
    #[strum(serialize = "TOO_MANY_OPERATIONS")]
    TooManyOperations { max: usize, received: usize },

    // Multipart uploads
    #[error("Multipart uploads are not enabled")]
    #[strum(serialize = "UNSUPPORTED_CONTENT_TYPE")]
    UploadsDisabled,
    #[error("Unable to parse the multipart body")]
    #[strum(serialize = "BAD_REQUEST")]
    MalformedMultipart(#[source] multer::Error),
    #[error("Missing multipart field: {0}")]
    #[strum(serialize = "BAD_REQUEST")]
    MissingMultipartField(&'static str),
    #[error("File upload path '{path}' does not resolve to a value in the operations")]
    #[strum(serialize = "BAD_REQUEST")]
    PathResolution { path: String },
    #[error("File upload map does not match the provided files: {0}")]
    #[strum(serialize = "BAD_REQUEST")]
    UploadMapMismatch(String),

    // Encoding
    #[error("Results of a {0:?} request cannot be encoded as a single response")]
    #[strum(serialize = "INTERNAL_SERVER_ERROR")]
    NotEncodable(RequestMode),
    #[error("Failed to serialize JSON: {0}")]
    #[strum(serialize = "INTERNAL_SERVER_ERROR")]
    Serialization(#[source] sonic_rs::Error),

    // WebSocket
    #[error("The WebSocket is closed")]
    #[strum(serialize = "SOCKET_CLOSED")]
    SocketClosed,
    #[error("The WebSocket is still open")]
    #[strum(serialize = "SOCKET_OPEN")]
    SocketStillOpen,
    #[error("Timed out waiting for a WebSocket message")]
    #[strum(serialize = "RECEIVE_TIMEOUT")]
    ReceiveTimeout,
    #[error("Unexpected WebSocket message: expected {0}")]
    #[strum(serialize = "UNEXPECTED_MESSAGE")]
    UnexpectedMessage(&'static str),
    #[error("WebSocket host failure: {0}")]
    #[strum(serialize = "INTERNAL_SERVER_ERROR")]
    Host(String),
}

impl TransportError {
    pub fn graphql_error_code(&self) -> &'static str {
        self.into()
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidHeaderValue(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::IdeDisabled => StatusCode::NOT_FOUND,
            Self::QueriesViaGetDisabled
            | Self::BodyRead(_)
            | Self::MalformedJson(_)
            | Self::MissingQuery
            | Self::InvalidOperations(_)
            | Self::BatchingDisabled
            | Self::UnsupportedBatchMode
            | Self::TooManyOperations { .. }
            | Self::UploadsDisabled
            | Self::MalformedMultipart(_)
            | Self::MissingMultipartField(_)
            | Self::PathResolution { .. }
            | Self::UploadMapMismatch(_) => StatusCode::BAD_REQUEST,
            Self::ReceiveTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::NotEncodable(_)
            | Self::Serialization(_)
            | Self::SocketClosed
            | Self::SocketStillOpen
            | Self::UnexpectedMessage(_)
            | Self::Host(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as a GraphQL response. Hosts decide whether to send it as-is.
    pub fn into_response(self) -> Response<Bytes> {
        let status = self.status_code();
        let error = GraphQLError::from_message_and_extensions(
            self.to_string(),
            GraphQLErrorExtensions::new_from_code(self.graphql_error_code()),
        );
        let body = FailedExecutionResult {
            errors: vec![error],
        };

        let bytes = match sonic_rs::to_vec(&body) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                error!("Failed to serialize error response: {}", err);
                Bytes::from_static(br#"{"errors":[{"message":"Internal Server Error"}]}"#)
            }
        };

        let mut response = Response::new(bytes);
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

#[derive(Serialize, Debug)]
struct FailedExecutionResult {
    errors: Vec<GraphQLError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_string(response: &Response<Bytes>) -> String {
        String::from_utf8(response.body().to_vec()).expect("body should be utf-8")
    }

    #[test]
    fn batching_errors_are_bad_requests() {
        for err in [
            TransportError::BatchingDisabled,
            TransportError::UnsupportedBatchMode,
            TransportError::TooManyOperations {
                max: 1,
                received: 2,
            },
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn renders_too_many_operations() {
        let response = TransportError::TooManyOperations {
            max: 2,
            received: 3,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        insta::assert_snapshot!(body_string(&response), @r#"{"errors":[{"message":"Too many operations","extensions":{"code":"TOO_MANY_OPERATIONS"}}]}"#);
    }

    #[test]
    fn renders_method_not_allowed() {
        let response = TransportError::MethodNotAllowed(Method::PUT).into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        insta::assert_snapshot!(body_string(&response), @r#"{"errors":[{"message":"Unsupported HTTP method: PUT","extensions":{"code":"METHOD_NOT_ALLOWED"}}]}"#);
    }

    #[test]
    fn malformed_json_keeps_a_stable_message() {
        let parse_error = sonic_rs::from_str::<serde_json::Value>("{").unwrap_err();
        let err = TransportError::MalformedJson(parse_error);

        assert_eq!(err.to_string(), "Unable to parse request body as JSON");
        assert_eq!(err.graphql_error_code(), "BAD_REQUEST");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
