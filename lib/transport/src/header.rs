use std::str::FromStr;

use headers_accept::Accept;
use http::header::ACCEPT;
use mediatype::{names, MediaType, MediaTypeList};
use tracing::error;

use crate::error::TransportError;

/// Non-GraphQL content type, used to detect if the client wants an IDE.
pub const TEXT_HTML_MIME: &str = "text/html";
const ANY_MIME: &str = "*/*";

/// Content type of a streamed multipart subscription response.
pub const MULTIPART_SUBSCRIPTION_CONTENT_TYPE: &str =
    r#"multipart/mixed; boundary=graphql; subscriptionSpec="1.0""#;

const MULTIPART_SUBSCRIPTION_BOUNDARY: &str = "graphql";
const MULTIPART_SUBSCRIPTION_SPEC_PREFIX: &str = "1.0";

const JSON_MEDIA_TYPE: MediaType = MediaType::new(names::APPLICATION, names::JSON);

const GRAPHQL_RESPONSE_JSON_MEDIA_TYPE: MediaType = MediaType::from_parts(
    names::APPLICATION,
    mediatype::Name::new_unchecked("graphql-response"),
    Some(names::JSON),
    &[],
);

const SUPPORTED_RESPONSE_MEDIA_TYPES: &[MediaType] =
    &[JSON_MEDIA_TYPE, GRAPHQL_RESPONSE_JSON_MEDIA_TYPE];

/// Content types of a non-streamed GraphQL response.
#[derive(PartialEq, Eq, Default, Debug, Clone, Copy)]
pub enum ResponseContentType {
    /// GraphQL over HTTP (`application/graphql-response+json`)
    ///
    /// Read more: https://graphql.github.io/graphql-over-http
    GraphQLResponseJSON,
    /// Legacy GraphQL over HTTP (`application/json`)
    #[default]
    JSON,
}

impl ResponseContentType {
    fn from_media_type(media_type: Option<&MediaType>) -> Option<ResponseContentType> {
        let media_type = media_type?;
        if media_type == &GRAPHQL_RESPONSE_JSON_MEDIA_TYPE {
            Some(ResponseContentType::GraphQLResponseJSON)
        } else if media_type == &JSON_MEDIA_TYPE {
            Some(ResponseContentType::JSON)
        } else {
            None
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResponseContentType::GraphQLResponseJSON => "application/graphql-response+json",
            ResponseContentType::JSON => "application/json",
        }
    }
}

/// Picks the response content type from the `Accept` header, respecting q-weights.
/// Falls back to `application/json` when nothing supported is listed.
pub fn negotiate_response_content_type(
    accept_header: Option<&str>,
) -> Result<ResponseContentType, TransportError> {
    let accept_header = accept_header.unwrap_or("").trim();
    if accept_header.is_empty() {
        return Ok(ResponseContentType::default());
    }

    let accept = Accept::from_str(accept_header).map_err(|err| {
        error!("Failed to parse Accept header: {}", err);
        TransportError::InvalidHeaderValue(ACCEPT)
    })?;

    Ok(
        ResponseContentType::from_media_type(accept.negotiate(SUPPORTED_RESPONSE_MEDIA_TYPES))
            .unwrap_or_default(),
    )
}

/// Whether an `Accept` header asks for something an IDE page satisfies.
pub fn accepts_html(accept_header: Option<&str>) -> bool {
    accept_header
        .map(|value| value.contains(TEXT_HTML_MIME) || value.contains(ANY_MIME))
        .unwrap_or(false)
}

/// Whether a header value lists `multipart/mixed` with `boundary=graphql` and a
/// `subscriptionSpec` starting with `1.0`. Parameter names are matched case-insensitively.
pub fn is_multipart_subscription(header_value: &str) -> bool {
    MediaTypeList::new(header_value)
        .filter_map(Result::ok)
        .any(|media_type| {
            media_type.ty == names::MULTIPART
                && media_type.subty == names::MIXED
                && param(&media_type, "boundary") == Some(MULTIPART_SUBSCRIPTION_BOUNDARY)
                && param(&media_type, "subscriptionspec")
                    .is_some_and(|spec| spec.starts_with(MULTIPART_SUBSCRIPTION_SPEC_PREFIX))
        })
}

fn param<'a>(media_type: &'a MediaType, name: &str) -> Option<&'a str> {
    media_type
        .params
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str().trim_matches('"'))
}

/// Kind of a POST body, judged by its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    MultipartFormData,
}

impl BodyKind {
    /// A missing `Content-Type` is read as JSON.
    pub fn from_content_type(content_type: Option<&str>) -> Result<BodyKind, TransportError> {
        let Some(content_type) = content_type else {
            return Ok(BodyKind::Json);
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" | "application/graphql-response+json" => Ok(BodyKind::Json),
            "multipart/form-data" => Ok(BodyKind::MultipartFormData),
            _ => Err(TransportError::UnsupportedContentType),
        }
    }
}
