use std::fmt;

use bytes::Bytes;
use serde::{
    de::{
        value::{MapAccessDeserializer, SeqAccessDeserializer},
        MapAccess, SeqAccess, Visitor,
    },
    Deserialize, Deserializer, Serialize,
};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::{
    classify::RequestMode,
    error::TransportError,
    response::{ExecutionResult, GraphQLHttpResponse},
};

/// One GraphQL operation as sent by a client.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl OperationRequest {
    pub fn query(&self) -> Result<&str, TransportError> {
        self.query.as_deref().ok_or(TransportError::MissingQuery)
    }
}

/// A request body holds either one operation or a list of them.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationBatch {
    Single(OperationRequest),
    Batch(Vec<OperationRequest>),
}

impl OperationBatch {
    pub fn from_value(value: Value) -> Result<Self, TransportError> {
        OperationBatch::deserialize(value).map_err(|err| {
            warn!("Invalid GraphQL request payload: {}", err);
            TransportError::InvalidOperations(err.to_string())
        })
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, OperationBatch::Batch(_))
    }

    pub fn into_vec(self) -> Vec<OperationRequest> {
        match self {
            OperationBatch::Single(request) => vec![request],
            OperationBatch::Batch(requests) => requests,
        }
    }
}

impl<'de> Deserialize<'de> for OperationBatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OperationBatchVisitor;

        impl<'de> Visitor<'de> for OperationBatchVisitor {
            type Value = OperationBatch;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a GraphQL request or a list of GraphQL requests")
            }

            fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                Vec::<OperationRequest>::deserialize(SeqAccessDeserializer::new(seq))
                    .map(OperationBatch::Batch)
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                OperationRequest::deserialize(MapAccessDeserializer::new(map))
                    .map(OperationBatch::Single)
            }
        }

        deserializer.deserialize_any(OperationBatchVisitor)
    }
}

/// What the engine produced for a request, mirroring [`OperationBatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionOutcome {
    Single(ExecutionResult),
    Batch(Vec<ExecutionResult>),
}

/// Parses a request body into a JSON value of any shape.
pub fn decode_body(raw: &[u8]) -> Result<Value, TransportError> {
    sonic_rs::from_slice::<Value>(raw).map_err(|err| {
        warn!("Failed to parse body: {}", err);
        TransportError::MalformedJson(err)
    })
}

#[derive(Deserialize, Debug, Default)]
pub struct GetQueryParams {
    pub query: Option<String>,
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
    pub variables: Option<String>,
    pub extensions: Option<String>,
}

impl GetQueryParams {
    pub fn from_query_string(query_string: Option<&str>) -> Result<Self, TransportError> {
        match query_string {
            Some(raw) if !raw.is_empty() => serde_urlencoded::from_str(raw).map_err(|err| {
                warn!("Failed to parse query string: {}", err);
                TransportError::InvalidOperations(err.to_string())
            }),
            _ => Ok(GetQueryParams::default()),
        }
    }
}

/// Builds an operation from GET query parameters. `variables` and `extensions`
/// carry JSON themselves and are decoded when present and non-empty.
pub fn decode_query_params(params: GetQueryParams) -> Result<OperationRequest, TransportError> {
    trace!("decoding GET query params: {:?}", params);

    Ok(OperationRequest {
        query: params.query,
        operation_name: params.operation_name,
        variables: decode_json_param("variables", params.variables.as_deref())?,
        extensions: decode_json_param("extensions", params.extensions.as_deref())?,
    })
}

fn decode_json_param(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<Map<String, Value>>, TransportError> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    match decode_body(raw.as_bytes())? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        _ => Err(TransportError::InvalidOperations(format!(
            "\"{}\" must be a JSON object",
            name
        ))),
    }
}

/// Decodes the operations of a JSON body (or of a bound multipart `operations` field).
pub fn decode_operations(value: Value) -> Result<OperationBatch, TransportError> {
    OperationBatch::from_value(value)
}

/// Encodes results for single-operation and batch requests. Other modes are
/// answered by their own writers.
pub fn encode(outcome: &ExecutionOutcome, mode: RequestMode) -> Result<Bytes, TransportError> {
    match mode {
        RequestMode::SingleOperation | RequestMode::BatchOperation => {}
        RequestMode::IdeRender | RequestMode::MultipartSubscription => {
            return Err(TransportError::NotEncodable(mode));
        }
    }

    let encoded = match outcome {
        ExecutionOutcome::Single(result) => sonic_rs::to_vec(&GraphQLHttpResponse::from(result)),
        ExecutionOutcome::Batch(results) => sonic_rs::to_vec(
            &results
                .iter()
                .map(GraphQLHttpResponse::from)
                .collect::<Vec<_>>(),
        ),
    };

    encoded.map(Bytes::from).map_err(TransportError::Serialization)
}

pub fn encode_result(result: &ExecutionResult) -> Result<Bytes, TransportError> {
    sonic_rs::to_vec(&GraphQLHttpResponse::from(result))
        .map(Bytes::from)
        .map_err(TransportError::Serialization)
}
