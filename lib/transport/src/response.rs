use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the execution engine hands back for one operation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl ExecutionResult {
    pub fn from_data(data: Value) -> Self {
        ExecutionResult {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn from_error(error: GraphQLError) -> Self {
        ExecutionResult {
            errors: Some(vec![error]),
            ..Default::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// The wire shape of an [`ExecutionResult`]: absent keys are omitted, empty error lists too.
#[derive(Debug, Serialize)]
pub struct GraphQLHttpResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'a [GraphQLError]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<&'a Map<String, Value>>,
}

impl<'a> From<&'a ExecutionResult> for GraphQLHttpResponse<'a> {
    fn from(result: &'a ExecutionResult) -> Self {
        GraphQLHttpResponse {
            data: result.data.as_ref(),
            errors: result
                .errors
                .as_deref()
                .filter(|errors| !errors.is_empty()),
            extensions: result.extensions.as_ref().filter(|ext| !ext.is_empty()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "GraphQLErrorExtensions::is_empty")]
    pub extensions: GraphQLErrorExtensions,
}

impl GraphQLError {
    pub fn from_message_and_extensions(
        message: impl Into<String>,
        extensions: GraphQLErrorExtensions,
    ) -> Self {
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
            extensions,
        }
    }
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError::from_message_and_extensions(message, GraphQLErrorExtensions::default())
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        GraphQLError::from(message.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GraphQLErrorExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphQLErrorExtensions {
    pub fn new_from_code(code: impl Into<String>) -> Self {
        GraphQLErrorExtensions {
            code: Some(code.into()),
            extra: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn omits_absent_and_empty_keys() {
        let result = ExecutionResult {
            data: Some(json!({"hello": "world"})),
            errors: Some(vec![]),
            extensions: Some(Map::new()),
        };

        let encoded = sonic_rs::to_string(&GraphQLHttpResponse::from(&result)).unwrap();
        insta::assert_snapshot!(encoded, @r#"{"data":{"hello":"world"}}"#);
    }

    #[test]
    fn keeps_null_data_next_to_errors() {
        let mut result = ExecutionResult::from_error(GraphQLError::from_message_and_extensions(
            "boom",
            GraphQLErrorExtensions::new_from_code("INTERNAL"),
        ));
        result.data = Some(Value::Null);

        let encoded = sonic_rs::to_string(&GraphQLHttpResponse::from(&result)).unwrap();
        insta::assert_snapshot!(encoded, @r#"{"data":null,"errors":[{"message":"boom","extensions":{"code":"INTERNAL"}}]}"#);
    }

    #[test]
    fn error_extensions_keep_custom_fields() {
        let error: GraphQLError = serde_json::from_value(json!({
            "message": "denied",
            "path": ["user", 0, "email"],
            "extensions": {"code": "FORBIDDEN", "reason": "scope"}
        }))
        .unwrap();

        assert_eq!(error.extensions.code.as_deref(), Some("FORBIDDEN"));
        assert_eq!(error.extensions.extra.get("reason"), Some(&json!("scope")));
        assert_eq!(error.path.as_ref().map(Vec::len), Some(3));
    }
}
