use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Enables operation batching: a JSON array of operations in a single request.
///
/// Batching is disabled when this section is absent from the configuration.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BatchingConfig {
    /// The maximum number of operations accepted in one batch. A batch with exactly
    /// this many operations is accepted.
    ///
    /// Can also be set via the `BATCHING_MAX_OPERATIONS` environment variable.
    pub max_operations: usize,
}
