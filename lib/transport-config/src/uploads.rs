use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct UploadsConfig {
    /// Accept `multipart/form-data` requests following the GraphQL multipart request spec.
    ///
    /// Disabled by default. Can also be set via the `MULTIPART_UPLOADS_ENABLED` environment variable.
    #[serde(default)]
    pub enabled: bool,

    /// Reject uploads whose `map` does not exactly match the provided file parts.
    ///
    /// By default, map entries pointing at missing files and file parts absent from the map
    /// are dropped silently.
    #[serde(default)]
    pub strict: bool,
}
