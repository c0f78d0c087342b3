use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The in-browser IDE served on `GET` requests that accept HTML.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct GraphiQLConfig {
    /// Serve the IDE at all (`GRAPHIQL_ENABLED`). When off, such requests get a `404`.
    #[serde(default = "ide_enabled")]
    pub enabled: bool,

    /// `graphiql`, `apollo-sandbox` or `pathfinder`.
    #[serde(default)]
    pub ide: GraphQLIde,
}

impl Default for GraphiQLConfig {
    fn default() -> Self {
        Self {
            enabled: ide_enabled(),
            ide: GraphQLIde::GraphiQL,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Copy, Default, PartialEq, Eq)]
pub enum GraphQLIde {
    #[default]
    #[serde(rename = "graphiql")]
    GraphiQL,
    #[serde(rename = "apollo-sandbox")]
    ApolloSandbox,
    #[serde(rename = "pathfinder")]
    Pathfinder,
}

fn ide_enabled() -> bool {
    true
}
