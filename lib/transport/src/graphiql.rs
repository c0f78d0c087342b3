use bytes::Bytes;
use graphql_transport_config::graphiql::{GraphQLIde, GraphiQLConfig};
use http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

static GRAPHIQL_HTML: &str = include_str!("../static/graphiql.html");
static APOLLO_SANDBOX_HTML: &str = include_str!("../static/apollo-sandbox.html");
static PATHFINDER_HTML: &str = include_str!("../static/pathfinder.html");

const ENDPOINT_PLACEHOLDER: &str = "__GRAPHQL_ENDPOINT__";

/// Renders the IDE page, pointed at `endpoint`.
pub fn render_ide(ide: GraphQLIde, endpoint: &str) -> String {
    let template = match ide {
        GraphQLIde::GraphiQL => GRAPHIQL_HTML,
        GraphQLIde::ApolloSandbox => APOLLO_SANDBOX_HTML,
        GraphQLIde::Pathfinder => PATHFINDER_HTML,
    };

    // a JS string literal that cannot close the surrounding <script>
    let endpoint = Value::String(endpoint.to_string())
        .to_string()
        .replace("</", "<\\/");
    template.replace(ENDPOINT_PLACEHOLDER, &endpoint)
}

pub fn ide_response(
    config: &GraphiQLConfig,
    endpoint: &str,
) -> Result<Response<Bytes>, TransportError> {
    if !config.enabled {
        debug!("IDE requested but disabled");
        return Err(TransportError::IdeDisabled);
    }

    let mut response = Response::new(Bytes::from(render_ide(config.ide, endpoint)));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Ok(response)
}
