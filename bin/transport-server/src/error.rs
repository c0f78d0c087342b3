use graphql_transport_config::TransportConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ServerInitError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] TransportConfigError),
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server failed: {0}")]
    Serve(#[from] std::io::Error),
}
