pub mod classify;
pub mod codec;
pub mod engine;
pub mod error;
pub mod graphiql;
pub mod header;
pub mod multipart;
pub mod multipart_subscribe;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod upload_map;
pub mod websocket;

pub use classify::RequestMode;
pub use codec::{OperationBatch, OperationRequest};
pub use engine::{ExecutionEngine, ExecutionRequest, RequestContext};
pub use error::TransportError;
pub use pipeline::{GraphQLTransport, TransportResponse};
pub use request::RequestLike;
pub use response::{ExecutionResult, GraphQLError};

pub use async_trait::async_trait;
pub use graphql_transport_config as config;
