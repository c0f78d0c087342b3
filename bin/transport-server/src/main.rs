mod engine;
mod error;
mod logger;
mod socket;
mod subscriptions;

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts, Request, State},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use graphql_transport::{
    config::load_config, websocket::requested_subprotocols, GraphQLTransport, TransportError,
    TransportResponse,
};
use http::{header, StatusCode};
use http_body_util::LengthLimitError;
use mimalloc::MiMalloc;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::{
    engine::EchoEngine, error::ServerInitError, logger::configure_logging, socket::AxumSocket,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

type Transport = GraphQLTransport<EchoEngine>;

#[tokio::main]
async fn main() -> Result<(), ServerInitError> {
    let config_path = std::env::var("TRANSPORT_CONFIG_FILE_PATH").ok();
    let config = load_config(config_path)?;
    configure_logging(&config.log);

    let address = config.http.address();
    let graphql_path = config.graphql_path().to_string();
    let transport = GraphQLTransport::new(EchoEngine::default(), config);

    let app = Router::new()
        .route(&graphql_path, any(graphql_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(transport);

    info!("Starting server on {}", address);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerInitError::Bind {
            address: address.clone(),
            source,
        })?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn is_websocket_upgrade(request: &Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

async fn graphql_handler(State(transport): State<Transport>, request: Request) -> Response {
    if transport.config().websocket.enabled && is_websocket_upgrade(&request) {
        return upgrade_websocket(transport, request).await;
    }

    let (parts, body) = request.into_parts();
    let limit = transport.config().http.max_request_body_size;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(err) => return into_axum_response(body_read_error(err, limit).into()),
    };

    into_axum_response(transport.handle_http(&parts, body).await)
}

async fn upgrade_websocket(transport: Transport, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let requested = requested_subprotocols(
        parts
            .headers
            .get_all(header::SEC_WEBSOCKET_PROTOCOL)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    );
    let upgrade = match transport.select_subprotocol(requested) {
        Some(protocol) => upgrade.protocols([protocol.as_str()]),
        None => upgrade,
    };

    let headers = parts.headers;
    upgrade.on_upgrade(move |socket| async move {
        match transport.accept_websocket(AxumSocket::new(socket)).await {
            Ok((mut client, protocol)) => {
                subscriptions::serve_connection(&transport, &mut client, protocol, &headers).await
            }
            Err(_rejected) => debug!("websocket rejected: no acceptable sub-protocol"),
        }
    })
}

/// Only an exceeded length limit is a 413. Other stream failures are read errors.
fn body_read_error(err: axum::Error, limit: usize) -> TransportError {
    let err = err.into_inner();
    if err.downcast_ref::<LengthLimitError>().is_some() {
        debug!("request body exceeds {} bytes", limit);
        TransportError::PayloadTooLarge(limit)
    } else {
        debug!("failed to read request body: {}", err);
        TransportError::BodyRead(err.to_string())
    }
}

fn into_axum_response(response: TransportResponse) -> Response {
    match response {
        TransportResponse::Complete(response) => response.map(Body::from),
        TransportResponse::Streaming {
            content_type,
            stream,
        } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type)],
            Body::from_stream(stream),
        )
            .into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
}
