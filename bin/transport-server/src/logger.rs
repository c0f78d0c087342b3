use std::io::IsTerminal;

use graphql_transport_config::log::{LogFormat, LoggingConfig};
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub fn configure_logging(config: &LoggingConfig) {
    let timer = UtcTime::rfc_3339();
    let is_terminal = std::io::stdout().is_terminal();
    let filter = match EnvFilter::try_new(config.env_filter_str()) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!(
                "invalid log filter '{}', falling back to 'info': {}",
                config.env_filter_str(),
                err
            );
            EnvFilter::new("info")
        }
    };

    let layer = match config.format {
        LogFormat::Json => fmt::Layer::<Registry>::default()
            .json()
            .with_timer(timer)
            .with_thread_ids(false)
            .with_target(false)
            .flatten_event(true)
            .boxed(),
        LogFormat::Text => fmt::Layer::<Registry>::default()
            .compact()
            .with_timer(timer)
            .with_thread_ids(false)
            .with_target(false)
            .with_ansi(is_terminal)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter.boxed())
        .init();
}
