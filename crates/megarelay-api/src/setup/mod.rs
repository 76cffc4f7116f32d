//! Startup wiring: tracing, routes, and the HTTP server.

pub mod routes;
pub mod server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Console tracing: compact format, `RUST_LOG`-overridable filter.
pub fn init_tracing() {
    let console_fmt = tracing_subscriber::fmt::layer().event_format(
        tracing_subscriber::fmt::format::Format::default()
            .compact()
            .with_target(false),
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(console_fmt)
        .init();
}
