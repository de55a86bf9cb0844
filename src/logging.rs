//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate in
//! verbose mode.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init(verbose: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already set");
        }
    });
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "info,animator=debug" } else { "info" }
}
