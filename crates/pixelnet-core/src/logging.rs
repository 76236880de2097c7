use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs a global `tracing` subscriber writing to stderr.
///
/// The filter is taken from `RUST_LOG` and defaults to `info`. Layers log
/// creation and connection at `debug`, validation failures at `error`.
pub fn init_tracing() -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal());
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InitError::Subscriber(err.to_string()))
}

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}
