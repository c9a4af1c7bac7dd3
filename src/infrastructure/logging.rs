// Logging module - Diagnostic logging setup
use anyhow::Context;
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the diagnostic logging system.
///
/// Session bytes go to stdout; diagnostics always go to stderr so they
/// survive output redirection. Raise verbosity with RUST_LOG.
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termlink=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
