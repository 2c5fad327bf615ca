//! Logging initialization
//!
//! Sets up a tracing-subscriber fmt sink with env-filter support and bridges
//! the `log` facade into it, so records from this crate and from dependencies
//! (teloxide, axum, reqwest) end up in one place.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global logger.
///
/// The filter is taken from `RUST_LOG` when set, defaulting to `info`.
/// Must be called once, before anything logs.
pub fn init_logger() -> Result<()> {
    tracing_log::LogTracer::init().context("install log-to-tracing bridge")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("set global tracing subscriber")?;

    Ok(())
}
