//! Tracing subscriber setup for binaries and tests.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the embedding
//! application.  [`init_tracing`] is the one `chatwire-chat` uses.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

use crate::error::{Error, Result};

static SUBSCRIBER_GUARD: OnceLock<()> = OnceLock::new();

/// Install a global fmt subscriber writing to stderr.
///
/// Idempotent, so tests and binaries may call it more than once.
pub fn init_tracing(filter: EnvFilter) -> Result<()> {
    if SUBSCRIBER_GUARD.get().is_some() {
        return Ok(());
    }

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::configuration(format!("cannot install tracing subscriber: {e}")))?;
    SUBSCRIBER_GUARD.set(()).ok();

    Ok(())
}

/// The filter `chatwire-chat` starts from: `RUST_LOG` if set, otherwise chatwire at `debug`
/// when verbose and `warn` when not.
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,chatwire=debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}
