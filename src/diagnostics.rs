//! Convenience tracing-subscriber setup.
//!
//! This crate never installs a global subscriber on its own: every internal
//! event goes through ordinary `tracing` macros and it is the embedding
//! application's job to wire up a subscriber, as with any `tracing`-based
//! library. [`init_stderr`] exists for quick setups and tests, mirroring the
//! teacher crate's `init_global_if_needed`.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs a stderr-writing subscriber filtered by `RUST_LOG` (defaulting
/// to `info`). Returns `Err` if a global subscriber is already set; callers
/// that only want a best-effort setup can ignore the result.
pub fn init_stderr() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_span_events(FmtSpan::NONE)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::builder().with_default_directive(tracing::Level::INFO.into()).from_env_lossy();

    let subscriber = Registry::default().with(filter).with(console_layer);
    tracing::subscriber::set_global_default(subscriber)
}
