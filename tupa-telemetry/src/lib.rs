//! Tracing setup for the TUPA assistant.
//!
//! - [`init_telemetry`] installs human-readable logs filtered by `RUST_LOG`
//!   (default `info`).
//! - [`init_json_telemetry`] does the same with one JSON object per line.
//! - [`init_with_capture`] additionally records closed spans into a
//!   [`SpanStore`], grouped by the `query.id` of the enclosing query.

pub mod memory;

pub use memory::{CapturedSpan, QUERY_ID_FIELD, SpanCaptureLayer, SpanStore};

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a plain-text subscriber as the global default.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    tracing::info!(service = service_name, "telemetry initialized");
    Ok(())
}

/// Install a JSON-lines subscriber as the global default.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .try_init()?;
    tracing::info!(service = service_name, format = "json", "telemetry initialized");
    Ok(())
}

/// Install plain-text logging plus span capture into `store`.
pub fn init_with_capture(service_name: &str, store: SpanStore) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(SpanCaptureLayer::new(store))
        .try_init()?;
    tracing::info!(service = service_name, capture = true, "telemetry initialized");
    Ok(())
}

/// A subscriber that only captures spans, for scoped use in tests
/// via [`tracing::subscriber::set_default`].
pub fn capture_subscriber(store: SpanStore) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(SpanCaptureLayer::new(store))
}
