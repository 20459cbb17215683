//! Logging setup: fmt layer plus `RUST_LOG`-style env filter.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

const ENV_LOG_JSON: &str = "FOLIO_LOG_JSON";

/// Initialize the global tracing subscriber.
///
/// The default directive comes from the `-v` count; `RUST_LOG` still wins when
/// set. `FOLIO_LOG_JSON=1` switches to JSON output for log shippers.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<Level>) -> Result<()> {
    let level = level.unwrap_or(Level::ERROR);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|value| value == "1" || value == "true");

    let fmt_layer = if json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(false)
            .boxed()
    };

    let subscriber = Registry::default().with(fmt_layer).with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
