//! Tracing subscriber setup for binaries and jobs embedding this crate.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log aggregation.
    #[default]
    Json,
    /// Human-readable single-line output.
    Pretty,
}

/// Install a global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `filter` (e.g. `"info,xavyo_directory_sync=debug"`).
/// Returns `false` when a subscriber was already installed or the filter
/// is invalid; calling this twice is harmless.
pub fn init_logging(filter: &str, format: LogFormat) -> bool {
    let filter_layer = match EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to create log filter: {e}");
            return false;
        }
    };

    let registry = tracing_subscriber::registry().with(filter_layer);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init().is_ok(),
    };

    if installed {
        tracing::info!(filter = %filter, ?format, "Logging initialized");
    }
    installed
}
