//! Tracing and logging support.
//!
//! Registries log lifecycle and dispatch through `tracing`; these helpers
//! install a subscriber for applications that do not bring their own.

#[cfg(feature = "tracing")]
pub use tracing::{self, debug, error, info, trace, warn};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

/// Tracing output format.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable multi-line output.
    Pretty,

    /// Single-line output.
    Compact,

    /// One JSON object per event.
    Json,
}

/// Tracing configuration.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter. `None` reads RUST_LOG, falling back to "info".
    pub level: Option<tracing::Level>,

    pub format: TracingFormat,

    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,

    pub thread_ids: bool,
}

#[cfg(feature = "tracing")]
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
            target: false,
            thread_ids: false,
        }
    }
}

/// Initialize a subscriber with default settings.
///
/// Honors RUST_LOG (`RUST_LOG=cogs_host=debug` shows dispatch phases).
/// Does nothing when a global subscriber is already installed.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    let _ = init_subscriber_with_config(TracingConfig::default());
}

/// Initialize a subscriber with custom configuration.
///
/// ```ignore
/// use cogs::tracing_support::{init_subscriber_with_config, TracingConfig, TracingFormat};
///
/// init_subscriber_with_config(TracingConfig {
///     format: TracingFormat::Json,
///     ..Default::default()
/// })?;
/// ```
#[cfg(feature = "tracing")]
pub fn init_subscriber_with_config(config: TracingConfig) -> Result<(), TryInitError> {
    let filter = match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt = tracing_subscriber::fmt::layer()
        .with_target(config.target)
        .with_thread_ids(config.thread_ids);
    let layer = match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => fmt.pretty().boxed(),
        (TracingFormat::Pretty, false) => fmt.pretty().without_time().boxed(),
        (TracingFormat::Compact, true) => fmt.compact().boxed(),
        (TracingFormat::Compact, false) => fmt.compact().without_time().boxed(),
        (TracingFormat::Json, true) => fmt.json().boxed(),
        (TracingFormat::Json, false) => fmt.json().without_time().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
}

// Fallback when tracing feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
