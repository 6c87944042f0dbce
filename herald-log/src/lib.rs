//! Herald Logging
//!
//! Installs a `tracing` subscriber configured from the environment. All
//! Herald crates log through `tracing` macros with structured fields
//! (`event_id`, `event_kind`, `handler`); this crate only decides where those
//! records go and how they look.
//!
//! # Usage
//!
//! ```rust,ignore
//! fn main() {
//!     herald_log::init();
//!     tracing::info!("dispatcher ready");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `HERALD_DEBUG=1` - Enable debug logging
//! - `HERALD_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `HERALD_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `RUST_LOG` - Full `EnvFilter` directives; overrides the level above

use once_cell::sync::OnceCell;
use std::env;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for Herald logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get level from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether to include the event target (module path)
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Create config from `(key, value)` pairs; unknown or invalid values fall back to defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut debug = false;
        let mut level = None;
        let mut format = None;
        let mut target = None;

        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "HERALD_DEBUG" => debug = is_truthy(value),
                "HERALD_LOG_LEVEL" => level = Level::parse(value),
                "HERALD_LOG_FORMAT" => format = Format::parse(value),
                "HERALD_LOG_TARGET" => target = Some(is_truthy(value)),
                _ => {}
            }
        }

        let defaults = Self::default();
        Self {
            level: level.unwrap_or(if debug { Level::Debug } else { defaults.level }),
            format: format.unwrap_or(defaults.format),
            target: target.unwrap_or(defaults.target),
        }
    }

    /// Default `EnvFilter` directive for this config
    pub fn filter_directive(&self) -> String {
        self.level.as_directive().to_string()
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

// ============================================================================
// Initialization
// ============================================================================

/// Logging initialization errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Logging has already been initialized")]
    AlreadyInitialized,

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install subscriber: {0}")]
    InstallFailed(String),
}

static INITIALIZED: OnceCell<LogConfig> = OnceCell::new();

/// Initialize logging from the environment, ignoring repeated calls.
pub fn init() {
    let _ = try_init_with(LogConfig::from_env());
}

/// Initialize logging from the environment.
pub fn try_init() -> Result<(), LogError> {
    try_init_with(LogConfig::from_env())
}

/// Initialize logging with an explicit config.
pub fn try_init_with(config: LogConfig) -> Result<(), LogError> {
    if INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::try_new(directives),
        Err(_) => EnvFilter::try_new(config.filter_directive()),
    }
    .map_err(|e| LogError::InvalidFilter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        Format::Pretty => registry
            .with(fmt::layer().pretty().with_target(config.target))
            .try_init(),
        Format::Compact => registry
            .with(fmt::layer().compact().with_target(config.target))
            .try_init(),
        #[cfg(feature = "json")]
        Format::Json => registry
            .with(fmt::layer().json().with_target(config.target))
            .try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => registry
            .with(fmt::layer().compact().with_target(config.target))
            .try_init(),
    };
    installed.map_err(|e| LogError::InstallFailed(e.to_string()))?;

    INITIALIZED
        .set(config)
        .map_err(|_| LogError::AlreadyInitialized)
}

/// Config the active subscriber was installed with, if any.
pub fn config() -> Option<&'static LogConfig> {
    INITIALIZED.get()
}
