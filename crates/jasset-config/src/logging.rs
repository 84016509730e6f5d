//! Structured logging utilities for jasset components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use jasset_config::{log_vfs_info, log_assetdb_warn};
//!
//! log_vfs_info!("Scan complete", entries = 42);
//! log_assetdb_warn!("Malformed sidecar", path = "hero.png.meta");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const VFS: &'static str = "VFS";
    pub const ASSETDB: &'static str = "ASSETDB";
    pub const PACK: &'static str = "PACK";
    pub const MONITOR: &'static str = "MONITOR";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Map a `-v` count to a level (0 = warn)
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

// === VFS logging macros ===

#[macro_export]
macro_rules! log_vfs_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "VFS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "VFS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "VFS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_vfs_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "VFS", $($key = $value,)* $msg)
    };
}

// === ASSETDB logging macros ===

#[macro_export]
macro_rules! log_assetdb_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "ASSETDB", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_assetdb_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "ASSETDB", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_assetdb_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "ASSETDB", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_assetdb_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "ASSETDB", $($key = $value,)* $msg)
    };
}

// === PACK logging macros ===

#[macro_export]
macro_rules! log_pack_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "PACK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_pack_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "PACK", $($key = $value,)* $msg)
    };
}

// === MONITOR logging macros ===

#[macro_export]
macro_rules! log_monitor_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "MONITOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_monitor_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "MONITOR", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup. Output goes to stderr.
///
/// `JASSET_LOG` wins over `RUST_LOG`, which wins over `level`.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("JASSET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
