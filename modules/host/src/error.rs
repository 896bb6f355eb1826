//! Error types for the plugin host

use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors surfaced by the loader, registry, and monitor
#[derive(Error, Debug)]
pub enum HostError {
    /// The OS loader rejected a shared-object path. The source error carries
    /// the loader's diagnostic verbatim.
    #[error("loader rejected {path}: {source}")]
    Loader {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol `{symbol}` missing from {path}: {source}")]
    SymbolMissing {
        symbol: String,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("{path} speaks factory protocol {found}, this host requires {expected}")]
    AbiMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("module at {path} refused init()")]
    InitFailed { path: PathBuf },

    #[error("module `{name}` refused start()")]
    StartFailed { name: String },

    #[error("module `{name}` is already registered")]
    NameCollision { name: String },

    #[error("no module registered under `{name}`")]
    NotFound { name: String },

    #[error("plugin code panicked during {operation} of `{name}`")]
    PluginPanic {
        name: String,
        operation: &'static str,
    },

    #[error("invalid host configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
