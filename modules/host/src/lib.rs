//! # Hotplug Host
//!
//! Runtime plugin host: loads, hot-swaps, and unloads independently built
//! shared objects in a long-running process while a dedicated monitor thread
//! keeps watching their health. The registry owns every loaded object and
//! enforces the lifecycle; the monitor produces the signals a supervisor
//! uses to decide when to swap or roll back.

pub mod config;
pub mod error;
pub mod host;
pub mod library;
pub mod module;
pub mod monitor;
pub mod registry;

// Re-export public API
pub use config::{HostConfig, MonitorConfig};
pub use error::{HostError, HostResult};
pub use host::PluginHost;
pub use library::SharedLibrary;
pub use module::{ModuleInfo, ModuleState, PluginModule};
pub use monitor::{HealthMonitor, HealthRecord, HealthStatus, ModuleMetrics};
pub use registry::ModuleRegistry;
