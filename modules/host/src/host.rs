//! Facade bundling the registry and the monitor into one host value.

use std::sync::Arc;

use tracing::info;

use crate::config::HostConfig;
use crate::monitor::HealthMonitor;
use crate::registry::ModuleRegistry;

/// The plugin host: one registry and one monitor, wired together.
///
/// Construct it once at startup and pass references around; there is no
/// hidden global instance anywhere in the crate.
pub struct PluginHost {
    monitor: Arc<HealthMonitor>,
    registry: Arc<ModuleRegistry>,
    config: HostConfig,
}

impl PluginHost {
    pub fn new(config: HostConfig) -> Self {
        info!("initializing plugin host");
        let monitor = Arc::new(HealthMonitor::new(config.monitor.clone()));
        let registry = Arc::new(ModuleRegistry::new(Arc::clone(&monitor)));
        Self {
            monitor,
            registry,
            config,
        }
    }

    /// Starts background health monitoring. Idempotent.
    pub fn start(&self) {
        self.monitor.start_monitoring();
    }

    /// Stops monitoring, then unloads every module. Idempotent.
    pub fn shutdown(&self) {
        info!("shutting down plugin host");
        self.monitor.stop_monitoring();
        self.registry.shutdown();
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::HealthStatus;

    #[test]
    fn test_host_wires_monitor_and_registry() {
        let host = PluginHost::default();
        assert!(!host.monitor().is_monitoring());
        assert_eq!(host.registry().count(), 0);

        host.start();
        host.start();
        assert!(host.monitor().is_monitoring());

        host.shutdown();
        host.shutdown();
        assert!(!host.monitor().is_monitoring());
        assert_eq!(host.monitor().system_health(), HealthStatus::Healthy);
    }
}
