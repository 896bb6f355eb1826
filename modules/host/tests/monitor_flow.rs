//! Monitor-thread integration: real plugins probed over real intervals.

mod common;

use std::time::Duration;

use common::{init_tracing, plugin_artifact, registry_with_monitor};
use hotplug_host::{HealthStatus, MonitorConfig};

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        check_interval_ms: 20,
        failure_threshold: 3,
    }
}

#[test]
fn test_loaded_module_reports_healthy_through_monitor() {
    init_tracing();
    let (registry, monitor) = registry_with_monitor(fast_config());

    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    monitor.start_monitoring();
    std::thread::sleep(Duration::from_millis(200));

    let record = monitor.module_health("Calculator").unwrap();
    assert_eq!(record.status, HealthStatus::Healthy);
    assert_ne!(record.message, "awaiting first check");
    assert_eq!(record.consecutive_failures, 0);
    assert!(record.response_time_ms >= 0.0);
    assert_eq!(monitor.system_health(), HealthStatus::Healthy);

    let metrics = monitor.metrics("Calculator").unwrap();
    assert_eq!(metrics.total_loads, 1);
    assert!(metrics.average_load_time > Duration::ZERO);

    monitor.stop_monitoring();
    registry.shutdown();
}

#[test]
fn test_unload_unregisters_probe() {
    init_tracing();
    let (registry, monitor) = registry_with_monitor(fast_config());

    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    assert!(monitor.module_health("Calculator").is_some());

    registry.unload("Calculator").unwrap();
    assert!(monitor.module_health("Calculator").is_none());
    assert!(monitor.metrics("Calculator").is_none());

    monitor.start_monitoring();
    std::thread::sleep(Duration::from_millis(100));
    // Nothing registered: the system cannot claim to be healthy.
    assert_eq!(monitor.system_health(), HealthStatus::Unhealthy);
    monitor.stop_monitoring();
}

#[test]
fn test_probe_goes_dark_with_registry() {
    init_tracing();
    let (registry, monitor) = registry_with_monitor(fast_config());
    registry.load(plugin_artifact("hotplug_calculator")).unwrap();

    assert!(registry.probe_health("Calculator"));
    registry.shutdown();
    assert!(!registry.probe_health("Calculator"));
}
