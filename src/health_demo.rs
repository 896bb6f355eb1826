//! Health-monitor demo with synthetic probes: a stable module, a flaky one
//! that recovers, and one whose probe panics outright.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hotplug_host::{HealthMonitor, MonitorConfig};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let monitor = Arc::new(HealthMonitor::new(MonitorConfig {
        check_interval_ms: 500,
        failure_threshold: 3,
    }));

    monitor.register("stable", || true);

    // Fails five sweeps in a row, then recovers: crosses the threshold into
    // CRITICAL and comes back to HEALTHY.
    let sweeps = Arc::new(AtomicU32::new(0));
    let flaky_sweeps = Arc::clone(&sweeps);
    monitor.register("flaky", move || {
        let n = flaky_sweeps.fetch_add(1, Ordering::SeqCst);
        !(2..7).contains(&n)
    });

    monitor.register("broken", || panic!("probe lost its backing service"));

    monitor.start_monitoring();
    info!("watching synthetic modules for a while...");
    std::thread::sleep(Duration::from_secs(5));
    monitor.generate_report();

    info!("tightening the failure threshold at runtime");
    monitor.set_failure_threshold(1);
    monitor.set_check_interval(Duration::from_millis(250));
    std::thread::sleep(Duration::from_secs(2));
    monitor.generate_report();

    monitor.unregister("broken");
    std::thread::sleep(Duration::from_secs(1));
    info!("system health without the broken module: {}", monitor.system_health());

    monitor.stop_monitoring();
    info!("demo complete");
    Ok(())
}
