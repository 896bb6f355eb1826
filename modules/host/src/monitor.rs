//! Out-of-band health monitoring for loaded modules.
//!
//! The monitor owns a single dedicated thread that sweeps every registered
//! liveness probe once per interval, maintains per-module health and metrics
//! records, and derives a system-wide classification. No monitor lock is
//! ever held while a probe runs, so probes are free to call back into the
//! registry; conversely a module stuck in a lifecycle call cannot starve
//! monitoring of the others.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;

/// Classification of one module, or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Result of the most recent liveness sweep for one module.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub message: String,
    pub last_check: Instant,
    pub consecutive_failures: u32,
    /// Wall-clock cost of the probe in milliseconds; -1 when the probe
    /// raised instead of returning.
    pub response_time_ms: f64,
}

/// Operation bookkeeping per module name, fed by the registry.
#[derive(Debug, Clone)]
pub struct ModuleMetrics {
    pub total_loads: u64,
    pub total_unloads: u64,
    pub total_hot_swaps: u64,
    pub failed_operations: u64,
    pub total_uptime: Duration,
    pub average_load_time: Duration,
    pub last_operation: Instant,
}

impl Default for ModuleMetrics {
    fn default() -> Self {
        Self {
            total_loads: 0,
            total_unloads: 0,
            total_hot_swaps: 0,
            failed_operations: 0,
            total_uptime: Duration::ZERO,
            average_load_time: Duration::ZERO,
            last_operation: Instant::now(),
        }
    }
}

/// A module-supplied boolean liveness function.
pub type HealthProbe = Arc<dyn Fn() -> bool + Send + Sync + 'static>;

struct MonitorWorker {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

/// State shared between the public handle and the monitor thread.
struct MonitorShared {
    config: RwLock<MonitorConfig>,
    probes: RwLock<HashMap<String, HealthProbe>>,
    records: DashMap<String, HealthRecord>,
    metrics: DashMap<String, ModuleMetrics>,
    system_health: RwLock<HealthStatus>,
}

/// Periodic health checker and metrics sink.
pub struct HealthMonitor {
    shared: Arc<MonitorShared>,
    worker: Mutex<Option<MonitorWorker>>,
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        info!(
            "health monitor initialized (interval: {:?}, threshold: {})",
            config.check_interval(),
            config.failure_threshold
        );
        Self {
            shared: Arc::new(MonitorShared {
                config: RwLock::new(config),
                probes: RwLock::new(HashMap::new()),
                records: DashMap::new(),
                metrics: DashMap::new(),
                system_health: RwLock::new(HealthStatus::Healthy),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the monitor thread. Calling this on an already-monitoring
    /// instance is a no-op.
    pub fn start_monitoring(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("health monitoring already active");
            return;
        }

        info!(
            "starting health monitoring with interval {:?}",
            self.shared.config.read().check_interval()
        );

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let weak: Weak<MonitorShared> = Arc::downgrade(&self.shared);
        let thread = std::thread::spawn(move || {
            debug!("health monitor loop started");
            loop {
                // Interval is re-read every lap so runtime mutation through
                // set_check_interval takes effect without a restart.
                let interval = match weak.upgrade() {
                    Some(shared) => shared.config.read().check_interval(),
                    None => break,
                };
                match shutdown_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                shared.tick();
            }
            debug!("health monitor loop stopped");
        });

        *worker = Some(MonitorWorker {
            shutdown: shutdown_tx,
            thread,
        });
    }

    /// Signals the monitor thread and waits for it to exit. Idempotent.
    pub fn stop_monitoring(&self) {
        let worker = self.worker.lock().take();
        if let Some(MonitorWorker { shutdown, thread }) = worker {
            info!("stopping health monitoring");
            drop(shutdown);
            let _ = thread.join();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Adds a liveness probe under `name`. The first sweep has not happened
    /// yet, so the module starts out healthy with a placeholder message.
    pub fn register(
        &self,
        name: impl Into<String>,
        probe: impl Fn() -> bool + Send + Sync + 'static,
    ) {
        let name = name.into();
        info!("registering health check for module: {name}");
        self.shared
            .probes
            .write()
            .insert(name.clone(), Arc::new(probe));
        self.shared.records.insert(
            name.clone(),
            HealthRecord {
                status: HealthStatus::Healthy,
                message: "awaiting first check".to_string(),
                last_check: Instant::now(),
                consecutive_failures: 0,
                response_time_ms: 0.0,
            },
        );
        self.shared.metrics.entry(name).or_default();
    }

    /// Removes the probe and every record kept under `name`. Unknown names
    /// are ignored.
    pub fn unregister(&self, name: &str) {
        if self.shared.probes.write().remove(name).is_some() {
            info!("unregistering health check for module: {name}");
        }
        self.shared.records.remove(name);
        self.shared.metrics.remove(name);
    }

    pub fn module_health(&self, name: &str) -> Option<HealthRecord> {
        self.shared.records.get(name).map(|record| record.clone())
    }

    pub fn system_health(&self) -> HealthStatus {
        *self.shared.system_health.read()
    }

    pub fn metrics(&self, name: &str) -> Option<ModuleMetrics> {
        self.shared.metrics.get(name).map(|metrics| metrics.clone())
    }

    pub fn set_check_interval(&self, interval: Duration) {
        self.shared.config.write().check_interval_ms = interval.as_millis() as u64;
        info!("health check interval set to {interval:?}");
    }

    pub fn set_failure_threshold(&self, threshold: u32) {
        self.shared.config.write().failure_threshold = threshold;
        info!("failure threshold set to {threshold}");
    }

    /// Called by the registry when a load succeeds.
    pub fn record_load(&self, name: &str, load_time: Duration) {
        let mut metrics = self.shared.metrics.entry(name.to_string()).or_default();
        metrics.total_loads += 1;
        let n = metrics.total_loads as u32;
        metrics.average_load_time = (metrics.average_load_time * (n - 1) + load_time) / n;
        metrics.last_operation = Instant::now();
        debug!("recorded module load: {name} (time: {load_time:?})");
    }

    /// Called by the registry when a module is unloaded, with the session
    /// uptime to accumulate.
    pub fn record_unload(&self, name: &str, session_uptime: Duration) {
        let mut metrics = self.shared.metrics.entry(name.to_string()).or_default();
        metrics.total_unloads += 1;
        metrics.total_uptime += session_uptime;
        metrics.last_operation = Instant::now();
        debug!("recorded module unload: {name}");
    }

    /// Called by the registry on both outcomes of a hot-swap.
    pub fn record_hot_swap(&self, name: &str, success: bool) {
        let mut metrics = self.shared.metrics.entry(name.to_string()).or_default();
        metrics.total_hot_swaps += 1;
        if !success {
            metrics.failed_operations += 1;
        }
        metrics.last_operation = Instant::now();
        debug!("recorded hot-swap: {name} (success: {success})");
    }

    /// Emits the current state of every record through the logger.
    pub fn generate_report(&self) {
        info!("=== SYSTEM HEALTH REPORT ===");
        info!("system health: {}", self.system_health());
        for entry in self.shared.records.iter() {
            let record = entry.value();
            let staleness = record.last_check.elapsed().as_secs();
            info!(
                "module: {} | status: {} | response: {:.1}ms | failures: {} | last check: {}s ago",
                entry.key(),
                record.status,
                record.response_time_ms,
                record.consecutive_failures,
                staleness,
            );
        }
        info!("=== END HEALTH REPORT ===");
    }

    /// One sweep, synchronously. The monitor thread calls this on every
    /// interval lap.
    pub(crate) fn tick(&self) {
        self.shared.tick();
    }
}

impl MonitorShared {
    fn tick(&self) {
        self.run_health_checks();
        self.update_system_health();
        self.check_for_alerts();
    }

    fn run_health_checks(&self) {
        let probes: Vec<(String, HealthProbe)> = self
            .probes
            .read()
            .iter()
            .map(|(name, probe)| (name.clone(), Arc::clone(probe)))
            .collect();
        let threshold = self.config.read().failure_threshold;

        for (name, probe) in probes {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| probe()));
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let previous_failures = self
                .records
                .get(&name)
                .map(|record| record.consecutive_failures)
                .unwrap_or(0);

            let record = match outcome {
                Ok(true) => {
                    debug!("health check passed: {name} (response: {elapsed_ms:.1}ms)");
                    HealthRecord {
                        status: HealthStatus::Healthy,
                        message: "module is healthy".to_string(),
                        last_check: Instant::now(),
                        consecutive_failures: 0,
                        response_time_ms: elapsed_ms,
                    }
                }
                Ok(false) => {
                    let failures = previous_failures + 1;
                    if failures >= threshold {
                        error!("critical health failure: {name}");
                        HealthRecord {
                            status: HealthStatus::Critical,
                            message: format!(
                                "critically unhealthy - {failures} consecutive failures"
                            ),
                            last_check: Instant::now(),
                            consecutive_failures: failures,
                            response_time_ms: elapsed_ms,
                        }
                    } else {
                        warn!("health check failed: {name}");
                        HealthRecord {
                            status: HealthStatus::Unhealthy,
                            message: format!("unhealthy - {failures} consecutive failures"),
                            last_check: Instant::now(),
                            consecutive_failures: failures,
                            response_time_ms: elapsed_ms,
                        }
                    }
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!("health check raised for {name}: {reason}");
                    HealthRecord {
                        status: HealthStatus::Critical,
                        message: format!("health check raised: {reason}"),
                        last_check: Instant::now(),
                        consecutive_failures: previous_failures + 1,
                        response_time_ms: -1.0,
                    }
                }
            };

            // A concurrent unregister wins: never resurrect its records.
            if self.probes.read().contains_key(&name) {
                self.records.insert(name, record);
            }
        }
    }

    fn update_system_health(&self) {
        let mut healthy = 0usize;
        let mut degraded = 0usize;
        let mut critical = 0usize;
        for entry in self.records.iter() {
            match entry.value().status {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Degraded | HealthStatus::Unhealthy => degraded += 1,
                HealthStatus::Critical => critical += 1,
            }
        }

        let new_status = if critical > 0 {
            HealthStatus::Critical
        } else if degraded > 0 {
            HealthStatus::Degraded
        } else if healthy > 0 {
            HealthStatus::Healthy
        } else {
            // Nothing registered: the system cannot vouch for itself.
            HealthStatus::Unhealthy
        };

        let mut current = self.system_health.write();
        if *current != new_status {
            info!(
                "system health changed: {new_status} (healthy: {healthy}, degraded: {degraded}, critical: {critical})"
            );
        }
        *current = new_status;
    }

    fn check_for_alerts(&self) {
        for entry in self.records.iter() {
            let record = entry.value();
            if record.status == HealthStatus::Critical {
                error!(
                    "CRITICAL ALERT: module {} - {}",
                    entry.key(),
                    record.message
                );
            }
        }
        if *self.system_health.read() == HealthStatus::Critical {
            error!("SYSTEM CRITICAL ALERT: system health is CRITICAL");
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
