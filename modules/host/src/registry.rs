//! Name-keyed registry of live modules.
//!
//! Owns every loaded shared object together with the instance it produced,
//! drives instances through their lifecycle, and performs the hot-swap. One
//! mutex guards the whole map; every public operation holds it exclusively
//! for its duration, except that `reload` releases it between tearing down
//! the old entry and loading the replacement so a slow constructor cannot
//! stall unrelated callers.

use std::collections::HashMap;
use std::ffi::CStr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hotplug_plugin_api::{
    CreateModuleFn, DestroyModuleFn, ModuleTypeFn, ModuleVersionFn, ABI_VERSION,
    CREATE_MODULE_SYMBOL, DESTROY_MODULE_SYMBOL, MODULE_TYPE_SYMBOL, MODULE_VERSION_SYMBOL,
};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::{HostError, HostResult};
use crate::library::SharedLibrary;
use crate::module::{ModuleInfo, PluginModule};
use crate::monitor::HealthMonitor;

/// One registered module. Field order is load-bearing: the instance must be
/// destroyed before the loader handle that produced it is released.
struct ModuleEntry {
    module: PluginModule,
    #[allow(dead_code)]
    library: SharedLibrary,
    info: ModuleInfo,
    /// Serializes teardown: set before any teardown step runs so a
    /// reentrant request for the same name cannot start a second one.
    unload_pending: bool,
}

type ModuleMap = Mutex<HashMap<String, ModuleEntry>>;

/// Registry of loaded modules, shared between the host thread and the
/// monitor's liveness probes.
pub struct ModuleRegistry {
    modules: Arc<ModuleMap>,
    monitor: Arc<HealthMonitor>,
}

impl ModuleRegistry {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self {
            modules: Arc::new(Mutex::new(HashMap::new())),
            monitor,
        }
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Loads the shared object at `path`, drives the new instance through
    /// `init` and `start`, registers it under the name it reports, and hooks
    /// it into the health monitor. Returns the registered name.
    ///
    /// Any failure before registration tears the partial construction down
    /// in reverse order: instance first, loader handle last.
    pub fn load(&self, path: impl AsRef<Path>) -> HostResult<String> {
        let path = path.as_ref().to_path_buf();
        let load_started = Instant::now();
        info!("loading module from {}", path.display());

        let (library, mut module) = match self.construct(&path) {
            Ok(parts) => parts,
            Err(err) => {
                error!("failed to load {}: {err}", path.display());
                return Err(err);
            }
        };

        match module.init() {
            Ok(true) => {}
            Ok(false) => {
                error!("module at {} refused init()", path.display());
                return Err(HostError::InitFailed { path });
            }
            Err(err) => {
                error!("failed to load {}: {err}", path.display());
                return Err(err);
            }
        }

        let name = module.name().to_string();
        let version = module.version().to_string();
        let dependencies = module.dependencies();
        if !dependencies.is_empty() {
            debug!("module `{name}` declares dependencies {dependencies:?} (advisory)");
        }

        {
            let mut modules = self.modules.lock();
            if modules.contains_key(&name) {
                error!("module `{name}` is already registered; destroying the new instance");
                return Err(HostError::NameCollision { name });
            }

            // Started before insertion so no caller can observe an entry
            // that is not yet running.
            match module.start() {
                Ok(true) => {}
                Ok(false) => {
                    error!("module `{name}` refused start()");
                    return Err(HostError::StartFailed { name });
                }
                Err(err) => {
                    error!("failed to start module `{name}`: {err}");
                    return Err(err);
                }
            }

            let info = ModuleInfo {
                name: name.clone(),
                version: version.clone(),
                library_path: path.clone(),
                loaded_at: Utc::now(),
                is_running: true,
                is_healthy: true,
            };
            modules.insert(
                name.clone(),
                ModuleEntry {
                    module,
                    library,
                    info,
                    unload_pending: false,
                },
            );
        }

        let load_time = load_started.elapsed();
        self.monitor.record_load(&name, load_time);
        self.register_probe(&name);
        info!(
            "loaded module `{name}` v{version} from {} in {load_time:?}",
            path.display()
        );
        Ok(name)
    }

    /// Stops, cleans up, and destroys the module registered under `name`,
    /// then releases its loader handle.
    pub fn unload(&self, name: &str) -> HostResult<()> {
        info!("unloading module `{name}`");
        let mut modules = self.modules.lock();
        let Some(mut entry) = modules.remove(name) else {
            warn!("unload requested for unknown module `{name}`");
            return Err(HostError::NotFound {
                name: name.to_string(),
            });
        };

        let uptime = entry.info.uptime().to_std().unwrap_or_default();
        self.teardown(name, &mut entry);
        // Instance destroyed first, handle released second.
        drop(entry);
        drop(modules);

        self.monitor.record_unload(name, uptime);
        info!("unloaded module `{name}`");
        Ok(())
    }

    /// Hot-swap: tears down the current registration of `name` and loads a
    /// fresh instance from the same origin path. On load failure the old
    /// instance is already gone and the monitor records a failed swap;
    /// rollback is the caller's decision.
    pub fn reload(&self, name: &str) -> HostResult<String> {
        info!("hot-swapping module `{name}`");
        let path = {
            let modules = self.modules.lock();
            match modules.get(name) {
                Some(entry) => entry.info.library_path.clone(),
                None => {
                    warn!("reload requested for unknown module `{name}`");
                    return Err(HostError::NotFound {
                        name: name.to_string(),
                    });
                }
            }
        };

        self.unload(name)?;

        // The lock is deliberately not held across the rebuild.
        match self.load(&path) {
            Ok(new_name) => {
                self.monitor.record_hot_swap(name, true);
                info!("hot-swap completed: `{name}` -> `{new_name}`");
                Ok(new_name)
            }
            Err(err) => {
                error!("hot-swap failed for `{name}`: {err}; the module remains unloaded");
                self.monitor.record_hot_swap(name, false);
                Err(err)
            }
        }
    }

    /// Borrows the live instance under `name`. The borrow is scoped to the
    /// registry lock; callers needing anything longer must copy the
    /// [`ModuleInfo`] instead.
    pub fn get(&self, name: &str) -> Option<MappedMutexGuard<'_, PluginModule>> {
        let guard = self.modules.lock();
        MutexGuard::try_map(guard, |modules| {
            modules
                .get_mut(name)
                .filter(|entry| !entry.unload_pending)
                .map(|entry| &mut entry.module)
        })
        .ok()
    }

    /// Snapshot of the registration under `name`.
    pub fn info(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.lock().get(name).map(|entry| entry.info.clone())
    }

    /// Registered names, sorted for stable output.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.lock().contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.modules.lock().len()
    }

    /// Liveness indirection invoked by the monitor's registered probe.
    /// Unwinds out of plugin code pass through to the monitor's own catch.
    pub fn probe_health(&self, name: &str) -> bool {
        probe_entry(&self.modules, name)
    }

    /// Tears down every registration. Safe to call repeatedly; a shutdown
    /// of an empty registry is a no-op.
    pub fn shutdown(&self) {
        let mut modules = self.modules.lock();
        if modules.is_empty() {
            debug!("registry shutdown: nothing loaded");
            return;
        }
        info!("shutting down module registry ({} modules)", modules.len());

        let names: Vec<String> = modules.keys().cloned().collect();
        for name in names {
            if let Some(mut entry) = modules.remove(&name) {
                let uptime = entry.info.uptime().to_std().unwrap_or_default();
                self.teardown(&name, &mut entry);
                drop(entry);
                self.monitor.record_unload(&name, uptime);
                info!("unloaded module `{name}`");
            }
        }
    }

    /// Logs every shared object currently mapped into the process, marking
    /// the ones this registry manages. Diagnostic only.
    #[cfg(target_os = "linux")]
    pub fn scan_runtime_shared_libraries(&self) -> HostResult<()> {
        use std::collections::BTreeSet;

        let maps = std::fs::read_to_string("/proc/self/maps")?;
        let mut mapped: BTreeSet<String> = BTreeSet::new();
        for line in maps.lines() {
            if let Some(idx) = line.find('/') {
                let path = &line[idx..];
                if path.contains(".so") {
                    mapped.insert(path.to_string());
                }
            }
        }

        let managed: HashMap<String, String> = {
            let modules = self.modules.lock();
            modules
                .iter()
                .map(|(name, entry)| {
                    let origin = std::fs::canonicalize(&entry.info.library_path)
                        .unwrap_or_else(|_| entry.info.library_path.clone());
                    (origin.display().to_string(), name.clone())
                })
                .collect()
        };

        info!(
            "runtime shared-library scan: {} shared objects mapped",
            mapped.len()
        );
        for path in &mapped {
            match managed.get(path) {
                Some(name) => info!("  MANAGED   {path} (module `{name}`)"),
                None => info!("  UNMANAGED {path}"),
            }
        }
        for (path, name) in &managed {
            if !mapped.contains(path) {
                warn!("managed module `{name}` origin {path} is absent from the process map");
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn scan_runtime_shared_libraries(&self) -> HostResult<()> {
        debug!("runtime shared-library scan is only implemented on Linux");
        Ok(())
    }

    /// Everything `load` does before the instance can identify itself:
    /// open the object, resolve the factory symbols, check the protocol
    /// version, and construct the instance.
    fn construct(&self, path: &Path) -> HostResult<(SharedLibrary, PluginModule)> {
        let library = SharedLibrary::open(path)?;
        // SAFETY: the requested types are the ABI contract for these
        // symbols, and every resolved pointer is used while `library` lives.
        let (create, destroy, module_type, abi_version) = unsafe {
            let create: CreateModuleFn = library.symbol(CREATE_MODULE_SYMBOL)?;
            let destroy: DestroyModuleFn = library.symbol(DESTROY_MODULE_SYMBOL)?;
            let module_type: ModuleTypeFn = library.symbol(MODULE_TYPE_SYMBOL)?;
            let abi_version: ModuleVersionFn = library.symbol(MODULE_VERSION_SYMBOL)?;
            (create, destroy, module_type, abi_version)
        };

        let found = unsafe { abi_version() };
        if found != ABI_VERSION {
            return Err(HostError::AbiMismatch {
                path: path.to_path_buf(),
                expected: ABI_VERSION,
                found,
            });
        }

        // SAFETY: getModuleType returns a static NUL-terminated string.
        let family = unsafe { CStr::from_ptr(module_type()) }
            .to_string_lossy()
            .into_owned();
        debug!("{} exports module family `{family}`", path.display());

        // SAFETY: createModule is the paired constructor for `destroy`.
        let raw = catch_unwind(AssertUnwindSafe(|| unsafe { create() })).map_err(|_| {
            HostError::PluginPanic {
                name: path.display().to_string(),
                operation: "createModule",
            }
        })?;
        if raw.is_null() {
            warn!("createModule in {} returned null", path.display());
            return Err(HostError::InitFailed {
                path: path.to_path_buf(),
            });
        }

        // SAFETY: `raw` came from this object's createModule and `library`
        // outlives the wrapper by the entry's field order.
        let module = unsafe { PluginModule::from_raw(raw, destroy) }?;
        Ok((library, module))
    }

    fn register_probe(&self, name: &str) {
        let weak = Arc::downgrade(&self.modules);
        let probe_name = name.to_string();
        self.monitor.register(name, move || match weak.upgrade() {
            Some(modules) => probe_entry(&modules, &probe_name),
            None => false,
        });
    }

    /// Walks a removed entry through `stop` and `cleanup`, logging refusals
    /// instead of failing: teardown always completes. The monitor callback
    /// is unregistered first so no probe runs between teardown steps.
    fn teardown(&self, name: &str, entry: &mut ModuleEntry) {
        entry.unload_pending = true;
        self.monitor.unregister(name);
        entry.info.is_running = false;

        match entry.module.stop() {
            Ok(true) => {}
            Ok(false) => warn!("module `{name}` refused stop() during teardown"),
            Err(err) => error!("teardown of `{name}`: {err}"),
        }
        match entry.module.cleanup() {
            Ok(true) => {}
            Ok(false) => warn!("module `{name}` refused cleanup() during teardown"),
            Err(err) => error!("teardown of `{name}`: {err}"),
        }
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn probe_entry(modules: &ModuleMap, name: &str) -> bool {
    let mut modules = modules.lock();
    match modules.get_mut(name) {
        Some(entry) if !entry.unload_pending => {
            let healthy = entry.module.probe_health();
            entry.info.is_healthy = healthy;
            healthy
        }
        _ => false,
    }
}
