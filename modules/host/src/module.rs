//! Host-side view of one plugin instance.
//!
//! [`PluginModule`] owns the opaque instance pointer together with the
//! `destroyModule` symbol captured at load time, and is the only place that
//! calls through the instance vtable. Lifecycle entry points are wrapped in
//! a panic guard so a misbehaving plugin surfaces as an error instead of
//! tearing the host down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hotplug_plugin_api::{DestroyModuleFn, ModuleVTable, RawModule, StrView};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{HostError, HostResult};

/// Lifecycle of a single instance as the host has driven it. Destruction is
/// not a state: a destroyed instance no longer exists on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Constructed,
    Inited,
    Running,
    Stopped,
}

/// Point-in-time snapshot of a registered module. Copies do not track later
/// registry mutations.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub library_path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub is_running: bool,
    pub is_healthy: bool,
}

impl ModuleInfo {
    /// Time elapsed since the module was loaded.
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.loaded_at
    }
}

/// Owner of one live plugin instance.
///
/// Drop invokes the captured destructor exactly once. The value must be
/// dropped before the [`SharedLibrary`](crate::library::SharedLibrary) it
/// was produced from; the registry entry encodes that order structurally.
pub struct PluginModule {
    raw: *mut RawModule,
    vtable: *const ModuleVTable,
    destroy: DestroyModuleFn,
    name: String,
    version: String,
    state: ModuleState,
}

// SAFETY: the plugin contract requires instances to tolerate calls from any
// host thread (the monitor probes from its own thread), and the host never
// aliases the raw pointer outside the registry lock.
unsafe impl Send for PluginModule {}
unsafe impl Sync for PluginModule {}

impl PluginModule {
    /// Adopts a freshly constructed instance.
    ///
    /// # Safety
    ///
    /// `raw` must come from the `createModule` of the same shared object
    /// that exported `destroy`, and that object must stay mapped for the
    /// lifetime of the returned value.
    pub unsafe fn from_raw(raw: *mut RawModule, destroy: DestroyModuleFn) -> HostResult<Self> {
        let vtable = unsafe { (*raw).vtable };
        let identity = catch_unwind(AssertUnwindSafe(|| unsafe {
            let vt = &*vtable;
            let name = (vt.name)(raw.cast_const()).as_str().to_owned();
            let version = (vt.version)(raw.cast_const()).as_str().to_owned();
            (name, version)
        }));
        let (name, version) = match identity {
            Ok(identity) => identity,
            Err(_) => {
                // The instance exists, so it still has to be handed back.
                let _ = catch_unwind(AssertUnwindSafe(|| unsafe { (destroy)(raw) }));
                return Err(HostError::PluginPanic {
                    name: "<unidentified>".to_string(),
                    operation: "identity",
                });
            }
        };
        Ok(Self {
            raw,
            vtable,
            destroy,
            name,
            version,
            state: ModuleState::Constructed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn init(&mut self) -> HostResult<bool> {
        debug_assert_eq!(self.state, ModuleState::Constructed);
        let ok = self.lifecycle_call("init", |vt| vt.init)?;
        if ok {
            self.state = ModuleState::Inited;
        }
        Ok(ok)
    }

    pub fn start(&mut self) -> HostResult<bool> {
        debug_assert_eq!(self.state, ModuleState::Inited);
        let ok = self.lifecycle_call("start", |vt| vt.start)?;
        if ok {
            self.state = ModuleState::Running;
        }
        Ok(ok)
    }

    pub fn stop(&mut self) -> HostResult<bool> {
        debug_assert_eq!(self.state, ModuleState::Running);
        let ok = self.lifecycle_call("stop", |vt| vt.stop)?;
        if ok {
            self.state = ModuleState::Stopped;
        }
        Ok(ok)
    }

    pub fn cleanup(&mut self) -> HostResult<bool> {
        self.lifecycle_call("cleanup", |vt| vt.cleanup)
    }

    /// Panic-guarded liveness query for callers outside the monitor path.
    pub fn is_healthy(&self) -> HostResult<bool> {
        let raw = self.raw.cast_const();
        let vtable = self.vtable;
        catch_unwind(AssertUnwindSafe(|| unsafe { ((*vtable).is_healthy)(raw) })).map_err(|_| {
            HostError::PluginPanic {
                name: self.name.clone(),
                operation: "is_healthy",
            }
        })
    }

    /// Liveness probe without a panic guard. The monitor invokes predicates
    /// under its own catch and classifies an unwind as a raised check, so
    /// this path must let the panic through.
    pub(crate) fn probe_health(&self) -> bool {
        // SAFETY: vtable and instance are valid while self lives.
        unsafe { ((*self.vtable).is_healthy)(self.raw.cast_const()) }
    }

    /// The advisory dependency list. Recorded and logged, never enforced.
    pub fn dependencies(&self) -> Vec<String> {
        let raw = self.raw.cast_const();
        let vtable = self.vtable;
        let collected = catch_unwind(AssertUnwindSafe(|| unsafe {
            let vt = &*vtable;
            let count = (vt.dependencies)(raw, std::ptr::null_mut(), 0);
            if count == 0 {
                return Vec::new();
            }
            let mut views = vec![StrView::empty(); count];
            let written = (vt.dependencies)(raw, views.as_mut_ptr(), views.len());
            views.truncate(written.min(count));
            views.iter().map(|view| view.as_str().to_owned()).collect()
        }));
        match collected {
            Ok(deps) => deps,
            Err(_) => {
                warn!(
                    "plugin `{}` panicked while reporting dependencies",
                    self.name
                );
                Vec::new()
            }
        }
    }

    fn lifecycle_call(
        &mut self,
        operation: &'static str,
        select: impl FnOnce(&ModuleVTable) -> unsafe extern "C-unwind" fn(*mut RawModule) -> bool,
    ) -> HostResult<bool> {
        let raw = self.raw;
        let vtable = self.vtable;
        catch_unwind(AssertUnwindSafe(|| unsafe {
            let entry = select(&*vtable);
            entry(raw)
        }))
        .map_err(|_| HostError::PluginPanic {
            name: self.name.clone(),
            operation,
        })
    }
}

impl Drop for PluginModule {
    fn drop(&mut self) {
        // SAFETY: raw came from the paired createModule and is dropped once.
        let result = catch_unwind(AssertUnwindSafe(|| unsafe { (self.destroy)(self.raw) }));
        if result.is_err() {
            error!(
                "CRITICAL ALERT: plugin `{}` panicked inside destroyModule; instance leaked",
                self.name
            );
        }
    }
}
