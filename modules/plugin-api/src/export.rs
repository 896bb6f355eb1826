//! Plugin-side exports: the [`Module`] trait, the instance shell, and the
//! [`declare_module!`] glue that turns an implementation into the four
//! factory symbols.

use crate::abi::{ModuleVTable, RawModule, StrView};

/// What a plugin implements. The host drives instances through
/// `init → start → stop → cleanup` and polls `is_healthy` from its monitor
/// thread, so implementations must tolerate calls from threads other than
/// the one that constructed them.
pub trait Module: Send {
    fn init(&mut self) -> bool;
    fn start(&mut self) -> bool;
    fn stop(&mut self) -> bool;
    fn cleanup(&mut self) -> bool;

    fn name(&self) -> &str;
    fn version(&self) -> &str;

    fn is_healthy(&self) -> bool;

    /// Names of modules this one expects to be present. Advisory only.
    fn dependencies(&self) -> &[String] {
        &[]
    }
}

/// Concrete layout behind a `*mut RawModule`: the ABI header followed by the
/// plugin's own state. The header must stay the first field.
#[repr(C)]
pub struct ModuleShell<T> {
    #[allow(dead_code)]
    header: RawModule,
    inner: T,
}

trait HasVTable: Module + Sized {
    const VTABLE: ModuleVTable;
}

impl<T: Module> HasVTable for T {
    const VTABLE: ModuleVTable = ModuleVTable {
        init: init_shim::<T>,
        start: start_shim::<T>,
        stop: stop_shim::<T>,
        cleanup: cleanup_shim::<T>,
        name: name_shim::<T>,
        version: version_shim::<T>,
        is_healthy: is_healthy_shim::<T>,
        dependencies: dependencies_shim::<T>,
    };
}

unsafe extern "C-unwind" fn init_shim<T: Module>(raw: *mut RawModule) -> bool {
    let shell = unsafe { &mut *raw.cast::<ModuleShell<T>>() };
    shell.inner.init()
}

unsafe extern "C-unwind" fn start_shim<T: Module>(raw: *mut RawModule) -> bool {
    let shell = unsafe { &mut *raw.cast::<ModuleShell<T>>() };
    shell.inner.start()
}

unsafe extern "C-unwind" fn stop_shim<T: Module>(raw: *mut RawModule) -> bool {
    let shell = unsafe { &mut *raw.cast::<ModuleShell<T>>() };
    shell.inner.stop()
}

unsafe extern "C-unwind" fn cleanup_shim<T: Module>(raw: *mut RawModule) -> bool {
    let shell = unsafe { &mut *raw.cast::<ModuleShell<T>>() };
    shell.inner.cleanup()
}

unsafe extern "C-unwind" fn name_shim<T: Module>(raw: *const RawModule) -> StrView {
    let shell = unsafe { &*raw.cast::<ModuleShell<T>>() };
    StrView::new(shell.inner.name())
}

unsafe extern "C-unwind" fn version_shim<T: Module>(raw: *const RawModule) -> StrView {
    let shell = unsafe { &*raw.cast::<ModuleShell<T>>() };
    StrView::new(shell.inner.version())
}

unsafe extern "C-unwind" fn is_healthy_shim<T: Module>(raw: *const RawModule) -> bool {
    let shell = unsafe { &*raw.cast::<ModuleShell<T>>() };
    shell.inner.is_healthy()
}

unsafe extern "C-unwind" fn dependencies_shim<T: Module>(
    raw: *const RawModule,
    out: *mut StrView,
    cap: usize,
) -> usize {
    let shell = unsafe { &*raw.cast::<ModuleShell<T>>() };
    let deps = shell.inner.dependencies();
    if !out.is_null() {
        for (i, dep) in deps.iter().take(cap).enumerate() {
            unsafe { out.add(i).write(StrView::new(dep)) };
        }
    }
    deps.len()
}

/// Boxes `inner` behind an ABI header and leaks it to the host. The pointer
/// must come back through [`release_instance`] with the same `T`.
pub fn export_instance<T: Module>(inner: T) -> *mut RawModule {
    let shell = Box::new(ModuleShell {
        header: RawModule {
            vtable: &<T as HasVTable>::VTABLE,
        },
        inner,
    });
    Box::into_raw(shell).cast()
}

/// Reclaims and drops an instance produced by [`export_instance`].
///
/// # Safety
///
/// `raw` must originate from `export_instance::<T>` within this shared
/// object and must not be used afterwards. Null is tolerated as a no-op.
pub unsafe fn release_instance<T: Module>(raw: *mut RawModule) {
    if raw.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(raw.cast::<ModuleShell<T>>()) });
}

/// Emits the four factory symbols for a module type.
///
/// ```ignore
/// declare_module!(CalculatorModule, CalculatorModule::new(), c"Calculator");
/// ```
///
/// The second argument is the constructor expression evaluated on every
/// `createModule` call; the third names the module family as a C string.
#[macro_export]
macro_rules! declare_module {
    ($module:ty, $ctor:expr, $family:expr) => {
        #[allow(non_snake_case)]
        #[no_mangle]
        pub extern "C-unwind" fn createModule() -> *mut $crate::RawModule {
            $crate::export_instance::<$module>($ctor)
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub unsafe extern "C-unwind" fn destroyModule(raw: *mut $crate::RawModule) {
            unsafe { $crate::release_instance::<$module>(raw) }
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub extern "C-unwind" fn getModuleType() -> *const ::std::os::raw::c_char {
            const FAMILY: &'static ::std::ffi::CStr = $family;
            FAMILY.as_ptr()
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub extern "C-unwind" fn getModuleVersion() -> u32 {
            $crate::ABI_VERSION
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        running: bool,
        deps: Vec<String>,
    }

    impl Module for Probe {
        fn init(&mut self) -> bool {
            true
        }
        fn start(&mut self) -> bool {
            self.running = true;
            true
        }
        fn stop(&mut self) -> bool {
            self.running = false;
            true
        }
        fn cleanup(&mut self) -> bool {
            true
        }
        fn name(&self) -> &str {
            "Probe"
        }
        fn version(&self) -> &str {
            "0.0.1"
        }
        fn is_healthy(&self) -> bool {
            self.running
        }
        fn dependencies(&self) -> &[String] {
            &self.deps
        }
    }

    #[test]
    fn test_vtable_round_trip() {
        let raw = export_instance(Probe {
            running: false,
            deps: vec!["Other".to_string()],
        });
        unsafe {
            let vt = &*(*raw).vtable;
            assert!((vt.init)(raw));
            assert!(!(vt.is_healthy)(raw));
            assert!((vt.start)(raw));
            assert!((vt.is_healthy)(raw));

            assert_eq!((vt.name)(raw).as_str(), "Probe");
            assert_eq!((vt.version)(raw).as_str(), "0.0.1");

            assert!((vt.stop)(raw));
            assert!((vt.cleanup)(raw));
            release_instance::<Probe>(raw);
        }
    }

    #[test]
    fn test_dependencies_count_then_fill() {
        let raw = export_instance(Probe {
            running: false,
            deps: vec!["A".to_string(), "B".to_string()],
        });
        unsafe {
            let vt = &*(*raw).vtable;
            let count = (vt.dependencies)(raw, std::ptr::null_mut(), 0);
            assert_eq!(count, 2);

            let mut buf = vec![StrView::empty(); count];
            let written = (vt.dependencies)(raw, buf.as_mut_ptr(), buf.len());
            assert_eq!(written, 2);
            assert_eq!(buf[0].as_str(), "A");
            assert_eq!(buf[1].as_str(), "B");

            release_instance::<Probe>(raw);
        }
    }

    #[test]
    fn test_release_null_is_noop() {
        unsafe { release_instance::<Probe>(std::ptr::null_mut()) };
    }
}
