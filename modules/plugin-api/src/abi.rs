//! Raw `#[repr(C)]` types and symbol names of the plugin boundary.
//!
//! Everything that crosses the shared-object boundary lives here. All entry
//! points use the `C-unwind` ABI so a panic inside a plugin unwinds into the
//! host, where it is caught and reported instead of aborting the process.

use std::os::raw::c_char;

/// Version of the factory protocol. `getModuleVersion` must return this
/// value; the host refuses to construct instances from any other.
pub const ABI_VERSION: u32 = 1;

/// Symbol name of the instance constructor.
pub const CREATE_MODULE_SYMBOL: &[u8] = b"createModule";
/// Symbol name of the instance destructor.
pub const DESTROY_MODULE_SYMBOL: &[u8] = b"destroyModule";
/// Symbol name of the advisory module-family accessor.
pub const MODULE_TYPE_SYMBOL: &[u8] = b"getModuleType";
/// Symbol name of the factory-protocol version accessor.
pub const MODULE_VERSION_SYMBOL: &[u8] = b"getModuleVersion";

/// Constructs a new module instance. The returned pointer is owned by the
/// plugin's allocator and must be given back to [`DestroyModuleFn`] of the
/// same shared object, never freed by the host.
pub type CreateModuleFn = unsafe extern "C-unwind" fn() -> *mut RawModule;

/// Destroys an instance previously returned by [`CreateModuleFn`].
pub type DestroyModuleFn = unsafe extern "C-unwind" fn(*mut RawModule);

/// Returns a static NUL-terminated string naming the module family.
pub type ModuleTypeFn = unsafe extern "C-unwind" fn() -> *const c_char;

/// Returns the plugin's [`ABI_VERSION`].
pub type ModuleVersionFn = unsafe extern "C-unwind" fn() -> u32;

/// Borrowed UTF-8 string view handed across the boundary.
///
/// The bytes are owned by the module instance and stay valid for as long as
/// the instance lives. The host copies them out before releasing any lock.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct StrView {
    pub ptr: *const u8,
    pub len: usize,
}

impl StrView {
    pub fn new(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    pub const fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// Reborrows the view as `&str`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes of valid UTF-8 that outlive every use
    /// of the returned reference.
    pub unsafe fn as_str<'a>(&self) -> &'a str {
        if self.ptr.is_null() {
            ""
        } else {
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(self.ptr, self.len))
        }
    }
}

/// Instance header. Every pointer returned by `createModule` points at a
/// struct whose first field is this header; the host only ever sees the
/// header and calls through its table.
#[repr(C)]
pub struct RawModule {
    pub vtable: *const ModuleVTable,
}

/// Per-instance function table: the capability set of a module.
///
/// Lifecycle entries report success as `bool`; a `false` return walks the
/// instance back to destruction on the host side. `dependencies` uses the
/// count-query convention: call with a null buffer to learn the length, then
/// again with a buffer of at least that capacity.
#[repr(C)]
pub struct ModuleVTable {
    pub init: unsafe extern "C-unwind" fn(*mut RawModule) -> bool,
    pub start: unsafe extern "C-unwind" fn(*mut RawModule) -> bool,
    pub stop: unsafe extern "C-unwind" fn(*mut RawModule) -> bool,
    pub cleanup: unsafe extern "C-unwind" fn(*mut RawModule) -> bool,
    pub name: unsafe extern "C-unwind" fn(*const RawModule) -> StrView,
    pub version: unsafe extern "C-unwind" fn(*const RawModule) -> StrView,
    pub is_healthy: unsafe extern "C-unwind" fn(*const RawModule) -> bool,
    pub dependencies:
        unsafe extern "C-unwind" fn(*const RawModule, *mut StrView, usize) -> usize,
}
