//! Thin RAII wrapper over the OS dynamic loader.
//!
//! Exists so the registry is not sprinkled with loader calls and so handle
//! release is tied to a scoped owner the registry can order against module
//! destruction. The handle is not clonable; ownership moves with the value.

use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use crate::error::{HostError, HostResult};

/// An open loader handle for one shared object.
#[derive(Debug)]
pub struct SharedLibrary {
    inner: Library,
    path: PathBuf,
}

impl SharedLibrary {
    /// Asks the OS loader for a handle to `path`. The error path preserves
    /// the loader's own diagnostic (dlerror text on Unix).
    pub fn open(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: loading a shared object runs its initializers; the plugin
        // contract requires initializers to be free of side effects beyond
        // process-local setup.
        let inner = unsafe { Library::new(&path) }.map_err(|source| HostError::Loader {
            path: path.clone(),
            source,
        })?;
        debug!("acquired loader handle for {}", path.display());
        Ok(Self { inner, path })
    }

    /// Resolves `name` and copies the symbol value out of the library.
    ///
    /// # Safety
    ///
    /// `T` must match the exported symbol's actual type (a function pointer
    /// for plugin factory symbols), and the copy is only valid while this
    /// handle lives.
    pub unsafe fn symbol<T: Copy>(&self, name: &'static [u8]) -> HostResult<T> {
        unsafe {
            self.inner
                .get::<T>(name)
                .map(|symbol| *symbol)
                .map_err(|source| HostError::SymbolMissing {
                    symbol: String::from_utf8_lossy(name).into_owned(),
                    path: self.path.clone(),
                    source,
                })
        }
    }

    /// The path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        debug!("releasing loader handle for {}", self.path.display());
    }
}
