//! # Plugin API
//!
//! The ABI contract between the hotplug host and its plugins. A plugin is a
//! shared object exporting four C-linkage factory symbols; every instance it
//! produces carries a function table the host calls through. Both sides of
//! the boundary depend on this crate and nothing else, so the contract can
//! evolve in exactly one place.
//!
//! Plugins normally implement the [`Module`] trait and let
//! [`declare_module!`] emit the exported symbols.

pub mod abi;
pub mod export;

pub use abi::{
    CreateModuleFn, DestroyModuleFn, ModuleTypeFn, ModuleVTable, ModuleVersionFn, RawModule,
    StrView, ABI_VERSION, CREATE_MODULE_SYMBOL, DESTROY_MODULE_SYMBOL, MODULE_TYPE_SYMBOL,
    MODULE_VERSION_SYMBOL,
};
pub use export::{export_instance, release_instance, Module};
