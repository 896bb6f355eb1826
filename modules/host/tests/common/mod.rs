//! Shared fixtures: locate (and build once, if needed) the example plugin
//! artifacts in the workspace target directory.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Once};

use hotplug_host::{HealthMonitor, ModuleRegistry, MonitorConfig};

static BUILD_PLUGINS: Once = Once::new();

/// Directory the workspace places compiled artifacts in, derived from the
/// location of the running test executable (`target/<profile>/deps/..`).
pub fn artifact_dir() -> PathBuf {
    let exe = std::env::current_exe().expect("test executable has a path");
    let deps = exe.parent().expect("deps dir");
    deps.parent().expect("profile dir").to_path_buf()
}

fn shared_object_name(stem: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{stem}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{stem}.dylib")
    } else {
        format!("lib{stem}.so")
    }
}

/// Path to a plugin artifact, building the plugin crates on first use so the
/// suite works from a cold target directory.
pub fn plugin_artifact(stem: &str) -> PathBuf {
    BUILD_PLUGINS.call_once(|| {
        let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root");
        let mut build = Command::new(env!("CARGO"));
        build
            .current_dir(&workspace_root)
            .args([
                "build",
                "-p",
                "hotplug-calculator",
                "-p",
                "hotplug-calculator-v2",
                "-p",
                "hotplug-text-processor",
            ]);
        if artifact_dir().ends_with("release") {
            build.arg("--release");
        }
        let status = build.status().expect("cargo build for plugin fixtures");
        assert!(status.success(), "plugin fixture build failed");
    });
    artifact_dir().join(shared_object_name(stem))
}

/// Copies a built plugin into `dir` under `file_name`, replacing any file
/// already there. Removal before copy gives the staged path a fresh inode,
/// so a mapping of the previous content stays intact.
pub fn stage_plugin(stem: &str, dir: &Path, file_name: &str) -> PathBuf {
    let staged = dir.join(file_name);
    if staged.exists() {
        std::fs::remove_file(&staged).expect("remove staged plugin");
    }
    std::fs::copy(plugin_artifact(stem), &staged).expect("stage plugin");
    staged
}

pub fn registry_with_monitor(config: MonitorConfig) -> (Arc<ModuleRegistry>, Arc<HealthMonitor>) {
    let monitor = Arc::new(HealthMonitor::new(config));
    let registry = Arc::new(ModuleRegistry::new(Arc::clone(&monitor)));
    (registry, monitor)
}

pub fn test_registry() -> Arc<ModuleRegistry> {
    registry_with_monitor(MonitorConfig::default()).0
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}
