//! Full lifecycle demo: load the example plugins, let the monitor watch
//! them, hot-swap the calculator to its second generation, and shut down.
//!
//! Build the whole workspace first so the plugin artifacts exist:
//! `cargo build --workspace && cargo run --bin hotplug`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hotplug_host::{HostConfig, PluginHost};
use tracing::info;

fn artifact_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the demo executable")?;
    Ok(exe
        .parent()
        .context("executable has no parent directory")?
        .to_path_buf())
}

fn shared_object(stem: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{stem}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{stem}.dylib")
    } else {
        format!("lib{stem}.so")
    }
}

/// Copies `from` over `to` through a fresh inode, the way a deployment
/// replaces a live shared object.
fn deploy(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_file(to)?;
    }
    std::fs::copy(from, to)
        .with_context(|| format!("deploying {} to {}", from.display(), to.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let host = PluginHost::new(HostConfig::default());
    host.monitor().set_check_interval(Duration::from_secs(2));
    host.start();

    let dir = artifact_dir()?;
    let calculator_v1 = dir.join(shared_object("hotplug_calculator"));
    let calculator_v2 = dir.join(shared_object("hotplug_calculator_v2"));
    let text_processor = dir.join(shared_object("hotplug_text_processor"));
    if !calculator_v1.exists() || !calculator_v2.exists() || !text_processor.exists() {
        bail!(
            "plugin artifacts not found in {}; run `cargo build --workspace` first",
            dir.display()
        );
    }

    // The calculator runs from a staged copy so its on-disk object can be
    // replaced while the host keeps running.
    let staged = dir.join(shared_object("calculator_live"));
    deploy(&calculator_v1, &staged)?;

    let registry = host.registry();
    registry.load(&staged)?;
    registry.load(&text_processor)?;

    info!("loaded modules: {:?}", registry.all_names());
    for name in registry.all_names() {
        if let Some(module_info) = registry.info(&name) {
            info!(
                "  {name} v{} from {} (running: {})",
                module_info.version,
                module_info.library_path.display(),
                module_info.is_running
            );
        }
    }

    info!("letting the monitor take a few laps...");
    std::thread::sleep(Duration::from_secs(5));
    host.monitor().generate_report();
    registry.scan_runtime_shared_libraries()?;

    info!("deploying calculator v2 and hot-swapping");
    deploy(&calculator_v2, &staged)?;
    registry.reload("Calculator")?;
    let swapped = registry
        .info("Calculator")
        .context("calculator vanished after hot-swap")?;
    info!("calculator now at v{}", swapped.version);

    std::thread::sleep(Duration::from_secs(3));
    host.monitor().generate_report();

    host.shutdown();
    std::fs::remove_file(&staged).ok();
    info!("demo complete");
    Ok(())
}
