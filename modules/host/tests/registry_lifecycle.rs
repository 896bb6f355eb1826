//! End-to-end lifecycle tests against real plugin shared objects.

mod common;

use common::{init_tracing, plugin_artifact, stage_plugin, test_registry};
use hotplug_host::HostError;

#[test]
fn test_clean_load() {
    init_tracing();
    let registry = test_registry();

    let name = registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    assert_eq!(name, "Calculator");
    assert_eq!(registry.count(), 1);

    let info = registry.info("Calculator").unwrap();
    assert_eq!(info.name, "Calculator");
    assert_eq!(info.version, "1.0.0");
    assert!(info.is_running);
    assert!(registry.probe_health("Calculator"));

    registry.unload("Calculator").unwrap();
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_load_invalid_path_fails_cleanly() {
    init_tracing();
    let registry = test_registry();

    let result = registry.load("./does_not_exist.so");
    assert!(matches!(result, Err(HostError::Loader { .. })));
    assert_eq!(registry.count(), 0);
    assert!(registry.monitor().module_health("Calculator").is_none());
}

#[test]
fn test_load_garbage_file_is_loader_error() {
    init_tracing();
    let registry = test_registry();
    let dir = tempfile::tempdir().unwrap();

    let bogus = dir.path().join("libnot_a_plugin.so");
    std::fs::write(&bogus, b"definitely not a shared object").unwrap();

    let result = registry.load(&bogus);
    assert!(matches!(result, Err(HostError::Loader { .. })));
    assert_eq!(registry.count(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_plugin_library_reports_missing_symbol() {
    init_tracing();
    let registry = test_registry();

    // The C library loads fine but exports none of the factory symbols.
    let result = registry.load("libc.so.6");
    match result {
        Err(HostError::SymbolMissing { symbol, .. }) => assert_eq!(symbol, "createModule"),
        other => panic!("expected SymbolMissing, got {other:?}"),
    }
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_name_collision_destroys_new_instance() {
    init_tracing();
    let registry = test_registry();
    let dir = tempfile::tempdir().unwrap();

    let first = stage_plugin("hotplug_calculator", dir.path(), "libcalc_a.so");
    let second = stage_plugin("hotplug_calculator", dir.path(), "libcalc_b.so");

    registry.load(&first).unwrap();
    match registry.load(&second) {
        Err(HostError::NameCollision { name }) => assert_eq!(name, "Calculator"),
        other => panic!("expected NameCollision, got {other:?}"),
    }
    assert_eq!(registry.count(), 1);
    // The surviving registration still points at the first object.
    assert_eq!(registry.info("Calculator").unwrap().library_path, first);

    registry.unload("Calculator").unwrap();
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_unload_succeeds_exactly_once() {
    init_tracing();
    let registry = test_registry();

    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    registry.unload("Calculator").unwrap();
    assert!(matches!(
        registry.unload("Calculator"),
        Err(HostError::NotFound { .. })
    ));
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_names_and_is_loaded_agree() {
    init_tracing();
    let registry = test_registry();

    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    registry
        .load(plugin_artifact("hotplug_text_processor"))
        .unwrap();

    let names = registry.all_names();
    assert_eq!(names, vec!["Calculator", "TextProcessor"]);
    for name in &names {
        assert!(registry.is_loaded(name));
    }
    assert!(!registry.is_loaded("Ghost"));

    registry.shutdown();
    assert!(registry.all_names().is_empty());
    assert!(!registry.is_loaded("Calculator"));
}

#[test]
fn test_get_borrows_running_instance() {
    init_tracing();
    let registry = test_registry();
    registry.load(plugin_artifact("hotplug_calculator")).unwrap();

    {
        let module = registry.get("Calculator").unwrap();
        assert_eq!(module.name(), "Calculator");
        assert_eq!(module.version(), "1.0.0");
        assert!(module.is_healthy().unwrap());
    }
    assert!(registry.get("Ghost").is_none());

    registry.unload("Calculator").unwrap();
    assert!(registry.get("Calculator").is_none());
}

#[test]
fn test_shutdown_is_idempotent_with_modules() {
    init_tracing();
    let registry = test_registry();
    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    registry
        .load(plugin_artifact("hotplug_text_processor"))
        .unwrap();

    registry.shutdown();
    assert_eq!(registry.count(), 0);
    registry.shutdown();
    assert_eq!(registry.count(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_scan_sees_managed_module() {
    init_tracing();
    let registry = test_registry();
    registry.load(plugin_artifact("hotplug_calculator")).unwrap();
    registry.scan_runtime_shared_libraries().unwrap();
    registry.unload("Calculator").unwrap();
}

#[test]
fn test_concurrent_churn_leaves_registry_empty() {
    init_tracing();
    let registry = test_registry();
    let path = plugin_artifact("hotplug_calculator");

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let registry = registry.clone();
            let path = path.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let _ = registry.load(&path);
                    if let Some(module) = registry.get("Calculator") {
                        let _ = module.is_healthy();
                    }
                    let _ = registry.unload("Calculator");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(registry.count(), 0);
}
