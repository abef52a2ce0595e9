//! Native module loading against files on disk

use silo_modules::{DylibContext, IsolationContext, ModuleError, ModuleLoader, SharedScope};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn load_reason(
    result: silo_modules::Result<silo_plugin::ModuleExports>,
    expected_path: &Path,
) -> String {
    match result {
        Err(ModuleError::LoadFailed { path, reason }) => {
            assert_eq!(path, expected_path);
            reason
        }
        other => panic!(
            "expected load failure, got {:?}",
            other.map(|exports| exports.module_name)
        ),
    }
}

#[test]
fn missing_file_is_a_load_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.so");

    let loader = ModuleLoader::native(SharedScope::default());
    let reason = load_reason(loader.load(&path).map(|module| module.exports), &path);

    assert_eq!(reason, "file not found");
    assert_eq!(loader.context_count(), 0);
}

#[test]
fn non_library_file_is_a_load_failure() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "garbage.so", "this is not a shared library");

    let loader = ModuleLoader::native(SharedScope::default());
    load_reason(loader.load(&path).map(|module| module.exports), &path);

    // The context is cached even though opening failed
    assert!(loader.is_loaded(&path));
    assert!(loader.release_all().is_clean());
}

#[test]
fn manifest_lists_private_dependencies() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "libhello.so", "not a library");
    write(
        dir.path(),
        "libhello.deps.json",
        r#"{ "dependencies": ["libgreeter.so", "libserde_json.so", 7] }"#,
    );

    let context = DylibContext::new(&path, SharedScope::default());
    assert_eq!(
        context.manifest_dependencies().unwrap(),
        vec!["libgreeter.so".to_string(), "libserde_json.so".to_string()]
    );
}

#[test]
fn missing_private_dependency_fails_the_module() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "libhello.so", "not a library");
    write(dir.path(), "libhello.deps.json", r#"{ "dependencies": ["libgreeter.so"] }"#);

    let context = DylibContext::new(&path, SharedScope::default());
    let reason = load_reason(context.load_module(), &path);
    assert!(reason.starts_with("dependency libgreeter.so"), "{}", reason);
}

#[test]
fn shared_dependencies_are_not_loaded_privately() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "libhello.so", "not a library");
    write(dir.path(), "libhello.deps.json", r#"{ "dependencies": ["libgreeter.so"] }"#);

    let context = DylibContext::new(&path, SharedScope::new(["greeter"]));
    let reason = load_reason(context.load_module(), &path);
    // Fails on the module itself, not on the shared dependency
    assert!(!reason.starts_with("dependency"), "{}", reason);
}

#[test]
fn malformed_manifest_is_a_load_failure() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "libhello.so", "not a library");
    write(dir.path(), "libhello.deps.json", "{ not json");

    let context = DylibContext::new(&path, SharedScope::default());
    let reason = load_reason(context.load_module(), &path);
    assert!(reason.contains("libhello.deps.json"), "{}", reason);
}

#[test]
fn released_context_refuses_to_load() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "libhello.so", "not a library");

    let context = DylibContext::new(&path, SharedScope::default());
    context.release().unwrap();
    context.release().unwrap();

    let reason = load_reason(context.load_module(), &path);
    assert_eq!(reason, "isolation context already released");
}
