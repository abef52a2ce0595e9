//! Isolation contexts
//!
//! An isolation context owns everything loaded on behalf of one module: the
//! module library itself and the private dependencies found next to it.
//! Libraries the host already provides (the shared scope) are never loaded
//! again from the module directory.
//!
//! Releasing a context gives up its own hold on the library image. The image
//! is closed right away unless registrations still hold a [`LibraryLease`]
//! on it, in which case it is closed when the last one drops.

use crate::error::{ModuleError, Result};
use libloading::Library;
use parking_lot::Mutex;
use silo_plugin::{
    build_id, BuildIdFn, ExportsFn, LibraryLease, ModuleExports, ABI_VERSION, BUILD_ID_SYMBOL,
    EXPORTS_SYMBOL,
};
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-module dependency resolution boundary
pub trait IsolationContext: Send + Sync {
    /// Absolute path of the module this context was created for
    fn module_path(&self) -> &Path;

    /// Load the module (first call) and read its export table
    fn load_module(&self) -> Result<ModuleExports>;

    /// Lease keeping the loaded module's code mapped; none for in-process modules
    fn lease(&self) -> LibraryLease {
        LibraryLease::none()
    }

    /// Unload everything the context holds; releasing twice is a no-op
    fn release(&self) -> Result<()>;
}

/// Creates contexts for the module loader
pub trait ContextFactory: Send + Sync {
    fn create(
        &self,
        module_path: &Path,
        shared: &SharedScope,
    ) -> Result<Arc<dyn IsolationContext>>;
}

/// Libraries resolved from the host process rather than module directories
#[derive(Debug, Clone, Default)]
pub struct SharedScope {
    libraries: HashSet<String>,
}

impl SharedScope {
    pub fn new<I, S>(libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            libraries: libraries
                .into_iter()
                .map(|name| library_key(name.as_ref()))
                .collect(),
        }
    }

    /// Matches `serde_json`, `libserde_json.so` and `serde_json.dll` alike
    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains(&library_key(library))
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

fn library_key(name: &str) -> String {
    let file_name = Path::new(name)
        .file_name()
        .map(|file| file.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let stem = file_name
        .split_once(".so")
        .map(|(stem, _)| stem.to_string())
        .or_else(|| {
            Path::new(&file_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or(file_name);
    stem.strip_prefix("lib").unwrap_or(&stem).to_lowercase()
}

/// Check the export table came from a compatible module
fn checked_exports(path: &Path, exports: ModuleExports) -> Result<ModuleExports> {
    if exports.build_id != build_id() {
        return Err(ModuleError::load_failed(
            path,
            format!(
                "module built against {} but host uses {}",
                exports.build_id,
                build_id()
            ),
        ));
    }
    if exports.abi_version != ABI_VERSION {
        return Err(ModuleError::load_failed(
            path,
            format!(
                "plugin ABI version {} does not match host version {}",
                exports.abi_version, ABI_VERSION
            ),
        ));
    }
    Ok(exports)
}

/// Context for a module compiled into the current process
pub struct InProcessContext {
    path: PathBuf,
    exports: ExportsFn,
    released: AtomicBool,
}

impl InProcessContext {
    pub fn new(path: impl Into<PathBuf>, exports: ExportsFn) -> Self {
        Self {
            path: path.into(),
            exports,
            released: AtomicBool::new(false),
        }
    }
}

impl IsolationContext for InProcessContext {
    fn module_path(&self) -> &Path {
        &self.path
    }

    fn load_module(&self) -> Result<ModuleExports> {
        if self.released.load(Ordering::Acquire) {
            return Err(ModuleError::load_failed(
                &self.path,
                "isolation context already released",
            ));
        }
        checked_exports(&self.path, (self.exports)())
    }

    fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::Release);
        Ok(())
    }
}

/// A module library and the private dependencies opened for it
struct LibraryImage {
    module: Option<Library>,
    /// Private dependencies in load order
    dependencies: Vec<Library>,
}

impl LibraryImage {
    /// Close the module, then its dependencies in reverse load order
    fn close(mut self) -> std::result::Result<(), String> {
        let mut first_error = None;
        if let Some(module) = self.module.take() {
            if let Err(e) = module.close() {
                first_error.get_or_insert(e.to_string());
            }
        }
        while let Some(dependency) = self.dependencies.pop() {
            if let Err(e) = dependency.close() {
                first_error.get_or_insert(e.to_string());
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for LibraryImage {
    fn drop(&mut self) {
        drop(self.module.take());
        while let Some(dependency) = self.dependencies.pop() {
            drop(dependency);
        }
    }
}

#[derive(Default)]
struct DylibState {
    image: Option<Arc<LibraryImage>>,
    released: bool,
}

/// Context for a native shared library
///
/// The module and its private dependencies are opened with local symbol
/// visibility, so two modules can carry different builds of the same
/// library. Undefined symbols still resolve against the host first.
pub struct DylibContext {
    path: PathBuf,
    module_dir: PathBuf,
    shared: SharedScope,
    state: Mutex<DylibState>,
}

impl DylibContext {
    pub fn new(path: impl Into<PathBuf>, shared: SharedScope) -> Self {
        let path = path.into();
        let module_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path,
            module_dir,
            shared,
            state: Mutex::new(DylibState::default()),
        }
    }

    /// Private dependencies listed in `<stem>.deps.json`, if present
    pub fn manifest_dependencies(&self) -> Result<Vec<String>> {
        let Some(stem) = self.path.file_stem() else {
            return Ok(Vec::new());
        };
        let manifest = self
            .module_dir
            .join(format!("{}.deps.json", stem.to_string_lossy()));
        if !manifest.is_file() {
            return Ok(Vec::new());
        }

        let manifest_error = |e: &dyn std::fmt::Display| {
            ModuleError::load_failed(&self.path, format!("{:?}: {}", manifest, e))
        };
        let text = std::fs::read_to_string(&manifest).map_err(|e| manifest_error(&e))?;
        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| manifest_error(&e))?;

        Ok(parsed
            .get("dependencies")
            .and_then(serde_json::Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn open_image(&self) -> Result<LibraryImage> {
        let mut image = LibraryImage {
            module: None,
            dependencies: Vec::new(),
        };
        for dependency in self.manifest_dependencies()? {
            if self.shared.contains(&dependency) {
                debug!("{} resolved from shared scope for {:?}", dependency, self.path);
                continue;
            }
            let dependency_path = self.module_dir.join(&dependency);
            let library = open_local(&dependency_path).map_err(|e| {
                ModuleError::load_failed(&self.path, format!("dependency {}: {}", dependency, e))
            })?;
            debug!("Loaded private dependency {:?}", dependency_path);
            image.dependencies.push(library);
        }

        let library =
            open_local(&self.path).map_err(|e| ModuleError::load_failed(&self.path, e))?;
        info!("Opened grain module {:?}", self.path);
        image.module = Some(library);
        Ok(image)
    }

    /// Compare the module's build identity with the host's before any
    /// Rust-ABI symbol is called
    fn check_build_id(&self, library: &Library) -> Result<()> {
        // SAFETY: `export_grain_module!` defines the symbol with the `BuildIdFn` signature
        let id_fn = unsafe { library.get::<BuildIdFn>(BUILD_ID_SYMBOL.as_bytes()) }.map_err(|e| {
            ModuleError::load_failed(&self.path, format!("missing build identity: {}", e))
        })?;

        // SAFETY: the symbol returns a pointer to a nul-terminated static string
        let raw = unsafe { id_fn() };
        if raw.is_null() {
            return Err(ModuleError::load_failed(&self.path, "empty build identity"));
        }
        let module_id = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();

        if module_id != build_id() {
            return Err(ModuleError::load_failed(
                &self.path,
                format!("module built against {} but host uses {}", module_id, build_id()),
            ));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn open_local(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
    // SAFETY: module initializers run on open; modules are trusted host extensions
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_local(path: &Path) -> std::result::Result<Library, libloading::Error> {
    // SAFETY: module initializers run on open; modules are trusted host extensions
    unsafe { Library::new(path) }
}

impl IsolationContext for DylibContext {
    fn module_path(&self) -> &Path {
        &self.path
    }

    fn load_module(&self) -> Result<ModuleExports> {
        let mut state = self.state.lock();
        if state.released {
            return Err(ModuleError::load_failed(
                &self.path,
                "isolation context already released",
            ));
        }
        if state.image.is_none() {
            state.image = Some(Arc::new(self.open_image()?));
        }
        let Some(library) = state.image.as_ref().and_then(|image| image.module.as_ref()) else {
            return Err(ModuleError::load_failed(&self.path, "module not open"));
        };
        self.check_build_id(library)?;

        // SAFETY: the entry point is generated by `export_grain_module!` with
        // the `ExportsFn` signature, from the same plugin build as the host
        let entry = unsafe { library.get::<ExportsFn>(EXPORTS_SYMBOL.as_bytes()) }.map_err(|e| {
            ModuleError::load_failed(&self.path, format!("missing entry point: {}", e))
        })?;
        checked_exports(&self.path, entry())
    }

    fn lease(&self) -> LibraryLease {
        match &self.state.lock().image {
            Some(image) => LibraryLease::new(Arc::clone(image)),
            None => LibraryLease::none(),
        }
    }

    fn release(&self) -> Result<()> {
        let image = {
            let mut state = self.state.lock();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.image.take()
        };
        let Some(image) = image else {
            return Ok(());
        };

        match Arc::try_unwrap(image) {
            Ok(image) => image.close().map_err(|reason| ModuleError::ContextReleaseFailed {
                path: self.path.clone(),
                reason,
            }),
            Err(image) => {
                warn!(
                    "{:?} still has {} lease(s); unloading when the last one drops",
                    self.path,
                    Arc::strong_count(&image) - 1
                );
                Ok(())
            }
        }
    }
}

/// Default factory: in-process modules by path, native libraries otherwise
#[derive(Default)]
pub struct NativeContextFactory {
    in_process: HashMap<PathBuf, ExportsFn>,
}

impl NativeContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `path` from an export table linked into this process
    pub fn register_in_process(
        &mut self,
        path: impl Into<PathBuf>,
        exports: ExportsFn,
    ) -> &mut Self {
        self.in_process.insert(path.into(), exports);
        self
    }
}

impl ContextFactory for NativeContextFactory {
    fn create(
        &self,
        module_path: &Path,
        shared: &SharedScope,
    ) -> Result<Arc<dyn IsolationContext>> {
        if let Some(exports) = self.in_process.get(module_path) {
            debug!("Using in-process exports for {:?}", module_path);
            return Ok(Arc::new(InProcessContext::new(module_path, *exports)));
        }

        if !module_path.is_file() {
            return Err(ModuleError::load_failed(module_path, "file not found"));
        }

        Ok(Arc::new(DylibContext::new(module_path, shared.clone())))
    }
}
