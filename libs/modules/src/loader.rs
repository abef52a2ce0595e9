//! Isolated module loader
//!
//! Keeps exactly one isolation context per resolved module path for the
//! life of the process and releases all of them once at shutdown.

use crate::context::{ContextFactory, IsolationContext, NativeContextFactory, SharedScope};
use crate::error::{ModuleError, Result};
use parking_lot::Mutex;
use silo_plugin::{LibraryLease, ModuleExports};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A module whose export table has been read
#[derive(Clone)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub exports: ModuleExports,
    context: Arc<dyn IsolationContext>,
    // Dropped after `exports`
    lease: LibraryLease,
}

impl LoadedModule {
    pub fn name(&self) -> &str {
        &self.exports.module_name
    }

    pub fn context(&self) -> &Arc<dyn IsolationContext> {
        &self.context
    }

    /// Hold on the module's code, for everything derived from its exports
    pub fn lease(&self) -> &LibraryLease {
        &self.lease
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("module_name", &self.exports.module_name)
            .field("types", &self.exports.types.len())
            .field("lease", &self.lease)
            .finish()
    }
}

/// Outcome of [`ModuleLoader::release_all`]
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub released: usize,
    pub failures: Vec<ModuleError>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct ContextCache {
    by_path: HashMap<PathBuf, Arc<dyn IsolationContext>>,
    /// Insertion order, used for teardown
    order: Vec<PathBuf>,
}

pub struct ModuleLoader {
    factory: Arc<dyn ContextFactory>,
    shared: SharedScope,
    cache: Mutex<ContextCache>,
    released: AtomicBool,
}

impl ModuleLoader {
    pub fn new(factory: Arc<dyn ContextFactory>, shared: SharedScope) -> Self {
        Self {
            factory,
            shared,
            cache: Mutex::new(ContextCache::default()),
            released: AtomicBool::new(false),
        }
    }

    /// Loader over native libraries with no in-process modules
    pub fn native(shared: SharedScope) -> Self {
        Self::new(Arc::new(NativeContextFactory::new()), shared)
    }

    /// Load a module by absolute path, reusing its context on repeat calls
    pub fn load(&self, path: &Path) -> Result<LoadedModule> {
        if self.released.load(Ordering::Acquire) {
            return Err(ModuleError::load_failed(path, "module loader already released"));
        }

        let context = self.context_for(path)?;
        let exports = context.load_module()?;
        debug!(
            "Loaded module {} from {:?} ({} exported types)",
            exports.module_name,
            path,
            exports.types.len()
        );

        let lease = context.lease();
        Ok(LoadedModule {
            path: path.to_path_buf(),
            exports,
            context,
            lease,
        })
    }

    fn context_for(&self, path: &Path) -> Result<Arc<dyn IsolationContext>> {
        // Creation runs under the lock: at most one context per path
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.by_path.get(path) {
            return Ok(Arc::clone(existing));
        }

        let context = self.factory.create(path, &self.shared)?;
        info!("Created isolation context for {:?}", path);
        cache.by_path.insert(path.to_path_buf(), Arc::clone(&context));
        cache.order.push(path.to_path_buf());
        Ok(context)
    }

    pub fn context_count(&self) -> usize {
        self.cache.lock().by_path.len()
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.cache.lock().by_path.contains_key(path)
    }

    /// Release every context in load order; only the first call does work
    pub fn release_all(&self) -> ReleaseReport {
        if self.released.swap(true, Ordering::AcqRel) {
            return ReleaseReport::default();
        }

        let (mut by_path, order) = {
            let mut cache = self.cache.lock();
            (
                std::mem::take(&mut cache.by_path),
                std::mem::take(&mut cache.order),
            )
        };

        let mut report = ReleaseReport::default();
        for path in order {
            let Some(context) = by_path.remove(&path) else {
                continue;
            };
            match context.release() {
                Ok(()) => report.released += 1,
                Err(e) => {
                    warn!("Failed to release isolation context for {:?}: {}", path, e);
                    report.failures.push(e);
                }
            }
        }

        info!(
            "Released {} isolation context(s), {} failure(s)",
            report.released,
            report.failures.len()
        );
        report
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        self.release_all();
    }
}
