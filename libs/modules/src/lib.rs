//! # Silo Grain Modules
//!
//! Path resolution, isolated loading and plugin discovery for grain modules.
//!
//! ```text
//! LoadPaths ─► PathResolver ─► ModuleLoader ─► discover ─► RegistrationCallback*
//!              (token,         (one context    (concrete, non-excluded
//!               exe dir)        per path)       registration delegates)
//! ```

pub mod context;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod path;

pub use context::{
    ContextFactory, DylibContext, InProcessContext, IsolationContext, NativeContextFactory,
    SharedScope,
};
pub use discovery::{discover, discover_modules, DiscoveredModules, RegistrationCallback};
pub use error::{ModuleError, Result};
pub use loader::{LoadedModule, ModuleLoader, ReleaseReport};
pub use path::{normalize, PathResolver};
