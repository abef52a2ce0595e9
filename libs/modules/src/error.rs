//! Module loading errors

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModuleError>;

#[derive(Debug, Error)]
pub enum ModuleError {
    /// Missing file, not a module, missing entry point or ABI mismatch
    #[error("Failed to load grain module {path:?}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// No parameterless constructor, or the constructor failed
    #[error("Failed to instantiate plugin type {type_name}: {reason}")]
    PluginInstantiationFailed { type_name: String, reason: String },

    #[error("Failed to release isolation context for {path:?}: {reason}")]
    ContextReleaseFailed { path: PathBuf, reason: String },
}

impl ModuleError {
    pub fn load_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::LoadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
