//! Fatal host assembly errors

use silo_config::ConfigError;
use silo_modules::ModuleError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which sub-concern of a backend failed to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendPurpose {
    Clustering,
    GrainStorage,
    Reminder,
    /// Shared document-store client connection
    Client,
}

impl fmt::Display for BackendPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendPurpose::Clustering => "clustering",
            BackendPurpose::GrainStorage => "grain storage",
            BackendPurpose::Reminder => "reminder",
            BackendPurpose::Client => "client",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Configuration invalid: {0}")]
    ConfigurationInvalid(#[from] ConfigError),

    #[error("Failed to load grain module {path:?}: {reason}")]
    ModuleLoadFailed { path: PathBuf, reason: String },

    #[error("Failed to instantiate plugin type {type_name}: {reason}")]
    PluginInstantiationFailed { type_name: String, reason: String },

    #[error("{backend} {purpose} driver failed to load: {reason}")]
    BackendLoadFailed {
        backend: String,
        purpose: BackendPurpose,
        reason: String,
    },

    #[error("Telemetry collector {collector} failed to load: {reason}")]
    TelemetryLoadFailed { collector: String, reason: String },

    #[error("Dashboard failed to load: {reason}")]
    DashboardLoadFailed { reason: String },

    #[error("Failed to release grain module {path:?}: {reason}")]
    ModuleReleaseFailed { path: PathBuf, reason: String },
}

impl From<ModuleError> for HostError {
    fn from(error: ModuleError) -> Self {
        match error {
            ModuleError::LoadFailed { path, reason } => {
                HostError::ModuleLoadFailed { path, reason }
            }
            ModuleError::PluginInstantiationFailed { type_name, reason } => {
                HostError::PluginInstantiationFailed { type_name, reason }
            }
            ModuleError::ContextReleaseFailed { path, reason } => {
                HostError::ModuleReleaseFailed { path, reason }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
