//! # Silo Host Configuration
//!
//! Typed options and layered configuration loading for the silo host.
//!
//! ## Features
//!
//! - **Layering**: JSON files, prefixed environment variables and command
//!   line overrides merged with config-crate
//! - **Binding**: case-insensitive binding of configuration sections into
//!   typed option structs
//! - **Environment**: [`EnvSource`] abstraction so every environment read can
//!   be substituted in tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use silo_config::{ConfigLayerOptions, HostConfiguration, HostOptions, ProcessEnv};
//!
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let configuration =
//!     HostConfiguration::load(&args, &ProcessEnv, &ConfigLayerOptions::default())?;
//! let options = HostOptions::bind(&configuration)?;
//! println!("cluster {}", options.silo.cluster_id);
//! # Ok::<(), silo_config::ConfigError>(())
//! ```

pub mod binding;
pub mod defaults;
pub mod env;
pub mod error;
pub mod layered;
pub mod options;

// Re-export commonly used types
pub use env::{effective_current_dir, EnvSource, MapEnv, ProcessEnv};
pub use error::{ConfigError, Result};
pub use layered::{
    parse_command_line, CommandLineOverride, ConfigLayerOptions, HostConfiguration, HostOptions,
};
pub use options::{
    ActiveBackend, AdoNetProviderSettings, AdoNetSettings, DashboardOption, GrainLoadOption,
    MongoDbProviderSettings, MongoDbSettings, MultiClusterOption, ProviderConfig,
    RelationalVariant, SiloConfig,
};
