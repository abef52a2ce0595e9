//! Configuration defaults
//!
//! Names and default values shared by the config loader, the module loader
//! and the host so that every layer agrees on them.

/// Environment variable names and prefixes
pub mod env {
    /// Prefix for host-level configuration variables
    pub const HOST_PREFIX: &str = "ORLEANS_HOST_";

    /// Prefix for application-level configuration variables
    pub const APP_PREFIX: &str = "ORLEANS_HOST_APP_";

    /// Variable substituted into `{GrainLoadPath}` module paths
    pub const GRAIN_LOAD_PATH: &str = "GrainLoadPath";

    /// Set to `true` by container base images
    pub const RUNNING_IN_CONTAINER: &str = "DOTNET_RUNNING_IN_CONTAINER";

    /// Host-native alias of [`RUNNING_IN_CONTAINER`]
    pub const SILO_RUNNING_IN_CONTAINER: &str = "SILO_RUNNING_IN_CONTAINER";

    /// Host name reported by most container runtimes
    pub const HOSTNAME: &str = "HOSTNAME";

    /// Selects JSON log output when set to `json`
    pub const LOG_FORMAT: &str = "SILO_LOG_FORMAT";
}

/// Configuration section names
pub mod sections {
    pub const ROOT: &str = "Orleans";
    pub const SILO_CONFIG: &str = "SiloConfig";
    pub const PROVIDER: &str = "Provider";
    pub const GRAIN_OPTION: &str = "GrainOption";
    pub const DASHBOARD: &str = "Dashboard";
    pub const MULTI_CLUSTER: &str = "MultiCluster";

    /// Host-configuration key naming the hosting environment
    pub const ENVIRONMENT: &str = "Environment";

    /// Host-configuration key overriding the app-config base directory
    pub const CONTENT_ROOT: &str = "ContentRoot";
}

/// File and path defaults
pub mod files {
    /// `{prefix}.json` and `{prefix}.{environment}.json` are layered
    pub const CONFIG_FILE_PREFIX: &str = "hostsettings";

    /// Placeholder token expanded by the module path resolver
    pub const GRAIN_LOAD_PATH_TOKEN: &str = "{GrainLoadPath}";

    /// Environment name used when none is configured
    pub const DEFAULT_ENVIRONMENT: &str = "Production";
}

/// Silo networking defaults
pub mod silo {
    /// Silo-to-silo port
    pub const SILO_PORT: u16 = 11111;

    /// Client gateway port
    pub const GATEWAY_PORT: u16 = 30000;

    /// Response timeout (minutes)
    pub const RESPONSE_TIMEOUT_MINUTES: f64 = 3.0;

    /// Largest accepted response timeout, one week (minutes)
    pub const MAX_RESPONSE_TIMEOUT_MINUTES: f64 = 7.0 * 24.0 * 60.0;

    /// Extra allowance when a debugger is attached (minutes)
    pub const DEBUGGER_TIMEOUT_ALLOWANCE_MINUTES: f64 = 60.0;

    /// Dashboard HTTP port
    pub const DASHBOARD_PORT: u16 = 8088;
}
