//! Typed host options
//!
//! Each struct is bound from one subsection of the `Orleans` configuration
//! section. Field names follow the configuration keys (`ClusterId`,
//! `DefaultProvider`, `LoadPaths`, ...) and every field has a default so
//! that partially specified sections still bind.

use crate::binding::lenient_optional_bool;
use crate::defaults;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Silo identity, networking and cluster-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiloConfig {
    /// Logical cluster identifier (required)
    pub cluster_id: String,

    /// Service identifier, stable across deployments (required)
    pub service_id: String,

    pub silo_name: Option<String>,

    /// Advertised address; empty or `*` means unspecified
    pub advertised_ip: Option<String>,

    /// Bind every host interface instead of the advertised address only
    pub listen_on_any_host_address: bool,

    pub silo_port: u16,
    pub gateway_port: u16,
    pub response_timeout_minutes: f64,

    /// Grain type full names the runtime must not activate
    pub excluded_grain_types: Vec<String>,

    pub is_multi_cluster: bool,
    pub gossip_channels: Option<HashMap<String, String>>,

    /// Falls back to `[ClusterId]` when multi-cluster is on and this is unset
    pub default_multi_cluster: Option<Vec<String>>,

    /// Application Insights instrumentation key
    pub azure_application_insight_key: Option<String>,
}

impl Default for SiloConfig {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            service_id: String::new(),
            silo_name: None,
            advertised_ip: None,
            listen_on_any_host_address: false,
            silo_port: defaults::silo::SILO_PORT,
            gateway_port: defaults::silo::GATEWAY_PORT,
            response_timeout_minutes: defaults::silo::RESPONSE_TIMEOUT_MINUTES,
            excluded_grain_types: Vec::new(),
            is_multi_cluster: false,
            gossip_channels: None,
            default_multi_cluster: None,
            azure_application_insight_key: None,
        }
    }
}

impl SiloConfig {
    /// Check required fields and the multi-cluster invariant
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(ConfigError::invalid(
                "ClusterId is required and cannot be empty",
                Some("ClusterId"),
            ));
        }

        if self.service_id.trim().is_empty() {
            return Err(ConfigError::invalid(
                "ServiceId is required and cannot be empty",
                Some("ServiceId"),
            ));
        }

        if !self.response_timeout_minutes.is_finite() || self.response_timeout_minutes <= 0.0 {
            return Err(ConfigError::invalid(
                "ResponseTimeoutMinutes must be a positive number",
                Some("ResponseTimeoutMinutes"),
            ));
        }

        if self.response_timeout_minutes > defaults::silo::MAX_RESPONSE_TIMEOUT_MINUTES {
            return Err(ConfigError::invalid(
                &format!(
                    "ResponseTimeoutMinutes cannot exceed {}",
                    defaults::silo::MAX_RESPONSE_TIMEOUT_MINUTES
                ),
                Some("ResponseTimeoutMinutes"),
            ));
        }

        // Multi-cluster needs at least one gossip channel; absent and empty
        // maps are both rejected.
        if self.is_multi_cluster && self.gossip_channels.as_ref().map_or(true, HashMap::is_empty) {
            return Err(ConfigError::invalid(
                "Gossip Channels configuration value(s) required when IsMultiCluster is set",
                Some("GossipChannels"),
            ));
        }

        Ok(())
    }

    /// The advertised IP literal, if one was actually specified
    pub fn advertised_ip_literal(&self) -> Option<&str> {
        self.advertised_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty() && *ip != "*")
    }

    pub fn silo_name(&self) -> Option<&str> {
        self.silo_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn telemetry_key(&self) -> Option<&str> {
        self.azure_application_insight_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Response timeout, or the default when the configured value is out of range
    pub fn response_timeout(&self) -> Duration {
        let minutes = if self.response_timeout_minutes > 0.0
            && self.response_timeout_minutes <= defaults::silo::MAX_RESPONSE_TIMEOUT_MINUTES
        {
            self.response_timeout_minutes
        } else {
            defaults::silo::RESPONSE_TIMEOUT_MINUTES
        };
        Duration::from_secs_f64(minutes * 60.0)
    }

    /// Default multi-cluster list, falling back to this silo's cluster
    pub fn effective_default_multi_cluster(&self) -> Vec<String> {
        match &self.default_multi_cluster {
            Some(clusters) if !clusters.is_empty() => clusters.clone(),
            _ => vec![self.cluster_id.clone()],
        }
    }

    /// Apply values from the dedicated `MultiCluster` section
    pub fn apply_multi_cluster(&mut self, overlay: &MultiClusterOption) {
        if let Some(enabled) = overlay.is_multi_cluster {
            self.is_multi_cluster = enabled;
        }
        if overlay.gossip_channels.is_some() {
            self.gossip_channels = overlay.gossip_channels.clone();
        }
        if overlay.default_multi_cluster.is_some() {
            self.default_multi_cluster = overlay.default_multi_cluster.clone();
        }
    }
}

/// `Orleans:MultiCluster` overlay; set fields override SiloConfig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MultiClusterOption {
    #[serde(deserialize_with = "lenient_optional_bool")]
    pub is_multi_cluster: Option<bool>,
    pub gossip_channels: Option<HashMap<String, String>>,
    pub default_multi_cluster: Option<Vec<String>>,
}

/// Dashboard enablement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DashboardOption {
    pub enable: bool,
    pub port: u16,
}

impl Default for DashboardOption {
    fn default() -> Self {
        Self {
            enable: false,
            port: defaults::silo::DASHBOARD_PORT,
        }
    }
}

/// Grain module loading options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GrainLoadOption {
    /// Module paths in load order; may contain `{GrainLoadPath}`
    pub load_paths: Vec<String>,

    /// Plugin type full names that must not be instantiated
    pub excluded_type_full_names: Vec<String>,

    /// Also scan the main executable for registration delegates
    pub call_main_execution_path_service_config_delegate: bool,

    /// Library names the host already provides; module contexts resolve
    /// these from the shared scope rather than their own directory
    pub shared_libraries: Vec<String>,
}

impl GrainLoadOption {
    pub fn excluded_set(&self) -> HashSet<String> {
        self.excluded_type_full_names.iter().cloned().collect()
    }
}

/// Document-store connection settings for one sub-concern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MongoDbSettings {
    pub db_conn: String,
    pub db_name: String,
    pub collection_prefix: Option<String>,
}

impl MongoDbSettings {
    pub fn connection(&self) -> Option<&str> {
        Some(self.db_conn.trim()).filter(|conn| !conn.is_empty())
    }

    pub fn collection_prefix(&self) -> Option<&str> {
        self.collection_prefix.as_deref().filter(|prefix| !prefix.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MongoDbProviderSettings {
    pub cluster: MongoDbSettings,
    pub storage: MongoDbSettings,
    pub reminder: MongoDbSettings,
}

impl MongoDbProviderSettings {
    /// Connection used for the shared client: Cluster, then Storage, then Reminder
    pub fn client_connection(&self) -> Option<&str> {
        self.cluster
            .connection()
            .or_else(|| self.storage.connection())
            .or_else(|| self.reminder.connection())
    }
}

/// Relational (ADO.NET style) connection settings for one sub-concern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AdoNetSettings {
    pub db_conn: String,

    /// Driver invariant name; the variant's default applies when unset
    pub invariant: Option<String>,
}

impl AdoNetSettings {
    pub fn invariant_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.invariant
            .as_deref()
            .map(str::trim)
            .filter(|invariant| !invariant.is_empty())
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AdoNetProviderSettings {
    pub cluster: AdoNetSettings,
    pub storage: AdoNetSettings,
    pub reminder: AdoNetSettings,
}

/// Backend provider selection plus per-backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProviderConfig {
    pub default_provider: String,
    pub mongo_db: MongoDbProviderSettings,
    pub sql_db: AdoNetProviderSettings,
    pub my_sql: AdoNetProviderSettings,
}

/// Relational backend flavours sharing one wiring shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalVariant {
    SqlServer,
    MySql,
}

impl RelationalVariant {
    pub fn default_invariant(self) -> &'static str {
        match self {
            RelationalVariant::SqlServer => "System.Data.SqlClient",
            RelationalVariant::MySql => "MySql.Data.MySqlClient",
        }
    }

    pub fn backend_name(self) -> &'static str {
        match self {
            RelationalVariant::SqlServer => "SQLDB",
            RelationalVariant::MySql => "MYSQL",
        }
    }
}

/// The single backend selected by `DefaultProvider`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveBackend<'a> {
    DocumentStore(&'a MongoDbProviderSettings),
    Relational {
        variant: RelationalVariant,
        settings: &'a AdoNetProviderSettings,
    },
    InMemory,
    /// Unknown or empty provider name: local single-process clustering
    Fallback,
}

impl ProviderConfig {
    /// Resolve the discriminator; settings of inactive kinds are ignored
    pub fn active_backend(&self) -> ActiveBackend<'_> {
        let name = self.default_provider.trim();
        if name.eq_ignore_ascii_case("MongoDB") {
            ActiveBackend::DocumentStore(&self.mongo_db)
        } else if name.eq_ignore_ascii_case("SQLDB") {
            ActiveBackend::Relational {
                variant: RelationalVariant::SqlServer,
                settings: &self.sql_db,
            }
        } else if name.eq_ignore_ascii_case("MYSQL") {
            ActiveBackend::Relational {
                variant: RelationalVariant::MySql,
                settings: &self.my_sql,
            }
        } else if name.eq_ignore_ascii_case("InMemory") {
            ActiveBackend::InMemory
        } else {
            ActiveBackend::Fallback
        }
    }
}
