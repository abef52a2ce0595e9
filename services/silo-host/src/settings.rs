//! Runtime settings produced by host assembly
//!
//! These are the values handed to the actor runtime and its backend
//! drivers. Assembly only decides them; it never talks to a backend.

use crate::endpoint::EndpointBinding;
use serde::Serialize;
use silo_config::RelationalVariant;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterOptions {
    pub cluster_id: String,
    pub service_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagingOptions {
    pub response_timeout: Duration,
    pub response_timeout_with_debugger: Duration,
}

/// Connection settings for one document-store sub-concern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStoreOptions {
    pub connection_string: String,
    pub database_name: String,
    pub collection_prefix: Option<String>,
}

/// Connection settings for one relational sub-concern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdoNetOptions {
    pub connection_string: String,
    pub invariant: String,
}

/// Client shared by the document-store providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStoreClient {
    pub connection_string: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClusteringConfig {
    DocumentStore(DocumentStoreOptions),
    Relational {
        #[serde(serialize_with = "serialize_variant")]
        variant: RelationalVariant,
        options: AdoNetOptions,
    },
    /// Development clustering around one fixed primary silo
    Development { primary_silo_endpoint: SocketAddr },
    /// Single-process clustering on the loopback interface
    Localhost {
        silo_port: u16,
        gateway_port: u16,
        service_id: String,
        cluster_id: String,
    },
}

/// Default grain state storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GrainStorageConfig {
    DocumentStore(DocumentStoreOptions),
    Relational {
        #[serde(serialize_with = "serialize_variant")]
        variant: RelationalVariant,
        options: AdoNetOptions,
    },
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReminderConfig {
    DocumentStore(DocumentStoreOptions),
    Relational {
        #[serde(serialize_with = "serialize_variant")]
        variant: RelationalVariant,
        options: AdoNetOptions,
    },
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiClusterSettings {
    pub default_multi_cluster: Vec<String>,
    pub gossip_channels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TelemetryConsumer {
    ApplicationInsights { instrumentation_key: String },
    LinuxPerfCounters,
    WindowsPerfCounters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSettings {
    pub port: u16,
}

/// Everything assembly decided for the runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiloSettings {
    pub cluster: Option<ClusterOptions>,
    pub silo_name: Option<String>,
    pub messaging: Option<MessagingOptions>,
    pub endpoints: Option<EndpointBinding>,
    pub document_store_client: Option<DocumentStoreClient>,
    pub clustering: Option<ClusteringConfig>,
    pub grain_storage: Option<GrainStorageConfig>,
    pub reminders: Option<ReminderConfig>,
    pub excluded_grain_types: Vec<String>,
    pub multi_cluster: Option<MultiClusterSettings>,
    pub telemetry: Vec<TelemetryConsumer>,
    pub dashboard: Option<DashboardSettings>,
}

fn serialize_variant<S: serde::Serializer>(
    variant: &RelationalVariant,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(variant.backend_name())
}
