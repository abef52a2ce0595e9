//! Backend strategy selection
//!
//! Exactly one backend is wired, chosen by `Orleans:Provider:DefaultProvider`.
//! Each backend wires clustering, default grain storage and reminders;
//! the document store also gets a shared client.

use crate::builder::{DriverError, SiloBuilder};
use crate::error::{BackendPurpose, HostError, Result};
use crate::settings::{
    AdoNetOptions, ClusteringConfig, DocumentStoreClient, DocumentStoreOptions, GrainStorageConfig,
    ReminderConfig,
};
use silo_config::{
    ActiveBackend, AdoNetProviderSettings, AdoNetSettings, MongoDbProviderSettings, MongoDbSettings,
    ProviderConfig, RelationalVariant, SiloConfig,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{info, warn};

/// Name used for the in-memory backend in errors and logs
pub const IN_MEMORY_BACKEND: &str = "InMemory";

/// Name used for the fallback backend in errors and logs
pub const LOCALHOST_BACKEND: &str = "Localhost";

fn backend_failed(
    backend: &str,
    purpose: BackendPurpose,
) -> impl FnOnce(DriverError) -> HostError + '_ {
    move |e| HostError::BackendLoadFailed {
        backend: backend.to_string(),
        purpose,
        reason: e.to_string(),
    }
}

/// Wire the backend selected by `DefaultProvider`
pub fn configure_backend<B>(
    builder: &mut B,
    provider: &ProviderConfig,
    silo: &SiloConfig,
) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    match provider.active_backend() {
        ActiveBackend::DocumentStore(settings) => configure_document_store(builder, settings),
        ActiveBackend::Relational { variant, settings } => {
            configure_relational(builder, variant, settings)
        }
        ActiveBackend::InMemory => configure_in_memory(builder, silo),
        ActiveBackend::Fallback => configure_localhost(builder, provider, silo),
    }
}

fn document_store_options(settings: &MongoDbSettings) -> DocumentStoreOptions {
    DocumentStoreOptions {
        connection_string: settings.db_conn.clone(),
        database_name: settings.db_name.clone(),
        collection_prefix: settings.collection_prefix().map(str::to_string),
    }
}

fn configure_document_store<B>(builder: &mut B, settings: &MongoDbProviderSettings) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    const BACKEND: &str = "MongoDB";
    info!("Using {} backend", BACKEND);

    if let Some(connection_string) = settings.client_connection() {
        builder
            .use_document_store_client(DocumentStoreClient {
                connection_string: connection_string.to_string(),
            })
            .map_err(backend_failed(BACKEND, BackendPurpose::Client))?;
    }

    builder
        .use_clustering(ClusteringConfig::DocumentStore(document_store_options(&settings.cluster)))
        .map_err(backend_failed(BACKEND, BackendPurpose::Clustering))?;
    builder
        .add_grain_storage(GrainStorageConfig::DocumentStore(document_store_options(
            &settings.storage,
        )))
        .map_err(backend_failed(BACKEND, BackendPurpose::GrainStorage))?;
    builder
        .use_reminders(ReminderConfig::DocumentStore(document_store_options(&settings.reminder)))
        .map_err(backend_failed(BACKEND, BackendPurpose::Reminder))?;
    Ok(())
}

fn configure_relational<B>(
    builder: &mut B,
    variant: RelationalVariant,
    settings: &AdoNetProviderSettings,
) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    let backend = variant.backend_name();
    info!("Using {} backend", backend);

    let options = |sub: &AdoNetSettings| AdoNetOptions {
        connection_string: sub.db_conn.clone(),
        invariant: sub.invariant_or(variant.default_invariant()).to_string(),
    };

    builder
        .use_clustering(ClusteringConfig::Relational {
            variant,
            options: options(&settings.cluster),
        })
        .map_err(backend_failed(backend, BackendPurpose::Clustering))?;
    builder
        .add_grain_storage(GrainStorageConfig::Relational {
            variant,
            options: options(&settings.storage),
        })
        .map_err(backend_failed(backend, BackendPurpose::GrainStorage))?;
    builder
        .use_reminders(ReminderConfig::Relational {
            variant,
            options: options(&settings.reminder),
        })
        .map_err(backend_failed(backend, BackendPurpose::Reminder))?;
    Ok(())
}

/// Primary silo endpoint for development clustering
pub fn primary_silo_endpoint(silo: &SiloConfig) -> SocketAddr {
    let ip = match silo.advertised_ip_literal() {
        Some(literal) => literal.parse::<IpAddr>().unwrap_or_else(|e| {
            warn!("AdvertisedIp '{}' is not an IP address ({}), using loopback", literal, e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }),
        None => IpAddr::V4(Ipv4Addr::LOCALHOST),
    };
    SocketAddr::new(ip, silo.silo_port)
}

fn configure_in_memory<B>(builder: &mut B, silo: &SiloConfig) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    let primary_silo_endpoint = primary_silo_endpoint(silo);
    info!(
        "Using {} backend, primary silo at {}",
        IN_MEMORY_BACKEND, primary_silo_endpoint
    );

    builder
        .use_clustering(ClusteringConfig::Development { primary_silo_endpoint })
        .map_err(backend_failed(IN_MEMORY_BACKEND, BackendPurpose::Clustering))?;
    builder
        .add_grain_storage(GrainStorageConfig::InMemory)
        .map_err(backend_failed(IN_MEMORY_BACKEND, BackendPurpose::GrainStorage))?;
    builder
        .use_reminders(ReminderConfig::InMemory)
        .map_err(backend_failed(IN_MEMORY_BACKEND, BackendPurpose::Reminder))?;
    Ok(())
}

fn configure_localhost<B>(
    builder: &mut B,
    provider: &ProviderConfig,
    silo: &SiloConfig,
) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    if provider.default_provider.trim().is_empty() {
        info!("No DefaultProvider configured, using localhost clustering");
    } else {
        warn!(
            "Unknown DefaultProvider '{}', using localhost clustering",
            provider.default_provider
        );
    }

    builder
        .use_clustering(ClusteringConfig::Localhost {
            silo_port: silo.silo_port,
            gateway_port: silo.gateway_port,
            service_id: silo.service_id.clone(),
            cluster_id: silo.cluster_id.clone(),
        })
        .map_err(backend_failed(LOCALHOST_BACKEND, BackendPurpose::Clustering))?;
    builder
        .add_grain_storage(GrainStorageConfig::InMemory)
        .map_err(backend_failed(LOCALHOST_BACKEND, BackendPurpose::GrainStorage))?;
    builder
        .use_reminders(ReminderConfig::InMemory)
        .map_err(backend_failed(LOCALHOST_BACKEND, BackendPurpose::Reminder))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Driver, DriverRegistry};
    use crate::recording::{BuilderCall, RecordingSiloBuilder};

    fn silo() -> SiloConfig {
        SiloConfig {
            cluster_id: "c1".to_string(),
            service_id: "s1".to_string(),
            ..SiloConfig::default()
        }
    }

    fn mongo(conn: &str, db: &str, prefix: Option<&str>) -> MongoDbSettings {
        MongoDbSettings {
            db_conn: conn.to_string(),
            db_name: db.to_string(),
            collection_prefix: prefix.map(str::to_string),
        }
    }

    fn provider(name: &str) -> ProviderConfig {
        ProviderConfig {
            default_provider: name.to_string(),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_document_store_wiring() {
        let mut config = provider("MongoDB");
        config.mongo_db = MongoDbProviderSettings {
            cluster: mongo("", "cluster-db", None),
            storage: mongo("mongodb://storage", "grains", Some("g_")),
            reminder: mongo("mongodb://reminder", "reminders", Some("")),
        };

        let mut builder = RecordingSiloBuilder::default();
        configure_backend(&mut builder, &config, &silo()).unwrap();

        assert_eq!(
            builder.calls(),
            &[
                BuilderCall::DocumentStoreClient(DocumentStoreClient {
                    connection_string: "mongodb://storage".to_string(),
                }),
                BuilderCall::Clustering(ClusteringConfig::DocumentStore(DocumentStoreOptions {
                    connection_string: String::new(),
                    database_name: "cluster-db".to_string(),
                    collection_prefix: None,
                })),
                BuilderCall::GrainStorage(GrainStorageConfig::DocumentStore(DocumentStoreOptions {
                    connection_string: "mongodb://storage".to_string(),
                    database_name: "grains".to_string(),
                    collection_prefix: Some("g_".to_string()),
                })),
                BuilderCall::Reminders(ReminderConfig::DocumentStore(DocumentStoreOptions {
                    connection_string: "mongodb://reminder".to_string(),
                    database_name: "reminders".to_string(),
                    collection_prefix: None,
                })),
            ]
        );
    }

    #[test]
    fn test_document_store_without_connections_skips_client() {
        let mut builder = RecordingSiloBuilder::default();
        configure_backend(&mut builder, &provider("mongodb"), &silo()).unwrap();
        assert!(!builder
            .calls()
            .iter()
            .any(|call| matches!(call, BuilderCall::DocumentStoreClient(_))));
        assert_eq!(builder.calls().len(), 3);
    }

    #[test]
    fn test_sql_server_wiring_with_invariant_override() {
        let mut config = provider("SQLDB");
        config.sql_db.cluster.db_conn = "Server=db;Database=cluster".to_string();
        config.sql_db.storage.db_conn = "Server=db;Database=storage".to_string();
        config.sql_db.storage.invariant = Some("Microsoft.Data.SqlClient".to_string());
        config.sql_db.reminder.db_conn = "Server=db;Database=reminder".to_string();
        // Settings for inactive backends are ignored
        config.my_sql.cluster.db_conn = "ignored".to_string();

        let mut builder = RecordingSiloBuilder::default();
        configure_backend(&mut builder, &config, &silo()).unwrap();

        let relational = |conn: &str, invariant: &str| AdoNetOptions {
            connection_string: conn.to_string(),
            invariant: invariant.to_string(),
        };
        let variant = RelationalVariant::SqlServer;
        assert_eq!(
            builder.calls(),
            &[
                BuilderCall::Clustering(ClusteringConfig::Relational {
                    variant,
                    options: relational("Server=db;Database=cluster", "System.Data.SqlClient"),
                }),
                BuilderCall::GrainStorage(GrainStorageConfig::Relational {
                    variant,
                    options: relational("Server=db;Database=storage", "Microsoft.Data.SqlClient"),
                }),
                BuilderCall::Reminders(ReminderConfig::Relational {
                    variant,
                    options: relational("Server=db;Database=reminder", "System.Data.SqlClient"),
                }),
            ]
        );
    }

    #[test]
    fn test_mysql_default_invariant() {
        let mut config = provider("MYSQL");
        config.my_sql.cluster.db_conn = "Server=mysql".to_string();

        let mut builder = RecordingSiloBuilder::default();
        configure_backend(&mut builder, &config, &silo()).unwrap();

        match builder.clustering() {
            Some(ClusteringConfig::Relational { variant, options }) => {
                assert_eq!(*variant, RelationalVariant::MySql);
                assert_eq!(options.invariant, "MySql.Data.MySqlClient");
                assert_eq!(options.connection_string, "Server=mysql");
            }
            other => panic!("expected relational clustering, got {:?}", other),
        }
        assert_eq!(builder.calls().len(), 3);
    }

    #[test]
    fn test_in_memory_wiring() {
        let mut builder = RecordingSiloBuilder::default();
        configure_backend(&mut builder, &provider("InMemory"), &silo()).unwrap();

        assert_eq!(
            builder.calls(),
            &[
                BuilderCall::Clustering(ClusteringConfig::Development {
                    primary_silo_endpoint: "127.0.0.1:11111".parse().unwrap(),
                }),
                BuilderCall::GrainStorage(GrainStorageConfig::InMemory),
                BuilderCall::Reminders(ReminderConfig::InMemory),
            ]
        );
    }

    #[test]
    fn test_in_memory_uses_advertised_ip() {
        let mut silo = silo();
        silo.advertised_ip = Some("10.1.2.3".to_string());
        silo.silo_port = 22222;
        assert_eq!(primary_silo_endpoint(&silo), "10.1.2.3:22222".parse().unwrap());

        silo.advertised_ip = Some("bogus".to_string());
        assert_eq!(primary_silo_endpoint(&silo), "127.0.0.1:22222".parse().unwrap());
    }

    #[test]
    fn test_fallback_wiring() {
        for name in ["", "Cassandra"] {
            let mut builder = RecordingSiloBuilder::default();
            configure_backend(&mut builder, &provider(name), &silo()).unwrap();

            assert_eq!(
                builder.calls(),
                &[
                    BuilderCall::Clustering(ClusteringConfig::Localhost {
                        silo_port: 11111,
                        gateway_port: 30000,
                        service_id: "s1".to_string(),
                        cluster_id: "c1".to_string(),
                    }),
                    BuilderCall::GrainStorage(GrainStorageConfig::InMemory),
                    BuilderCall::Reminders(ReminderConfig::InMemory),
                ]
            );
        }
    }

    #[test]
    fn test_missing_driver_names_backend_and_purpose() {
        let mut config = provider("MongoDB");
        config.mongo_db.cluster.db_conn = "mongodb://cluster".to_string();

        let mut builder = RecordingSiloBuilder::new(DriverRegistry::all().without(Driver::MongoDb));
        match configure_backend(&mut builder, &config, &silo()) {
            Err(HostError::BackendLoadFailed { backend, purpose, .. }) => {
                assert_eq!(backend, "MongoDB");
                assert_eq!(purpose, BackendPurpose::Client);
            }
            other => panic!("expected backend failure, got {:?}", other),
        }

        let mut builder =
            RecordingSiloBuilder::new(DriverRegistry::all().without(Driver::SqlServer));
        match configure_backend(&mut builder, &provider("SQLDB"), &silo()) {
            Err(HostError::BackendLoadFailed { backend, purpose, .. }) => {
                assert_eq!(backend, "SQLDB");
                assert_eq!(purpose, BackendPurpose::Clustering);
            }
            other => panic!("expected backend failure, got {:?}", other),
        }
        assert!(builder.calls().is_empty());
    }
}
