//! Silo builder surface
//!
//! Host assembly threads a [`SiloBuilder`] through every configuration step.
//! [`SiloHostBuilder`] accumulates [`SiloSettings`] for the runtime and
//! checks each optional driver against a [`DriverRegistry`] as it is wired.

use crate::endpoint::EndpointBinding;
use crate::settings::{
    ClusterOptions, ClusteringConfig, DashboardSettings, DocumentStoreClient, GrainStorageConfig,
    MessagingOptions, MultiClusterSettings, ReminderConfig, SiloSettings, TelemetryConsumer,
};
use silo_config::RelationalVariant;
use silo_plugin::{ApplicationPartManager, ApplicationParts, ServiceCollection};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Optional driver packages the host can be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    MongoDb,
    SqlServer,
    MySql,
    /// In-memory storage, reminders and development clustering
    InMemory,
    Dashboard,
    ApplicationInsights,
    LinuxPerfCounters,
    WindowsPerfCounters,
}

impl Driver {
    pub fn relational(variant: RelationalVariant) -> Self {
        match variant {
            RelationalVariant::SqlServer => Driver::SqlServer,
            RelationalVariant::MySql => Driver::MySql,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::MongoDb => "MongoDB",
            Driver::SqlServer => "SQLDB",
            Driver::MySql => "MYSQL",
            Driver::InMemory => "InMemory",
            Driver::Dashboard => "Dashboard",
            Driver::ApplicationInsights => "ApplicationInsights",
            Driver::LinuxPerfCounters => "LinuxPerfCounters",
            Driver::WindowsPerfCounters => "WindowsPerfCounters",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{driver} driver is not available: {reason}")]
pub struct DriverError {
    pub driver: Driver,
    pub reason: String,
}

/// Drivers compiled into this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRegistry {
    available: HashSet<Driver>,
}

impl DriverRegistry {
    /// Only the in-memory driver
    pub fn minimal() -> Self {
        Self {
            available: HashSet::from([Driver::InMemory]),
        }
    }

    pub fn all() -> Self {
        Self {
            available: HashSet::from([
                Driver::MongoDb,
                Driver::SqlServer,
                Driver::MySql,
                Driver::InMemory,
                Driver::Dashboard,
                Driver::ApplicationInsights,
                Driver::LinuxPerfCounters,
                Driver::WindowsPerfCounters,
            ]),
        }
    }

    /// Drivers enabled through cargo features
    pub fn from_features() -> Self {
        let mut registry = Self::minimal();
        if cfg!(feature = "mongodb") {
            registry.available.insert(Driver::MongoDb);
        }
        if cfg!(feature = "sqlserver") {
            registry.available.insert(Driver::SqlServer);
        }
        if cfg!(feature = "mysql") {
            registry.available.insert(Driver::MySql);
        }
        if cfg!(feature = "dashboard") {
            registry.available.insert(Driver::Dashboard);
        }
        if cfg!(feature = "telemetry") {
            registry.available.extend([
                Driver::ApplicationInsights,
                Driver::LinuxPerfCounters,
                Driver::WindowsPerfCounters,
            ]);
        }
        registry
    }

    pub fn with(mut self, driver: Driver) -> Self {
        self.available.insert(driver);
        self
    }

    pub fn without(mut self, driver: Driver) -> Self {
        self.available.remove(&driver);
        self
    }

    pub fn is_available(&self, driver: Driver) -> bool {
        self.available.contains(&driver)
    }

    pub fn require(&self, driver: Driver) -> Result<(), DriverError> {
        if self.is_available(driver) {
            Ok(())
        } else {
            Err(DriverError {
                driver,
                reason: "not compiled into this host".to_string(),
            })
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::from_features()
    }
}

impl ClusteringConfig {
    pub fn driver(&self) -> Driver {
        match self {
            ClusteringConfig::DocumentStore(_) => Driver::MongoDb,
            ClusteringConfig::Relational { variant, .. } => Driver::relational(*variant),
            ClusteringConfig::Development { .. } | ClusteringConfig::Localhost { .. } => {
                Driver::InMemory
            }
        }
    }
}

impl GrainStorageConfig {
    pub fn driver(&self) -> Driver {
        match self {
            GrainStorageConfig::DocumentStore(_) => Driver::MongoDb,
            GrainStorageConfig::Relational { variant, .. } => Driver::relational(*variant),
            GrainStorageConfig::InMemory => Driver::InMemory,
        }
    }
}

impl ReminderConfig {
    pub fn driver(&self) -> Driver {
        match self {
            ReminderConfig::DocumentStore(_) => Driver::MongoDb,
            ReminderConfig::Relational { variant, .. } => Driver::relational(*variant),
            ReminderConfig::InMemory => Driver::InMemory,
        }
    }
}

impl TelemetryConsumer {
    pub fn driver(&self) -> Driver {
        match self {
            TelemetryConsumer::ApplicationInsights { .. } => Driver::ApplicationInsights,
            TelemetryConsumer::LinuxPerfCounters => Driver::LinuxPerfCounters,
            TelemetryConsumer::WindowsPerfCounters => Driver::WindowsPerfCounters,
        }
    }
}

/// Configuration surface of the actor runtime
pub trait SiloBuilder {
    fn configure_cluster(&mut self, cluster: ClusterOptions);
    fn configure_silo_name(&mut self, silo_name: &str);
    fn configure_messaging(&mut self, messaging: MessagingOptions);
    fn configure_endpoints(&mut self, binding: EndpointBinding);

    fn use_document_store_client(&mut self, client: DocumentStoreClient) -> Result<(), DriverError>;
    fn use_clustering(&mut self, clustering: ClusteringConfig) -> Result<(), DriverError>;
    fn add_grain_storage(&mut self, storage: GrainStorageConfig) -> Result<(), DriverError>;
    fn use_reminders(&mut self, reminders: ReminderConfig) -> Result<(), DriverError>;

    fn exclude_grain_types(&mut self, grain_types: &[String]);
    fn configure_multi_cluster(&mut self, settings: MultiClusterSettings);
    fn add_telemetry(&mut self, consumer: TelemetryConsumer) -> Result<(), DriverError>;
    fn use_dashboard(&mut self, dashboard: DashboardSettings) -> Result<(), DriverError>;

    /// Type-discovery surface grain modules register on
    fn application_parts(&mut self) -> &mut dyn ApplicationPartManager;

    /// Dependency-injection surface
    fn services(&mut self) -> &mut ServiceCollection;
}

/// Builder used by the real host
#[derive(Debug, Default)]
pub struct SiloHostBuilder {
    drivers: DriverRegistry,
    settings: SiloSettings,
    parts: ApplicationParts,
    services: ServiceCollection,
}

impl SiloHostBuilder {
    pub fn new(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &SiloSettings {
        &self.settings
    }

    pub fn into_parts(self) -> (SiloSettings, ApplicationParts, ServiceCollection) {
        (self.settings, self.parts, self.services)
    }
}

impl SiloBuilder for SiloHostBuilder {
    fn configure_cluster(&mut self, cluster: ClusterOptions) {
        self.settings.cluster = Some(cluster);
    }

    fn configure_silo_name(&mut self, silo_name: &str) {
        self.settings.silo_name = Some(silo_name.to_string());
    }

    fn configure_messaging(&mut self, messaging: MessagingOptions) {
        self.settings.messaging = Some(messaging);
    }

    fn configure_endpoints(&mut self, binding: EndpointBinding) {
        self.settings.endpoints = Some(binding);
    }

    fn use_document_store_client(
        &mut self,
        client: DocumentStoreClient,
    ) -> Result<(), DriverError> {
        self.drivers.require(Driver::MongoDb)?;
        self.settings.document_store_client = Some(client);
        Ok(())
    }

    fn use_clustering(&mut self, clustering: ClusteringConfig) -> Result<(), DriverError> {
        self.drivers.require(clustering.driver())?;
        debug!("Clustering: {:?}", clustering);
        self.settings.clustering = Some(clustering);
        Ok(())
    }

    fn add_grain_storage(&mut self, storage: GrainStorageConfig) -> Result<(), DriverError> {
        self.drivers.require(storage.driver())?;
        self.settings.grain_storage = Some(storage);
        Ok(())
    }

    fn use_reminders(&mut self, reminders: ReminderConfig) -> Result<(), DriverError> {
        self.drivers.require(reminders.driver())?;
        self.settings.reminders = Some(reminders);
        Ok(())
    }

    fn exclude_grain_types(&mut self, grain_types: &[String]) {
        self.settings.excluded_grain_types.extend(grain_types.iter().cloned());
    }

    fn configure_multi_cluster(&mut self, settings: MultiClusterSettings) {
        self.settings.multi_cluster = Some(settings);
    }

    fn add_telemetry(&mut self, consumer: TelemetryConsumer) -> Result<(), DriverError> {
        self.drivers.require(consumer.driver())?;
        self.settings.telemetry.push(consumer);
        Ok(())
    }

    fn use_dashboard(&mut self, dashboard: DashboardSettings) -> Result<(), DriverError> {
        self.drivers.require(Driver::Dashboard)?;
        self.settings.dashboard = Some(dashboard);
        Ok(())
    }

    fn application_parts(&mut self) -> &mut dyn ApplicationPartManager {
        &mut self.parts
    }

    fn services(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }
}
