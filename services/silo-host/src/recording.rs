//! Recording builder for assembly tests
//!
//! Logs every builder call in order instead of accumulating settings, so
//! tests can assert exactly which wiring calls a configuration produces.

use crate::builder::{Driver, DriverError, DriverRegistry, SiloBuilder};
use crate::endpoint::EndpointBinding;
use crate::settings::{
    ClusterOptions, ClusteringConfig, DashboardSettings, DocumentStoreClient, GrainStorageConfig,
    MessagingOptions, MultiClusterSettings, ReminderConfig, TelemetryConsumer,
};
use silo_plugin::{ApplicationPartManager, ApplicationParts, ServiceCollection};

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderCall {
    Cluster(ClusterOptions),
    SiloName(String),
    Messaging(MessagingOptions),
    Endpoints(EndpointBinding),
    DocumentStoreClient(DocumentStoreClient),
    Clustering(ClusteringConfig),
    GrainStorage(GrainStorageConfig),
    Reminders(ReminderConfig),
    ExcludedGrainTypes(Vec<String>),
    MultiCluster(MultiClusterSettings),
    Telemetry(TelemetryConsumer),
    Dashboard(DashboardSettings),
}

#[derive(Debug)]
pub struct RecordingSiloBuilder {
    drivers: DriverRegistry,
    calls: Vec<BuilderCall>,
    parts: ApplicationParts,
    services: ServiceCollection,
}

impl Default for RecordingSiloBuilder {
    fn default() -> Self {
        Self::new(DriverRegistry::all())
    }
}

impl RecordingSiloBuilder {
    pub fn new(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            calls: Vec::new(),
            parts: ApplicationParts::new(),
            services: ServiceCollection::new(),
        }
    }

    pub fn calls(&self) -> &[BuilderCall] {
        &self.calls
    }

    pub fn parts(&self) -> &ApplicationParts {
        &self.parts
    }

    pub fn registered_services(&self) -> &ServiceCollection {
        &self.services
    }

    /// Recorded clustering, if any
    pub fn clustering(&self) -> Option<&ClusteringConfig> {
        self.calls.iter().find_map(|call| match call {
            BuilderCall::Clustering(clustering) => Some(clustering),
            _ => None,
        })
    }

    fn record(&mut self, driver: Driver, call: BuilderCall) -> Result<(), DriverError> {
        self.drivers.require(driver)?;
        self.calls.push(call);
        Ok(())
    }
}

impl SiloBuilder for RecordingSiloBuilder {
    fn configure_cluster(&mut self, cluster: ClusterOptions) {
        self.calls.push(BuilderCall::Cluster(cluster));
    }

    fn configure_silo_name(&mut self, silo_name: &str) {
        self.calls.push(BuilderCall::SiloName(silo_name.to_string()));
    }

    fn configure_messaging(&mut self, messaging: MessagingOptions) {
        self.calls.push(BuilderCall::Messaging(messaging));
    }

    fn configure_endpoints(&mut self, binding: EndpointBinding) {
        self.calls.push(BuilderCall::Endpoints(binding));
    }

    fn use_document_store_client(
        &mut self,
        client: DocumentStoreClient,
    ) -> Result<(), DriverError> {
        self.record(Driver::MongoDb, BuilderCall::DocumentStoreClient(client))
    }

    fn use_clustering(&mut self, clustering: ClusteringConfig) -> Result<(), DriverError> {
        self.record(clustering.driver(), BuilderCall::Clustering(clustering))
    }

    fn add_grain_storage(&mut self, storage: GrainStorageConfig) -> Result<(), DriverError> {
        self.record(storage.driver(), BuilderCall::GrainStorage(storage))
    }

    fn use_reminders(&mut self, reminders: ReminderConfig) -> Result<(), DriverError> {
        self.record(reminders.driver(), BuilderCall::Reminders(reminders))
    }

    fn exclude_grain_types(&mut self, grain_types: &[String]) {
        self.calls.push(BuilderCall::ExcludedGrainTypes(grain_types.to_vec()));
    }

    fn configure_multi_cluster(&mut self, settings: MultiClusterSettings) {
        self.calls.push(BuilderCall::MultiCluster(settings));
    }

    fn add_telemetry(&mut self, consumer: TelemetryConsumer) -> Result<(), DriverError> {
        self.record(consumer.driver(), BuilderCall::Telemetry(consumer))
    }

    fn use_dashboard(&mut self, dashboard: DashboardSettings) -> Result<(), DriverError> {
        self.record(Driver::Dashboard, BuilderCall::Dashboard(dashboard))
    }

    fn application_parts(&mut self) -> &mut dyn ApplicationPartManager {
        &mut self.parts
    }

    fn services(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }
}
