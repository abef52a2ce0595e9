//! Assembled silo host

use crate::assembly::AssembledModules;
use crate::dashboard::{DashboardReminders, InMemoryReminderTable, ReminderTable};
use crate::settings::SiloSettings;
use silo_modules::{ModuleLoader, ReleaseReport};
use silo_plugin::{ApplicationParts, HostContext, ServiceProvider};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A fully configured, not yet started silo
///
/// Owns the module loader; dropping the host releases every isolation
/// context after the services and modules that reference them.
pub struct SiloHost {
    services: ServiceProvider,
    parts: ApplicationParts,
    settings: SiloSettings,
    context: HostContext,
    modules: AssembledModules,
    // Dropped last
    loader: ModuleLoader,
}

impl SiloHost {
    pub(crate) fn new(
        settings: SiloSettings,
        parts: ApplicationParts,
        services: ServiceProvider,
        context: HostContext,
        modules: AssembledModules,
        loader: ModuleLoader,
    ) -> Self {
        Self {
            services,
            parts,
            settings,
            context,
            modules,
            loader,
        }
    }

    pub fn settings(&self) -> &SiloSettings {
        &self.settings
    }

    pub fn parts(&self) -> &ApplicationParts {
        &self.parts
    }

    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    pub fn context(&self) -> &HostContext {
        &self.context
    }

    pub fn modules(&self) -> &AssembledModules {
        &self.modules
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Reminder view for the dashboard, backed by the registered table
    pub fn dashboard_reminders(&self) -> DashboardReminders {
        let table = self
            .services
            .get::<InMemoryReminderTable>()
            .map(|table| table as Arc<dyn ReminderTable>);
        DashboardReminders::new(table)
    }

    /// Run until Ctrl-C, then release every module
    pub async fn run(self) -> ReleaseReport {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Run until `shutdown` completes; cancellation is a normal shutdown
    pub async fn run_until<F>(self, shutdown: F) -> ReleaseReport
    where
        F: Future<Output = ()>,
    {
        info!(
            "Silo {} running",
            self.settings
                .cluster
                .as_ref()
                .map(|cluster| cluster.cluster_id.as_str())
                .unwrap_or_default()
        );
        shutdown.await;
        info!("Shutdown requested");
        self.shutdown()
    }

    /// Release services and modules, then every isolation context
    pub fn shutdown(self) -> ReleaseReport {
        let SiloHost {
            services,
            parts,
            modules,
            loader,
            ..
        } = self;
        drop(services);
        drop(parts);
        drop(modules);

        let report = loader.release_all();
        for failure in &report.failures {
            warn!("Module release failed: {}", failure);
        }
        info!(
            "Released {} isolation context(s), {} failure(s)",
            report.released,
            report.failures.len()
        );
        report
    }
}

impl std::fmt::Debug for SiloHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiloHost")
            .field("settings", &self.settings)
            .field("environment", &self.context.environment_name)
            .field("modules", &self.modules)
            .field("contexts", &self.loader.context_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClusterOptions;
    use silo_modules::SharedScope;
    use std::time::Duration;

    fn empty_host() -> SiloHost {
        let settings = SiloSettings {
            cluster: Some(ClusterOptions {
                cluster_id: "c1".to_string(),
                service_id: "s1".to_string(),
            }),
            ..SiloSettings::default()
        };
        SiloHost::new(
            settings,
            ApplicationParts::new(),
            ServiceProvider::default(),
            HostContext::new("Production", serde_json::Value::Null),
            AssembledModules::default(),
            ModuleLoader::native(SharedScope::default()),
        )
    }

    #[tokio::test]
    async fn test_run_until_releases_modules() {
        let host = empty_host();
        let report = host
            .run_until(tokio::time::sleep(Duration::from_millis(5)))
            .await;
        assert!(report.is_clean());
        assert_eq!(report.released, 0);
    }

    #[test]
    fn test_no_reminder_table_without_in_memory_reminders() {
        let host = empty_host();
        assert!(!host.dashboard_reminders().has_table());
        assert!(host.dashboard_reminders().reminder_rows().is_empty());
    }
}
