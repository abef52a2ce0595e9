//! Host assembly
//!
//! Configuration is layered and bound first, then every wiring step runs
//! against one [`SiloBuilder`] in a fixed order:
//!
//! ```text
//! validate ─► cluster/name/messaging ─► endpoints ─► backend
//!          ─► modules (parts + service callbacks) ─► excluded grain types
//!          ─► multi-cluster ─► telemetry ─► dashboard
//! ```
//!
//! Assembly is all-or-nothing: the first error is returned unchanged and
//! the module loader (and with it every isolation context) is dropped.

use crate::builder::{DriverRegistry, SiloBuilder, SiloHostBuilder};
use crate::dashboard::{configure_dashboard, InMemoryReminderTable};
use crate::endpoint::endpoint_binding;
use crate::error::Result;
use crate::host::SiloHost;
use crate::provider::configure_backend;
use crate::settings::{ClusterOptions, MessagingOptions, MultiClusterSettings, ReminderConfig};
use crate::telemetry::configure_telemetry;
use silo_config::defaults;
use silo_config::{ConfigLayerOptions, EnvSource, HostConfiguration, HostOptions, ProcessEnv};
use silo_modules::{
    discover_modules, DiscoveredModules, LoadedModule, ModuleLoader, NativeContextFactory,
    PathResolver, SharedScope,
};
use silo_plugin::{ApplicationPart, ApplicationPartManager, ExportsFn, HostContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Everything a wiring pass reads
pub struct AssemblyContext<'a> {
    pub options: &'a HostOptions,
    pub host_context: &'a HostContext,
    pub env: &'a dyn EnvSource,
    pub resolver: &'a PathResolver,
    pub loader: &'a ModuleLoader,
    pub main_executable: Option<&'a Path>,
}

/// Modules kept alive for the lifetime of the host
#[derive(Debug, Default)]
pub struct AssembledModules {
    pub modules: Vec<LoadedModule>,
    pub main_module: Option<LoadedModule>,
}

/// Run every wiring step against `builder`
pub fn assemble<B>(builder: &mut B, ctx: &AssemblyContext<'_>) -> Result<AssembledModules>
where
    B: SiloBuilder + ?Sized,
{
    let options = ctx.options;
    let silo = &options.silo;

    // Nothing is wired for an invalid configuration
    silo.validate()?;

    builder.configure_cluster(ClusterOptions {
        cluster_id: silo.cluster_id.clone(),
        service_id: silo.service_id.clone(),
    });
    if let Some(name) = silo.silo_name() {
        builder.configure_silo_name(name);
    }

    let response_timeout = silo.response_timeout();
    builder.configure_messaging(MessagingOptions {
        response_timeout,
        response_timeout_with_debugger: response_timeout.saturating_add(Duration::from_secs_f64(
            defaults::silo::DEBUGGER_TIMEOUT_ALLOWANCE_MINUTES * 60.0,
        )),
    });

    let binding = endpoint_binding(silo, ctx.env);
    info!("Endpoint binding: {:?}", binding);
    builder.configure_endpoints(binding);

    configure_backend(builder, &options.provider, silo)?;

    let discovered = discover_modules(
        &options.grain,
        ctx.resolver,
        ctx.loader,
        ctx.main_executable,
    )?;
    let modules = apply_modules(builder, discovered, ctx.host_context);

    if !silo.excluded_grain_types.is_empty() {
        info!("Excluding {} grain type(s)", silo.excluded_grain_types.len());
        builder.exclude_grain_types(&silo.excluded_grain_types);
    }

    if silo.is_multi_cluster {
        let settings = MultiClusterSettings {
            default_multi_cluster: silo.effective_default_multi_cluster(),
            gossip_channels: silo.gossip_channels.clone().unwrap_or_default(),
        };
        info!(
            "Multi-cluster enabled: clusters {:?}, {} gossip channel(s)",
            settings.default_multi_cluster,
            settings.gossip_channels.len()
        );
        builder.configure_multi_cluster(settings);
    }

    configure_telemetry(builder, silo)?;
    configure_dashboard(builder, &options.dashboard)?;

    Ok(modules)
}

/// Register LoadPaths modules as application parts, then run every
/// callback in discovery order
fn apply_modules<B>(
    builder: &mut B,
    discovered: DiscoveredModules,
    host_context: &HostContext,
) -> AssembledModules
where
    B: SiloBuilder + ?Sized,
{
    for module in &discovered.modules {
        let part =
            ApplicationPart::new(module.name()).with_grain_types(module.exports.grain_types());
        if builder.application_parts().add_part(part) {
            debug!("Registered application part {}", module.name());
        }
    }

    for callback in &discovered.callbacks {
        debug!(
            "Applying registration delegate {} from {}",
            callback.type_name, callback.module_name
        );
        (callback.app_part)(builder.application_parts());
        if let Some(service) = &callback.service {
            builder
                .services()
                .with_lease(callback.lease.clone(), |services| service(host_context, services));
        }
    }

    AssembledModules {
        modules: discovered.modules,
        main_module: discovered.main_module,
    }
}

/// Builds a runnable [`SiloHost`] from arguments and the environment
pub struct HostAssembly {
    env: Arc<dyn EnvSource>,
    layer_options: ConfigLayerOptions,
    exe_dir: Option<PathBuf>,
    main_executable: Option<PathBuf>,
    main_exports: Option<ExportsFn>,
    in_process: Vec<(PathBuf, ExportsFn)>,
    drivers: DriverRegistry,
}

impl Default for HostAssembly {
    fn default() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }
}

impl HostAssembly {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self {
            env,
            layer_options: ConfigLayerOptions::default(),
            exe_dir: None,
            main_executable: None,
            main_exports: None,
            in_process: Vec::new(),
            drivers: DriverRegistry::default(),
        }
    }

    pub fn with_layer_options(mut self, layer_options: ConfigLayerOptions) -> Self {
        self.layer_options = layer_options;
        self
    }

    /// Directory relative load paths are anchored at
    pub fn with_exe_dir(mut self, exe_dir: impl Into<PathBuf>) -> Self {
        self.exe_dir = Some(exe_dir.into());
        self
    }

    /// Export table of the main executable, served in-process at `path`
    pub fn with_main_module(mut self, path: impl Into<PathBuf>, exports: ExportsFn) -> Self {
        self.main_executable = Some(path.into());
        self.main_exports = Some(exports);
        self
    }

    /// Serve `path` from an export table linked into this process
    pub fn with_in_process_module(mut self, path: impl Into<PathBuf>, exports: ExportsFn) -> Self {
        self.in_process.push((path.into(), exports));
        self
    }

    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Layer configuration from `args` and the environment, then assemble
    pub fn build(&self, args: &[String]) -> Result<SiloHost> {
        let configuration = HostConfiguration::load(args, self.env.as_ref(), &self.layer_options)?;
        self.build_from(configuration)
    }

    /// Assemble from an already layered configuration
    pub fn build_from(&self, configuration: HostConfiguration) -> Result<SiloHost> {
        let options = HostOptions::bind(&configuration)?;
        let host_context = HostContext::new(
            configuration.environment.clone(),
            configuration.app.clone(),
        );

        let resolver = match &self.exe_dir {
            Some(dir) => PathResolver::new(dir.clone(), Arc::clone(&self.env)),
            None => PathResolver::for_current_exe(Arc::clone(&self.env)),
        };

        let mut factory = NativeContextFactory::new();
        for (path, exports) in &self.in_process {
            factory.register_in_process(resolver.resolve(&path.to_string_lossy()), *exports);
        }
        if let (Some(path), Some(exports)) = (&self.main_executable, self.main_exports) {
            factory.register_in_process(path.clone(), exports);
        }
        let loader = ModuleLoader::new(
            Arc::new(factory),
            SharedScope::new(options.grain.shared_libraries.iter()),
        );

        let mut builder = SiloHostBuilder::new(self.drivers.clone());
        let modules = assemble(
            &mut builder,
            &AssemblyContext {
                options: &options,
                host_context: &host_context,
                env: self.env.as_ref(),
                resolver: &resolver,
                loader: &loader,
                main_executable: self.main_executable.as_deref(),
            },
        )?;

        let (settings, parts, mut services) = builder.into_parts();
        if settings.reminders == Some(ReminderConfig::InMemory) {
            services.add_singleton(InMemoryReminderTable::new());
        }

        info!(
            "Silo {} assembled: {} application part(s), {} service registration(s)",
            options.silo.cluster_id,
            parts.parts().len(),
            services.len()
        );

        Ok(SiloHost::new(
            settings,
            parts,
            services.build_provider(),
            host_context,
            modules,
            loader,
        ))
    }
}
