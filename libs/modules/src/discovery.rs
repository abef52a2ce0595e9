//! Plugin discovery
//!
//! Turns loaded modules into registration callbacks: every concrete,
//! non-excluded exported type carrying the service-config capability is
//! instantiated and asked for its callbacks.

use crate::error::{ModuleError, Result};
use crate::loader::{LoadedModule, ModuleLoader};
use crate::path::PathResolver;
use silo_config::options::GrainLoadOption;
use silo_plugin::{
    AppPartAction, Capability, ExportedType, GrainServiceConfigDelegate, LibraryLease,
    ServiceAction,
};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Callbacks produced by one registration delegate
pub struct RegistrationCallback {
    pub type_name: String,
    pub module_name: String,
    pub app_part: AppPartAction,
    pub service: Option<ServiceAction>,
    /// Keeps the callbacks' code loaded; attach it to services they register
    pub lease: LibraryLease,
}

impl fmt::Debug for RegistrationCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationCallback")
            .field("type_name", &self.type_name)
            .field("module_name", &self.module_name)
            .field("has_service", &self.service.is_some())
            .field("lease", &self.lease)
            .finish()
    }
}

/// Extract registration callbacks from one module, in export order
pub fn discover(
    module: &LoadedModule,
    excluded: &HashSet<String>,
) -> Result<Vec<RegistrationCallback>> {
    let mut callbacks = Vec::new();

    for entry in &module.exports.types {
        let exported = match entry {
            Ok(exported) => exported,
            Err(e) => {
                debug!("Skipping unloadable type in {}: {}", module.name(), e);
                continue;
            }
        };

        if !exported.implements(Capability::ServiceConfig) || !exported.is_concrete() {
            continue;
        }
        if excluded.contains(&exported.full_name) {
            info!("Excluded plugin type {} in {}", exported.full_name, module.name());
            continue;
        }

        let delegate = instantiate(exported)?;
        callbacks.push(RegistrationCallback {
            type_name: exported.full_name.clone(),
            module_name: module.name().to_string(),
            app_part: delegate.app_part_configuration(),
            service: delegate.service_configuration(),
            lease: module.lease().clone(),
        });
    }

    Ok(callbacks)
}

fn instantiate(exported: &ExportedType) -> Result<Box<dyn GrainServiceConfigDelegate>> {
    let failed = |reason: String| ModuleError::PluginInstantiationFailed {
        type_name: exported.full_name.clone(),
        reason,
    };

    let activator = exported
        .activator
        .ok_or_else(|| failed("no parameterless constructor".to_string()))?;
    activator().map_err(failed)
}

/// Modules loaded from `LoadPaths` plus every callback, in discovery order
#[derive(Debug, Default)]
pub struct DiscoveredModules {
    /// Modules from `LoadPaths`, registered as application parts
    pub modules: Vec<LoadedModule>,
    /// The main executable's module, when its delegates were requested
    pub main_module: Option<LoadedModule>,
    pub callbacks: Vec<RegistrationCallback>,
}

/// Resolve, load and discover every configured module
///
/// The main executable is scanned after `LoadPaths` when
/// `CallMainExecutionPathServiceConfigDelegate` is set.
pub fn discover_modules(
    option: &GrainLoadOption,
    resolver: &PathResolver,
    loader: &ModuleLoader,
    main_executable: Option<&Path>,
) -> Result<DiscoveredModules> {
    let excluded = option.excluded_set();
    let mut discovered = DiscoveredModules::default();

    for configured in &option.load_paths {
        let path = resolver.resolve(configured);
        info!("Loading grain module {:?}", path);
        let module = loader.load(&path)?;
        discovered.callbacks.extend(discover(&module, &excluded)?);
        discovered.modules.push(module);
    }

    if option.call_main_execution_path_service_config_delegate {
        let main_path = match main_executable {
            Some(path) => path.to_path_buf(),
            None => std::env::current_exe()
                .map_err(|e| ModuleError::load_failed(resolver.exe_dir(), e))?,
        };
        debug!("Scanning main executable {:?} for registration delegates", main_path);
        let module = loader.load(&main_path)?;
        discovered.callbacks.extend(discover(&module, &excluded)?);
        discovered.main_module = Some(module);
    }

    info!(
        "Discovered {} registration delegate(s) across {} module(s)",
        discovered.callbacks.len(),
        discovered.modules.len() + usize::from(discovered.main_module.is_some())
    );
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{NativeContextFactory, SharedScope};
    use silo_config::env::MapEnv;
    use silo_plugin::{ApplicationPartManager, ApplicationParts, ExportedType, ModuleExports, TypeKind};
    use std::sync::Arc;

    #[derive(Default)]
    struct FirstConfig;

    impl GrainServiceConfigDelegate for FirstConfig {
        fn service_configuration(&self) -> Option<ServiceAction> {
            None
        }
    }

    #[derive(Default)]
    struct SecondConfig;

    impl GrainServiceConfigDelegate for SecondConfig {
        fn service_configuration(&self) -> Option<ServiceAction> {
            Some(Box::new(|_ctx, _services| {}))
        }
    }

    fn failing_activator() -> std::result::Result<Box<dyn GrainServiceConfigDelegate>, String> {
        Err("constructor panicked".to_string())
    }

    fn mixed_exports() -> ModuleExports {
        ModuleExports::builder("mixed")
            .unresolved("mixed::NeedsMissingLib", "libmissing.so not found")
            .service_config::<FirstConfig>("mixed::FirstConfig")
            .grain("mixed::HelloGrain")
            .exported(ExportedType::new(
                "mixed::AbstractConfig",
                TypeKind::Abstract,
                Capability::ServiceConfig.into(),
            ))
            .service_config::<SecondConfig>("mixed::SecondConfig")
            .build()
    }

    fn service_config_type(full_name: &str) -> ExportedType {
        ExportedType::new(full_name, TypeKind::Concrete, Capability::ServiceConfig.into())
    }

    fn failing_exports() -> ModuleExports {
        ModuleExports::builder("failing")
            .exported(service_config_type("failing::Config").with_activator(failing_activator))
            .build()
    }

    fn no_constructor_exports() -> ModuleExports {
        ModuleExports::builder("noctor")
            .exported(service_config_type("noctor::Config"))
            .build()
    }

    fn main_exports() -> ModuleExports {
        ModuleExports::builder("main")
            .service_config::<FirstConfig>("main::MainConfig")
            .build()
    }

    fn loader() -> ModuleLoader {
        let mut factory = NativeContextFactory::new();
        factory
            .register_in_process("/opt/silo/bin/mixed.so", mixed_exports)
            .register_in_process("/opt/silo/bin/failing.so", failing_exports)
            .register_in_process("/opt/silo/bin/noctor.so", no_constructor_exports)
            .register_in_process("/opt/silo/bin/silo-host", main_exports);
        ModuleLoader::new(Arc::new(factory), SharedScope::default())
    }

    fn resolver() -> PathResolver {
        PathResolver::new("/opt/silo/bin", Arc::new(MapEnv::new()))
    }

    #[test]
    fn test_partial_load_keeps_resolvable_types() {
        let loader = loader();
        let module = loader.load(Path::new("/opt/silo/bin/mixed.so")).unwrap();

        let callbacks = discover(&module, &HashSet::new()).unwrap();
        let names: Vec<&str> = callbacks.iter().map(|c| c.type_name.as_str()).collect();
        assert_eq!(names, vec!["mixed::FirstConfig", "mixed::SecondConfig"]);
        assert!(callbacks[0].service.is_none());
        assert!(callbacks[1].service.is_some());
        assert!(callbacks.iter().all(|c| c.module_name == "mixed"));

        let mut parts = ApplicationParts::new();
        (callbacks[0].app_part)(&mut parts);
        assert!(parts.parts().is_empty());
    }

    #[test]
    fn test_excluded_types_are_not_instantiated() {
        let loader = loader();
        let failing = loader.load(Path::new("/opt/silo/bin/failing.so")).unwrap();

        let excluded = HashSet::from(["failing::Config".to_string()]);
        assert!(discover(&failing, &excluded).unwrap().is_empty());
    }

    #[test]
    fn test_activator_failure() {
        let loader = loader();
        let failing = loader.load(Path::new("/opt/silo/bin/failing.so")).unwrap();
        match discover(&failing, &HashSet::new()) {
            Err(ModuleError::PluginInstantiationFailed { type_name, reason }) => {
                assert_eq!(type_name, "failing::Config");
                assert!(reason.contains("panicked"));
            }
            other => panic!("expected instantiation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_type_without_constructor() {
        let loader = loader();
        let module = loader.load(Path::new("/opt/silo/bin/noctor.so")).unwrap();
        match discover(&module, &HashSet::new()) {
            Err(ModuleError::PluginInstantiationFailed { type_name, reason }) => {
                assert_eq!(type_name, "noctor::Config");
                assert_eq!(reason, "no parameterless constructor");
            }
            other => panic!("expected instantiation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_modules_order_and_main_executable() {
        let loader = loader();
        let option = GrainLoadOption {
            load_paths: vec!["mixed.so".to_string()],
            call_main_execution_path_service_config_delegate: true,
            ..GrainLoadOption::default()
        };

        let discovered = discover_modules(
            &option,
            &resolver(),
            &loader,
            Some(Path::new("/opt/silo/bin/silo-host")),
        )
        .unwrap();

        assert_eq!(discovered.modules.len(), 1);
        assert_eq!(discovered.modules[0].name(), "mixed");
        assert_eq!(discovered.main_module.as_ref().map(LoadedModule::name), Some("main"));
        let names: Vec<&str> = discovered
            .callbacks
            .iter()
            .map(|c| c.type_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["mixed::FirstConfig", "mixed::SecondConfig", "main::MainConfig"]
        );
        // In-process modules never unload
        assert!(discovered.callbacks.iter().all(|c| !c.lease.is_held()));
    }

    #[test]
    fn test_discover_modules_stops_at_first_failure() {
        let loader = loader();
        let option = GrainLoadOption {
            load_paths: vec!["mixed.so".to_string(), "missing.so".to_string()],
            ..GrainLoadOption::default()
        };

        match discover_modules(&option, &resolver(), &loader, None) {
            Err(ModuleError::LoadFailed { path, .. }) => {
                assert_eq!(path, Path::new("/opt/silo/bin/missing.so"))
            }
            other => panic!("expected load failure, got {:?}", other),
        }
    }
}
