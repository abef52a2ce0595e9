//! # Hello Grains
//!
//! Sample grain module. Built as a `cdylib` it can be listed in
//! `Orleans:GrainOption:LoadPaths`; built as an `rlib` its export table can
//! be served in-process.

use silo_plugin::{
    AppPartAction, ApplicationPart, GrainServiceConfigDelegate, ModuleExports, ServiceAction,
    ServiceProvider,
};
use std::sync::Arc;
use tracing::info;

pub const MODULE_NAME: &str = "hello-grains";
pub const HELLO_GRAIN: &str = "hello_grains::HelloGrain";

/// Greeting service registered by [`HelloGrainServiceConfigure`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Greeter;

impl Greeter {
    pub fn do_greeting(&self, greeting: &str) -> String {
        info!("SayHello message received: greeting = '{}'", greeting);
        format!("You said: '{}', I say: Hello!", greeting)
    }
}

#[derive(Debug, Clone)]
pub struct HelloGrain {
    greeter: Arc<Greeter>,
}

impl HelloGrain {
    pub fn new(greeter: Arc<Greeter>) -> Self {
        Self { greeter }
    }

    /// Activate against a service provider; `None` when no greeter is registered
    pub fn activate(services: &ServiceProvider) -> Option<Self> {
        services.get::<Greeter>().map(Self::new)
    }

    pub fn say_hello(&self, greeting: &str) -> String {
        info!("HelloGrain received a call");
        self.greeter.do_greeting(greeting)
    }
}

/// Registers the hello grain part and a transient [`Greeter`]
#[derive(Debug, Default)]
pub struct HelloGrainServiceConfigure;

impl GrainServiceConfigDelegate for HelloGrainServiceConfigure {
    fn app_part_configuration(&self) -> AppPartAction {
        Box::new(|parts| {
            parts.add_part(ApplicationPart::new(MODULE_NAME).with_grain_types([HELLO_GRAIN]));
        })
    }

    fn service_configuration(&self) -> Option<ServiceAction> {
        Some(Box::new(|_ctx, services| {
            services.add_transient(|_provider| Greeter);
        }))
    }
}

/// Part registration only
#[derive(Debug, Default)]
pub struct UtilityGrainServiceConfigure;

impl GrainServiceConfigDelegate for UtilityGrainServiceConfigure {
    fn service_configuration(&self) -> Option<ServiceAction> {
        None
    }
}

pub fn module_exports() -> ModuleExports {
    ModuleExports::builder(MODULE_NAME)
        .service_config::<HelloGrainServiceConfigure>("hello_grains::HelloGrainServiceConfigure")
        .service_config::<UtilityGrainServiceConfigure>(
            "hello_grains::UtilityGrainServiceConfigure",
        )
        .grain(HELLO_GRAIN)
        .build()
}

silo_plugin::export_grain_module!(module_exports);

#[cfg(test)]
mod tests {
    use super::*;
    use silo_plugin::{ApplicationPartManager, ApplicationParts, HostContext, ServiceCollection};

    #[test]
    fn test_greeting() {
        assert_eq!(Greeter.do_greeting("hi"), "You said: 'hi', I say: Hello!");
    }

    #[test]
    fn test_export_table() {
        let exports = silo_module_exports();
        assert_eq!(exports.module_name, MODULE_NAME);
        assert_eq!(exports.grain_types(), vec![HELLO_GRAIN.to_string()]);
        assert_eq!(exports.loadable_types().count(), 3);
    }

    #[test]
    fn test_registration_activates_grain() {
        let delegate = HelloGrainServiceConfigure;

        let mut parts = ApplicationParts::new();
        (delegate.app_part_configuration())(&mut parts);
        assert!(parts.contains(MODULE_NAME));

        let mut services = ServiceCollection::new();
        let configure = delegate.service_configuration().unwrap();
        configure(&HostContext::new("Production", serde_json::Value::Null), &mut services);

        let provider = services.build_provider();
        let grain = HelloGrain::activate(&provider).unwrap();
        assert_eq!(grain.say_hello("hey"), "You said: 'hey', I say: Hello!");
    }
}
