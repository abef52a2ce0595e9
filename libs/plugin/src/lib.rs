//! # Silo Plugin Contract
//!
//! Types shared between the silo host and dynamically loaded grain modules.
//!
//! A grain module depends on this crate, implements
//! [`GrainServiceConfigDelegate`] for each registration delegate it ships,
//! and lists them in its export table with [`export_grain_module!`]:
//!
//! ```rust,ignore
//! use silo_plugin::{GrainServiceConfigDelegate, ModuleExports, ServiceAction};
//!
//! #[derive(Default)]
//! pub struct HelloConfig;
//!
//! impl GrainServiceConfigDelegate for HelloConfig {
//!     fn service_configuration(&self) -> Option<ServiceAction> {
//!         Some(Box::new(|_ctx, services| {
//!             services.add_singleton(Greeter);
//!         }))
//!     }
//! }
//!
//! silo_plugin::export_grain_module!(|| {
//!     ModuleExports::builder("hello")
//!         .service_config::<HelloConfig>("hello::HelloConfig")
//!         .build()
//! });
//! ```

pub mod context;
pub mod contract;
pub mod exports;
pub mod lease;
pub mod parts;
pub mod services;

pub use context::HostContext;
pub use contract::{AppPartAction, GrainServiceConfigDelegate, ServiceAction};
pub use exports::{
    build_id, Activator, BuildIdFn, Capability, CapabilitySet, ExportedType, ExportsFn,
    ModuleExports, ModuleExportsBuilder, TypeKind, TypeLoadError, ABI_VERSION, BUILD_ID_SYMBOL,
    EXPORTS_SYMBOL,
};
pub use lease::LibraryLease;
pub use parts::{ApplicationPart, ApplicationPartManager, ApplicationParts};
pub use services::{ServiceCollection, ServiceDescriptor, ServiceLifetime, ServiceProvider};
