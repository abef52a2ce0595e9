//! Module export table
//!
//! Every grain module exposes a single entry point, [`EXPORTS_SYMBOL`],
//! returning a [`ModuleExports`] that lists the types the module makes
//! available to the host. The table stands in for runtime type enumeration:
//! entries carry a kind, a capability set and an optional parameterless
//! activator, and may be unresolved errors.
//!
//! Host and modules must be built with the same toolchain and the same
//! `silo-plugin` version. Before the entry point is called the host reads
//! [`BUILD_ID_SYMBOL`], a C-ABI symbol naming both, and compares it with its
//! own [`build_id`]; [`ABI_VERSION`] is checked on the table itself.

use crate::contract::GrainServiceConfigDelegate;
use std::fmt;
use std::os::raw::c_char;
use thiserror::Error;

/// Symbol name of the module entry point
pub const EXPORTS_SYMBOL: &str = "silo_module_exports";

/// Symbol name of the build identity entry point
pub const BUILD_ID_SYMBOL: &str = "silo_module_build_id";

/// Plugin crate and compiler version, nul-terminated for [`BUILD_ID_SYMBOL`]
#[doc(hidden)]
pub static BUILD_ID_NUL: &str = concat!(
    "silo-plugin ",
    env!("CARGO_PKG_VERSION"),
    "; ",
    env!("SILO_PLUGIN_RUSTC_VERSION"),
    "\0"
);

/// Plugin crate and compiler version this copy of `silo-plugin` was built with
pub fn build_id() -> &'static str {
    BUILD_ID_NUL.trim_end_matches('\0')
}

/// Bumped whenever the export table layout changes
pub const ABI_VERSION: u32 = 1;

/// Signature of the module entry point
pub type ExportsFn = fn() -> ModuleExports;

/// Signature of the build identity entry point
pub type BuildIdFn = unsafe extern "C" fn() -> *const c_char;

/// Parameterless constructor for an exported registration delegate
pub type Activator = fn() -> Result<Box<dyn GrainServiceConfigDelegate>, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Interface,
}

/// Contract a type implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ServiceConfig,
    Grain,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Capability::ServiceConfig => 0b01,
            Capability::Grain => 0b10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl From<Capability> for CapabilitySet {
    fn from(capability: Capability) -> Self {
        Self::empty().with(capability)
    }
}

/// One loadable type in a module
#[derive(Clone)]
pub struct ExportedType {
    pub full_name: String,
    pub kind: TypeKind,
    pub capabilities: CapabilitySet,
    pub activator: Option<Activator>,
}

impl ExportedType {
    pub fn new(full_name: impl Into<String>, kind: TypeKind, capabilities: CapabilitySet) -> Self {
        Self {
            full_name: full_name.into(),
            kind,
            capabilities,
            activator: None,
        }
    }

    pub fn with_activator(mut self, activator: Activator) -> Self {
        self.activator = Some(activator);
        self
    }

    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Concrete
    }

    pub fn implements(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

impl fmt::Debug for ExportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedType")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("has_activator", &self.activator.is_some())
            .finish()
    }
}

/// An export entry whose type could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("type {type_name} could not be loaded: {reason}")]
pub struct TypeLoadError {
    pub type_name: String,
    pub reason: String,
}

/// Export table returned by a module entry point
#[derive(Debug, Clone)]
pub struct ModuleExports {
    pub abi_version: u32,
    /// [`build_id`] of the `silo-plugin` the module was built against
    pub build_id: String,
    pub module_name: String,
    pub types: Vec<Result<ExportedType, TypeLoadError>>,
}

impl ModuleExports {
    pub fn builder(module_name: impl Into<String>) -> ModuleExportsBuilder {
        ModuleExportsBuilder {
            exports: ModuleExports {
                abi_version: ABI_VERSION,
                build_id: build_id().to_string(),
                module_name: module_name.into(),
                types: Vec::new(),
            },
        }
    }

    /// Resolved types only
    pub fn loadable_types(&self) -> impl Iterator<Item = &ExportedType> {
        self.types.iter().filter_map(|entry| entry.as_ref().ok())
    }

    /// Full names of exported grain types
    pub fn grain_types(&self) -> Vec<String> {
        self.loadable_types()
            .filter(|ty| ty.implements(Capability::Grain))
            .map(|ty| ty.full_name.clone())
            .collect()
    }
}

pub struct ModuleExportsBuilder {
    exports: ModuleExports,
}

impl ModuleExportsBuilder {
    /// A concrete registration delegate constructed through `Default`
    pub fn service_config<T>(self, full_name: &str) -> Self
    where
        T: GrainServiceConfigDelegate + Default + 'static,
    {
        self.exported(
            ExportedType::new(full_name, TypeKind::Concrete, Capability::ServiceConfig.into())
                .with_activator(activate_delegate::<T>),
        )
    }

    /// A grain implementation type
    pub fn grain(self, full_name: &str) -> Self {
        self.exported(ExportedType::new(full_name, TypeKind::Concrete, Capability::Grain.into()))
    }

    /// An entry that failed to resolve (missing dependency, ...)
    pub fn unresolved(mut self, type_name: &str, reason: &str) -> Self {
        self.exports.types.push(Err(TypeLoadError {
            type_name: type_name.to_string(),
            reason: reason.to_string(),
        }));
        self
    }

    pub fn exported(mut self, exported: ExportedType) -> Self {
        self.exports.types.push(Ok(exported));
        self
    }

    pub fn build(self) -> ModuleExports {
        self.exports
    }
}

fn activate_delegate<T>() -> Result<Box<dyn GrainServiceConfigDelegate>, String>
where
    T: GrainServiceConfigDelegate + Default + 'static,
{
    Ok(Box::new(T::default()))
}

/// Define the module entry points
///
/// ```rust,ignore
/// silo_plugin::export_grain_module!(|| {
///     ModuleExports::builder("hello-grains")
///         .service_config::<HelloConfig>("hello_grains::HelloConfig")
///         .grain("hello_grains::HelloGrain")
///         .build()
/// });
/// ```
#[macro_export]
macro_rules! export_grain_module {
    ($exports:expr) => {
        #[no_mangle]
        pub extern "C" fn silo_module_build_id() -> *const ::std::os::raw::c_char {
            $crate::exports::BUILD_ID_NUL.as_ptr().cast()
        }

        #[no_mangle]
        pub fn silo_module_exports() -> $crate::ModuleExports {
            let build: fn() -> $crate::ModuleExports = $exports;
            build()
        }
    };
}
