//! Registration contract implemented by grain modules

use crate::context::HostContext;
use crate::parts::ApplicationPartManager;
use crate::services::ServiceCollection;

/// Callback applied to the host's application-parts surface
pub type AppPartAction = Box<dyn Fn(&mut dyn ApplicationPartManager) + Send + Sync>;

/// Callback applied to the host's service-registration surface
pub type ServiceAction = Box<dyn Fn(&HostContext, &mut ServiceCollection) + Send + Sync>;

/// Per-module registration delegate
///
/// A grain module exports one or more concrete types implementing this trait.
/// The host instantiates each through its parameterless activator, then runs
/// the application-parts callback followed by the service callback.
pub trait GrainServiceConfigDelegate: Send + Sync {
    /// Application-parts registration; does nothing unless overridden
    fn app_part_configuration(&self) -> AppPartAction {
        Box::new(|_parts| {})
    }

    /// Service registration, if the module has any services to add
    fn service_configuration(&self) -> Option<ServiceAction>;
}
