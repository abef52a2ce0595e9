//! Service registration surface
//!
//! A minimal type-keyed container. Registration callbacks add descriptors
//! to a [`ServiceCollection`]; the host freezes it into a
//! [`ServiceProvider`] once assembly is complete.
//!
//! Registrations made while a [`LibraryLease`] is active keep that lease, so
//! a provider outliving host shutdown keeps the module's code loaded.

use crate::lease::LibraryLease;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

type AnyService = Arc<dyn Any + Send + Sync>;
type ServiceFactory = Arc<dyn Fn(&ServiceProvider) -> AnyService + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// One shared instance
    Singleton,
    /// New instance per resolution
    Transient,
}

#[derive(Clone)]
enum Implementation {
    Instance(AnyService),
    Factory(ServiceFactory),
}

/// One registration
#[derive(Clone)]
pub struct ServiceDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    lifetime: ServiceLifetime,
    implementation: Implementation,
    // Dropped after `implementation`
    lease: LibraryLease,
}

impl ServiceDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Borrowed from the descriptor: the text may live in a module image
    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn lease(&self) -> &LibraryLease {
        &self.lease
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("type_name", &self.type_name)
            .field("lifetime", &self.lifetime)
            .field("lease", &self.lease)
            .finish()
    }
}

/// Mutable set of service registrations
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    /// Attached to every registration made while set
    lease: LibraryLease,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `register` with `lease` attached to everything it adds
    pub fn with_lease<R>(
        &mut self,
        lease: LibraryLease,
        register: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.lease, lease);
        let result = register(self);
        self.lease = previous;
        result
    }

    /// Register a shared instance
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, instance: T) -> &mut Self {
        self.descriptors.push(ServiceDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            lifetime: ServiceLifetime::Singleton,
            implementation: Implementation::Instance(Arc::new(instance)),
            lease: self.lease.clone(),
        });
        self
    }

    /// Register a factory run on every resolution
    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
    {
        self.descriptors.push(ServiceDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            lifetime: ServiceLifetime::Transient,
            implementation: Implementation::Factory(Arc::new(move |provider| {
                Arc::new(factory(provider)) as AnyService
            })),
            lease: self.lease.clone(),
        });
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let wanted = TypeId::of::<T>();
        self.descriptors.iter().any(|descriptor| descriptor.type_id == wanted)
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Freeze registrations into a resolver
    pub fn build_provider(self) -> ServiceProvider {
        ServiceProvider {
            descriptors: Arc::new(self.descriptors),
        }
    }
}

/// Read-only resolver over frozen registrations
#[derive(Debug, Clone, Default)]
pub struct ServiceProvider {
    descriptors: Arc<Vec<ServiceDescriptor>>,
}

impl ServiceProvider {
    /// Resolve a service; the last registration for a type wins
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.descriptors
            .iter()
            .rev()
            .find(|descriptor| descriptor.type_id == wanted)
            .and_then(|descriptor| self.materialize(descriptor))
    }

    /// Resolve every registration for a type, in registration order
    pub fn get_all<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.descriptors
            .iter()
            .filter(|descriptor| descriptor.type_id == wanted)
            .filter_map(|descriptor| self.materialize(descriptor))
            .collect()
    }

    /// Resolve by registered type name, for callers that cannot name the type
    pub fn get_named(&self, type_name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.descriptors
            .iter()
            .rev()
            .find(|descriptor| descriptor.type_name == type_name)
            .map(|descriptor| self.instantiate(descriptor))
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn instantiate(&self, descriptor: &ServiceDescriptor) -> AnyService {
        match &descriptor.implementation {
            Implementation::Instance(instance) => Arc::clone(instance),
            Implementation::Factory(factory) => factory(self),
        }
    }

    fn materialize<T>(&self, descriptor: &ServiceDescriptor) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.instantiate(descriptor).downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    struct Prefix(String);

    #[test]
    fn test_last_registration_wins() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Greeting("first")).add_singleton(Greeting("second"));

        let provider = services.build_provider();
        assert_eq!(*provider.get::<Greeting>().unwrap(), Greeting("second"));
        assert_eq!(provider.get_all::<Greeting>().len(), 2);
        assert!(provider.get::<Prefix>().is_none());
    }

    #[test]
    fn test_singleton_is_shared() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Greeting("hi"));
        let provider = services.build_provider();

        let a = provider.get::<Greeting>().unwrap();
        let b = provider.get::<Greeting>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_transient_runs_factory_each_time() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let mut services = ServiceCollection::new();
        services.add_singleton(Prefix(">> ".to_string()));
        services.add_transient(|provider: &ServiceProvider| {
            BUILT.fetch_add(1, Ordering::SeqCst);
            let prefix = provider.get::<Prefix>().map(|p| p.0.clone()).unwrap_or_default();
            format!("{prefix}hello")
        });

        assert_eq!(services.descriptors()[1].lifetime(), ServiceLifetime::Transient);
        let provider = services.build_provider();
        assert_eq!(provider.get::<String>().unwrap().as_str(), ">> hello");
        provider.get::<String>().unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_get_named() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Greeting("hi"));
        let provider = services.build_provider();

        let service = provider.get_named(type_name::<Greeting>()).unwrap();
        assert_eq!(service.downcast_ref::<Greeting>(), Some(&Greeting("hi")));
        assert!(provider.get_named("unknown::Service").is_none());
    }

    #[test]
    fn test_cloned_provider_keeps_module_lease() {
        let image = Arc::new(());
        let mut services = ServiceCollection::new();
        services.add_singleton(Prefix("host".to_string()));
        services.with_lease(LibraryLease::new(Arc::clone(&image)), |services| {
            services.add_transient(|_: &ServiceProvider| Greeting("module"));
        });
        services.add_singleton(Greeting("host"));

        let leases: Vec<bool> = services
            .descriptors()
            .iter()
            .map(|d| d.lease().is_held())
            .collect();
        assert_eq!(leases, vec![false, true, false]);

        let provider = services.build_provider();
        let kept = provider.clone();
        drop(provider);
        assert_eq!(Arc::strong_count(&image), 2);
        assert_eq!(*kept.get_all::<Greeting>()[0], Greeting("module"));

        drop(kept);
        assert_eq!(Arc::strong_count(&image), 1);
    }
}
