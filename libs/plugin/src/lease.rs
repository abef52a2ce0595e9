//! Library leases
//!
//! Closures, vtables and `&'static str` values handed out by a grain module
//! point into its library image. Everything holding such a value also holds
//! a [`LibraryLease`]; the library is unloaded only after the last lease
//! drops. Modules linked into the host process use [`LibraryLease::none`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct LibraryLease {
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

impl LibraryLease {
    /// Lease on a loaded library image
    pub fn new<T: Send + Sync + 'static>(owner: Arc<T>) -> Self {
        Self { owner: Some(owner) }
    }

    /// For code that is never unloaded
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.owner.is_some()
    }
}

impl fmt::Debug for LibraryLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryLease")
            .field("held", &self.is_held())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_owner() {
        let image = Arc::new(());
        let lease = LibraryLease::new(Arc::clone(&image));
        let copy = lease.clone();
        assert_eq!(Arc::strong_count(&image), 3);

        drop(lease);
        assert!(copy.is_held());
        drop(copy);
        assert_eq!(Arc::strong_count(&image), 1);

        assert!(!LibraryLease::none().is_held());
    }
}
