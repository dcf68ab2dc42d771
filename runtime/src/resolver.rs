//! Capability resolution with registry fallback.
//!
//! Lookups go through the handler cache first. A cache failure is not fatal:
//! when the cache reports [`DispatchError::CacheUnavailable`] the resolver
//! retries against the registry directly for that call. Registry errors the
//! cache passed through are returned as-is without a second lookup.

use crate::cache::{HandlerCache, HandlerCacheExt};
use dispatcher_core::{Capability, DispatchError, HandlerRegistry, HandlerRegistryExt};
use std::sync::Arc;

/// Shared resolution path for the mediator and the built-in behaviors.
#[derive(Clone)]
pub struct Resolver {
    cache: Arc<dyn HandlerCache>,
    registry: Arc<dyn HandlerRegistry>,
}

impl Resolver {
    /// Create a resolver over a cache and the registry behind it
    #[must_use]
    pub fn new(cache: Arc<dyn HandlerCache>, registry: Arc<dyn HandlerRegistry>) -> Self {
        Self { cache, registry }
    }

    /// The cache lookups go through
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn HandlerCache> {
        &self.cache
    }

    /// Resolve exactly one implementation of `C`
    ///
    /// # Errors
    ///
    /// Returns the registry's error, either passed through by the cache or
    /// raised by the direct fallback.
    pub fn one<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, DispatchError> {
        match self.cache.get_one::<C>() {
            Err(error @ DispatchError::CacheUnavailable { .. }) => {
                Self::log_fallback(Capability::of::<C>(), &error);
                self.registry.resolve_one::<C>()
            },
            resolved => resolved,
        }
    }

    /// Resolve every implementation of `C`
    ///
    /// # Errors
    ///
    /// Returns the registry's error, either passed through by the cache or
    /// raised by the direct fallback.
    pub fn many<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, DispatchError> {
        match self.cache.get_many::<C>() {
            Err(error @ DispatchError::CacheUnavailable { .. }) => {
                Self::log_fallback(Capability::of::<C>(), &error);
                self.registry.resolve_all::<C>()
            },
            resolved => resolved,
        }
    }

    fn log_fallback(capability: Capability, error: &DispatchError) {
        tracing::debug!(
            capability = %capability,
            error = %error,
            "Handler cache lookup failed, resolving from registry"
        );
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::cache::{CacheStatistics, MemoizingHandlerCache};
    use dispatcher_core::{Binding, ServiceRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed;
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            42
        }
    }

    /// A cache whose storage is unavailable
    struct BrokenCache;

    impl HandlerCache for BrokenCache {
        fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError> {
            Err(DispatchError::CacheUnavailable {
                capability: capability.short_name(),
                reason: "storage offline".to_string(),
            })
        }

        fn lookup_many(&self, capability: Capability) -> Result<Arc<[Binding]>, DispatchError> {
            Err(DispatchError::CacheUnavailable {
                capability: capability.short_name(),
                reason: "storage offline".to_string(),
            })
        }

        fn clear(&self) {}

        fn stats(&self) -> CacheStatistics {
            CacheStatistics::default()
        }
    }

    #[test]
    fn falls_back_to_registry_when_cache_fails() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register::<dyn Clock>(Arc::new(Fixed));
        let resolver = Resolver::new(Arc::new(BrokenCache), registry);

        assert_eq!(resolver.one::<dyn Clock>().unwrap().now(), 42);
        assert_eq!(resolver.many::<dyn Clock>().unwrap().len(), 1);
    }

    #[test]
    fn registry_error_surfaces_after_fallback() {
        let registry = Arc::new(ServiceRegistry::new());
        let resolver = Resolver::new(Arc::new(BrokenCache), registry);

        let error = resolver.one::<dyn Clock>().err().unwrap();
        assert!(matches!(error, DispatchError::NotRegistered { .. }));
        assert!(resolver.many::<dyn Clock>().unwrap().is_empty());
    }

    #[test]
    fn pass_through_errors_are_not_looked_up_twice() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ServiceRegistry::new());
        let counter = Arc::clone(&attempts);
        registry.register_factory::<dyn Clock, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::failed("clock source missing"))
        });
        let cache = Arc::new(MemoizingHandlerCache::new(
            Arc::clone(&registry) as Arc<dyn HandlerRegistry>
        ));
        let resolver = Resolver::new(cache, registry);

        let error = resolver.one::<dyn Clock>().err().unwrap();
        assert_eq!(error.to_string(), "clock source missing");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_registered_from_cache_is_returned_as_is() {
        let registry: Arc<dyn HandlerRegistry> = Arc::new(ServiceRegistry::new());
        let cache = Arc::new(MemoizingHandlerCache::new(Arc::clone(&registry)));
        let resolver = Resolver::new(Arc::clone(&cache) as Arc<dyn HandlerCache>, registry);

        let error = resolver.one::<dyn Clock>().err().unwrap();
        assert!(matches!(error, DispatchError::NotRegistered { .. }));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));
    }
}
