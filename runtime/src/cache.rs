//! Handler cache memoizing registry lookups per capability type.
//!
//! The cache sits between the mediator and the [`HandlerRegistry`]. The first
//! caller for a capability performs the registry lookup; concurrent callers
//! for the same uninitialized capability block until that lookup finishes and
//! then observe the same value. A failed lookup is purged so a later call
//! (for example, after the missing registration is added) retries cleanly.
//!
//! # Example
//!
//! ```ignore
//! use dispatcher_runtime::cache::{HandlerCache, HandlerCacheExt, MemoizingHandlerCache};
//!
//! let cache = MemoizingHandlerCache::new(registry);
//! let handler = cache.get_one::<dyn RequestHandler<CreateOrder>>()?; // miss
//! let handler = cache.get_one::<dyn RequestHandler<CreateOrder>>()?; // hit
//!
//! println!("{}", cache.stats()); // Cache Stats: 1 hits, 1 misses, 50.00% hit rate, 1 cached items
//! ```

use crate::metrics::CacheMetrics;
use dispatcher_core::{Binding, Capability, DispatchError, HandlerRegistry};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Point-in-time view of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheStatistics {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that went to the registry
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup
    pub hit_rate: f64,
    /// Cached single-implementation entries
    pub single_count: usize,
    /// Cached multi-implementation entries
    pub multi_count: usize,
    /// All cached entries
    pub total: usize,
}

impl CacheStatistics {
    // Counts are far below 2^53 in practice, so the f64 conversion is exact
    #[allow(clippy::cast_precision_loss)]
    fn compute(hits: u64, misses: u64, single_count: usize, multi_count: usize) -> Self {
        let requests = hits + misses;
        let hit_rate = if requests == 0 {
            0.0
        } else {
            hits as f64 / requests as f64
        };
        Self {
            hits,
            misses,
            hit_rate,
            single_count,
            multi_count,
            total: single_count + multi_count,
        }
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache Stats: {} hits, {} misses, {:.2}% hit rate, {} cached items",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.total
        )
    }
}

/// Memoized capability resolution.
///
/// Methods are type-erased so the trait stays dyn-compatible; use
/// [`HandlerCacheExt`] for typed access.
pub trait HandlerCache: Send + Sync {
    /// Resolve exactly one binding for the capability
    ///
    /// # Errors
    ///
    /// Propagates the registry's error. The failed entry is never cached.
    fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError>;

    /// Resolve every binding for the capability
    ///
    /// # Errors
    ///
    /// Propagates the registry's error. The failed entry is never cached.
    fn lookup_many(&self, capability: Capability) -> Result<Arc<[Binding]>, DispatchError>;

    /// Empty the cache and reset its counters
    fn clear(&self);

    /// Snapshot of hit/miss counters and entry counts
    fn stats(&self) -> CacheStatistics;
}

/// Typed lookups on top of any [`HandlerCache`].
pub trait HandlerCacheExt: HandlerCache {
    /// Resolve exactly one implementation of `C`
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotRegistered`] if nothing is bound.
    fn get_one<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, DispatchError> {
        let capability = Capability::of::<C>();
        let binding = self.lookup_one(capability)?;
        capability.downcast(&binding)
    }

    /// Resolve every implementation of `C` (empty if none are bound)
    ///
    /// # Errors
    ///
    /// Returns an error only if the registry fails to produce a binding.
    fn get_many<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<C>>, DispatchError> {
        let capability = Capability::of::<C>();
        self.lookup_many(capability)?
            .iter()
            .map(|binding| capability.downcast(binding))
            .collect()
    }
}

impl<T: HandlerCache + ?Sized> HandlerCacheExt for T {}

type Slot<T> = Arc<OnceCell<T>>;

#[derive(Default)]
struct Entries {
    single: HashMap<TypeId, Slot<Binding>>,
    multi: HashMap<TypeId, Slot<Arc<[Binding]>>>,
}

impl Entries {
    fn initialized<T>(slots: &HashMap<TypeId, Slot<T>>) -> usize {
        slots.values().filter(|slot| slot.get().is_some()).count()
    }
}

/// Thread-safe memoizing cache with hit/miss accounting.
pub struct MemoizingHandlerCache {
    registry: Arc<dyn HandlerRegistry>,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    metrics_enabled: bool,
}

impl MemoizingHandlerCache {
    /// Create an empty cache in front of the given registry
    #[must_use]
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self {
            registry,
            entries: Mutex::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            metrics_enabled: false,
        }
    }

    /// Emit hit/miss counters through the `metrics` facade
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch or initialize the slot for `capability`, then purge it on failure.
    ///
    /// The entries lock is released before the registry is consulted, so a
    /// slow lookup for one capability never blocks lookups for others.
    fn fetch<T, S, L>(&self, capability: Capability, select: S, lookup: L) -> Result<T, DispatchError>
    where
        T: Clone,
        S: Fn(&mut Entries) -> &mut HashMap<TypeId, Slot<T>>,
        L: FnOnce() -> Result<T, DispatchError>,
    {
        let slot = {
            let mut entries = self.entries();
            Arc::clone(select(&mut *entries).entry(capability.id()).or_default())
        };

        let mut resolved_here = false;
        let result = slot
            .get_or_try_init(|| {
                resolved_here = true;
                lookup()
            })
            .cloned();

        match &result {
            Ok(_) if resolved_here => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.record("miss");
                tracing::debug!(capability = %capability, "Cache miss, resolved and cached");
            },
            Ok(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.record("hit");
                tracing::trace!(capability = %capability, "Cache hit");
            },
            Err(error) => {
                if resolved_here {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.record("miss");
                }
                let mut entries = self.entries();
                let slots = select(&mut *entries);
                // Only remove the slot this call failed on; a concurrent retry may
                // already have installed a fresh one.
                if slots
                    .get(&capability.id())
                    .is_some_and(|current| Arc::ptr_eq(current, &slot))
                {
                    slots.remove(&capability.id());
                }
                tracing::warn!(
                    capability = %capability,
                    error = %error,
                    "Failed to resolve capability, purged cache entry"
                );
            },
        }

        result
    }

    fn record(&self, outcome: &'static str) {
        if self.metrics_enabled {
            CacheMetrics::record_lookup(outcome);
        }
    }
}

impl HandlerCache for MemoizingHandlerCache {
    fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError> {
        self.fetch(
            capability,
            |entries| &mut entries.single,
            || self.registry.lookup_one(capability),
        )
    }

    fn lookup_many(&self, capability: Capability) -> Result<Arc<[Binding]>, DispatchError> {
        self.fetch(
            capability,
            |entries| &mut entries.multi,
            || self.registry.lookup_all(capability).map(Arc::from),
        )
    }

    fn clear(&self) {
        let mut entries = self.entries();
        let single = entries.single.len();
        let multi = entries.multi.len();
        entries.single.clear();
        entries.multi.clear();
        // Counters reset under the entries lock so no lookup observes a
        // half-cleared cache.
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        drop(entries);

        tracing::info!(single, multi, "Handler cache cleared");
    }

    fn stats(&self) -> CacheStatistics {
        let entries = self.entries();
        CacheStatistics::compute(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            Entries::initialized(&entries.single),
            Entries::initialized(&entries.multi),
        )
    }
}

impl fmt::Debug for MemoizingHandlerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizingHandlerCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Pass-through cache that resolves fresh from the registry on every call.
///
/// Substituted for [`MemoizingHandlerCache`] when caching is disabled.
pub struct NoOpHandlerCache {
    registry: Arc<dyn HandlerRegistry>,
}

impl NoOpHandlerCache {
    /// Create a pass-through cache over the given registry
    #[must_use]
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self { registry }
    }
}

impl HandlerCache for NoOpHandlerCache {
    fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError> {
        self.registry.lookup_one(capability)
    }

    fn lookup_many(&self, capability: Capability) -> Result<Arc<[Binding]>, DispatchError> {
        self.registry.lookup_all(capability).map(Arc::from)
    }

    fn clear(&self) {}

    fn stats(&self) -> CacheStatistics {
        CacheStatistics::default()
    }
}

impl fmt::Debug for NoOpHandlerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoOpHandlerCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use dispatcher_core::ServiceRegistry;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    fn setup() -> (Arc<ServiceRegistry>, MemoizingHandlerCache) {
        let registry = Arc::new(ServiceRegistry::new());
        let cache = MemoizingHandlerCache::new(Arc::clone(&registry) as Arc<dyn HandlerRegistry>);
        (registry, cache)
    }

    #[test]
    fn first_lookup_misses_then_hits() {
        let (registry, cache) = setup();
        registry.register::<dyn Greeter>(Arc::new(English));

        cache.get_one::<dyn Greeter>().unwrap();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));

        let greeter = cache.get_one::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.single_count, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn hit_rate_is_zero_before_any_lookup() {
        let (_registry, cache) = setup();
        let stats = cache.stats();
        assert_eq!(stats, CacheStatistics::default());
        assert!(stats.hit_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn many_lookups_cache_empty_sets() {
        let (_registry, cache) = setup();
        assert!(cache.get_many::<dyn Greeter>().unwrap().is_empty());
        assert!(cache.get_many::<dyn Greeter>().unwrap().is_empty());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.multi_count, 1);
        assert_eq!(stats.single_count, 0);
    }

    #[test]
    fn clear_resets_counters_and_entries() {
        let (registry, cache) = setup();
        registry.register::<dyn Greeter>(Arc::new(English));
        cache.get_one::<dyn Greeter>().unwrap();
        cache.get_one::<dyn Greeter>().unwrap();
        cache.get_many::<dyn Greeter>().unwrap();

        cache.clear();
        assert_eq!(cache.stats(), CacheStatistics::default());

        cache.get_one::<dyn Greeter>().unwrap();
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn failed_lookup_is_not_cached() {
        let (registry, cache) = setup();
        let error = cache.get_one::<dyn Greeter>().err().unwrap();
        assert!(matches!(error, DispatchError::NotRegistered { .. }));
        assert_eq!(cache.stats().total, 0);

        registry.register::<dyn Greeter>(Arc::new(English));
        assert_eq!(cache.get_one::<dyn Greeter>().unwrap().greet(), "hello");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn concurrent_first_use_resolves_once() {
        let registry = Arc::new(ServiceRegistry::new());
        let lookups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lookups);
        registry.register_factory::<dyn Greeter, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(English) as Arc<dyn Greeter>)
        });
        let cache = Arc::new(MemoizingHandlerCache::new(registry));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_one::<dyn Greeter>().map(|g| g.greet()))
            })
            .collect();

        for thread in threads {
            assert_eq!(thread.join().expect("thread panicked").unwrap(), "hello");
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (7, 1));
    }

    #[test]
    fn noop_cache_resolves_fresh_every_time() {
        let registry = Arc::new(ServiceRegistry::new());
        let lookups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lookups);
        registry.register_factory::<dyn Greeter, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(English) as Arc<dyn Greeter>)
        });
        let cache = NoOpHandlerCache::new(registry);

        cache.get_one::<dyn Greeter>().unwrap();
        cache.get_one::<dyn Greeter>().unwrap();
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats(), CacheStatistics::default());
    }

    #[test]
    fn stats_display_matches_report_format() {
        let stats = CacheStatistics::compute(3, 1, 1, 1);
        assert_eq!(
            stats.to_string(),
            "Cache Stats: 3 hits, 1 misses, 75.00% hit rate, 2 cached items"
        );
    }
}
