//! Integration tests for handler cache accounting through the mediator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use dispatcher_core::{
    DispatchError, DispatcherConfig, HandlerRegistry, Request, RequestHandler, ServiceRegistry,
};
use dispatcher_runtime::{HandlerCache, HandlerCacheExt, Mediator, MemoizingHandlerCache};
use dispatcher_testing::StaticHandler;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
struct FetchProfile;

impl Request for FetchProfile {
    type Response = &'static str;
}

#[tokio::test]
async fn second_send_is_served_from_cache() {
    let registry = ServiceRegistry::new();
    registry.register_handler::<FetchProfile, _>(StaticHandler::new("profile"));
    let mediator = Mediator::new(Arc::new(registry), DispatcherConfig::default()).unwrap();

    mediator.send(&FetchProfile).await.unwrap();
    let first = mediator.cache().stats();
    assert_eq!(first.hits, 0);
    assert!(first.misses > 0);

    mediator.send(&FetchProfile).await.unwrap();
    let second = mediator.cache().stats();
    assert_eq!(second.misses, first.misses);
    assert_eq!(second.hits, first.misses);
    assert!((second.hit_rate - 0.5).abs() < f64::EPSILON);

    mediator.cache().clear();
    let cleared = mediator.cache().stats();
    assert_eq!((cleared.hits, cleared.misses, cleared.total), (0, 0, 0));
}

#[tokio::test]
async fn failed_resolution_recovers_after_registration() {
    let registry = Arc::new(ServiceRegistry::new());
    let mediator = Mediator::new(
        Arc::clone(&registry) as Arc<dyn HandlerRegistry>,
        DispatcherConfig::default(),
    )
    .unwrap();

    let error = mediator.send(&FetchProfile).await.unwrap_err();
    assert!(matches!(error, DispatchError::NotRegistered { .. }));

    registry.register_handler::<FetchProfile, _>(StaticHandler::new("late"));
    assert_eq!(mediator.send(&FetchProfile).await.unwrap(), "late");
}

#[test]
fn factory_runs_once_per_cached_capability() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let registry = ServiceRegistry::new();
    let counter = Arc::clone(&constructed);
    registry.register_factory::<dyn RequestHandler<FetchProfile>, _>(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StaticHandler::new("built")) as Arc<dyn RequestHandler<FetchProfile>>)
    });
    let cache = MemoizingHandlerCache::new(Arc::new(registry));

    for _ in 0..5 {
        cache.get_one::<dyn RequestHandler<FetchProfile>>().unwrap();
    }

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.single_count), (4, 1, 1));
    assert_eq!(
        stats.to_string(),
        "Cache Stats: 4 hits, 1 misses, 80.00% hit rate, 1 cached items"
    );
}
