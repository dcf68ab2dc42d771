//! Dispatch hot-path benchmarks.
//!
//! Measures `send` with and without behaviors, the cost of the built-in
//! timeout and validation behaviors, cached vs uncached resolution, and
//! notification fan-out.
//!
//! Run with: `cargo bench -p dispatcher-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dispatcher_core::{
    BoxFuture, CancellationToken, DispatchError, DispatcherConfig, Next, Notification,
    NotificationHandler, PipelineBehavior, Request, ServiceRegistry,
};
use dispatcher_runtime::Mediator;
use dispatcher_testing::{StaticHandler, StaticValidator};
use std::sync::Arc;

struct Ping;

impl Request for Ping {
    type Response = u64;
}

struct Tick;

impl Notification for Tick {}

/// Behavior that only forwards to the rest of the pipeline
struct Forward;

impl PipelineBehavior<Ping> for Forward {
    fn handle<'a>(
        &'a self,
        _request: &'a Ping,
        next: Next<'a, u64>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<u64, DispatchError>> {
        next.run(cancel)
    }
}

struct Ack;

impl NotificationHandler<Tick> for Ack {
    fn handle<'a>(
        &'a self,
        _notification: &'a Tick,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async { Ok(()) })
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// No built-in behaviors and no metrics emission
fn bare_config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_timeouts(false)
        .with_validation(false)
        .with_metrics(false)
}

fn mediator_with_behaviors(behaviors: usize, config: DispatcherConfig) -> Mediator {
    let registry = ServiceRegistry::new();
    registry.register_handler::<Ping, _>(StaticHandler::new(1_u64));
    for _ in 0..behaviors {
        registry.register_behavior::<Ping, _>(Forward);
    }
    Mediator::new(Arc::new(registry), config).expect("valid config")
}

fn benchmark_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("send");
    group.throughput(Throughput::Elements(1));
    let runtime = runtime();

    for behaviors in [0_usize, 1, 4, 8] {
        let mediator = mediator_with_behaviors(behaviors, bare_config());
        group.bench_with_input(
            BenchmarkId::new("behaviors", behaviors),
            &mediator,
            |b, mediator| {
                b.to_async(&runtime).iter(|| async {
                    black_box(mediator.send(black_box(&Ping)).await.expect("send"));
                });
            },
        );
    }

    group.finish();
}

fn benchmark_built_ins(c: &mut Criterion) {
    let mut group = c.benchmark_group("built_in_behaviors");
    group.throughput(Throughput::Elements(1));
    let runtime = runtime();

    let timeout_only = mediator_with_behaviors(0, bare_config().with_timeouts(true));
    group.bench_function("timeout", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(timeout_only.send(&Ping).await.expect("send"));
        });
    });

    let registry = ServiceRegistry::new();
    registry
        .register_handler::<Ping, _>(StaticHandler::new(1_u64))
        .register_validator::<Ping, _>(StaticValidator::passing())
        .register_validator::<Ping, _>(StaticValidator::passing());
    let validating = Mediator::new(Arc::new(registry), bare_config().with_validation(true))
        .expect("valid config");
    group.bench_function("validation_two_validators", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(validating.send(&Ping).await.expect("send"));
        });
    });

    group.finish();
}

fn benchmark_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));
    let runtime = runtime();

    let cached = mediator_with_behaviors(2, bare_config());
    group.bench_function("cached", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(cached.send(&Ping).await.expect("send"));
        });
    });

    let uncached = mediator_with_behaviors(2, bare_config().with_caching(false));
    group.bench_function("uncached", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(uncached.send(&Ping).await.expect("send"));
        });
    });

    group.finish();
}

fn benchmark_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let runtime = runtime();

    for handlers in [1_usize, 4, 16] {
        let registry = ServiceRegistry::new();
        for _ in 0..handlers {
            registry.register_notification_handler::<Tick, _>(Ack);
        }
        let mediator =
            Mediator::new(Arc::new(registry), bare_config()).expect("valid config");

        group.throughput(Throughput::Elements(handlers as u64));
        group.bench_with_input(
            BenchmarkId::new("handlers", handlers),
            &mediator,
            |b, mediator| {
                b.to_async(&runtime).iter(|| async {
                    mediator.publish(black_box(&Tick)).await.expect("publish");
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_send,
    benchmark_built_ins,
    benchmark_resolution,
    benchmark_publish,
);
criterion_main!(benches);
