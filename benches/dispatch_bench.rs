//! Benchmarks for inbound frame handling
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use expeta_realtime::realtime::{
    invoke_isolated, Callback, InboundMessage, ListenerRegistry, SubscriptionRegistry,
};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn sample_frame(i: usize) -> String {
    json!({
        "type": "progress",
        "subscriptionId": format!("generation:g{}", i % 16),
        "step": i,
        "files": ["src/main.rs", "src/lib.rs"],
        "message": "Generating module scaffolding",
    })
    .to_string()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [100, 1000] {
        let frames: Vec<String> = (0..size).map(sample_frame).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("inbound_{}", size), |b| {
            b.iter(|| {
                for frame in &frames {
                    black_box(InboundMessage::parse(black_box(frame)).unwrap());
                }
            })
        });
    }

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let hits = Arc::new(AtomicU64::new(0));

    for listeners in [1, 10, 100] {
        let mut registry = ListenerRegistry::new();
        let mut subscriptions = SubscriptionRegistry::new();
        for _ in 0..listeners {
            let h = Arc::clone(&hits);
            let cb: Callback = Arc::new(move |_| {
                h.fetch_add(1, Ordering::Relaxed);
            });
            registry.insert("message", Arc::clone(&cb));
            registry.insert("progress", cb);
        }
        for g in 0..16 {
            let h = Arc::clone(&hits);
            subscriptions.insert(
                &format!("generation:g{}", g),
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::Relaxed);
                }),
            );
        }

        let message = InboundMessage::parse(&sample_frame(3)).unwrap();
        group.throughput(Throughput::Elements(listeners as u64 * 2 + 1));

        group.bench_function(format!("dispatch_{}", listeners), |b| {
            b.iter(|| {
                let payload = message.payload();
                for cb in registry.snapshot("message") {
                    invoke_isolated(&cb, payload, "message");
                }
                if let Some(kind) = message.kind() {
                    for cb in registry.snapshot(kind) {
                        invoke_isolated(&cb, payload, kind);
                    }
                }
                if let Some(cb) = message.subscription_id().and_then(|t| subscriptions.get(t)) {
                    invoke_isolated(&cb, payload, "subscription");
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_fan_out);
criterion_main!(benches);
