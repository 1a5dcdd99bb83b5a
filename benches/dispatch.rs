//! Benchmarks for receiver-side dispatch
//!
//! Everything here runs on the receiver task in production, so per-frame
//! cost bounds the sustainable telemetry rate:
//! - package frame decode through the subscription manager
//! - callback registry fan-out at varying binding counts

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use airlink::link::RequestBroker;
use airlink::test_utils::{MockLink, encode_package_frame, pump_acks};
use airlink::types::{Quaternion, StreamRate, Topic, TopicValue, Vector3f};
use airlink::{
    CallbackEvent, CallbackKey, CallbackRegistry, PackageDef, SubscriptionManager,
};

fn active_manager() -> (tokio::runtime::Runtime, Arc<SubscriptionManager>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");

    let manager = runtime.block_on(async {
        let (tx, rx, _remote) = MockLink::auto_ack().split();
        let broker = Arc::new(RequestBroker::new(tx));
        let manager = Arc::new(SubscriptionManager::new(broker.clone()));
        pump_acks(rx, broker);

        manager.verify(std::time::Duration::from_secs(1)).await.expect("verify");
        manager
            .set_up_subscription(
                PackageDef {
                    id: 0,
                    frequency_hz: 50,
                    topics: vec![Topic::Quaternion, Topic::VelocityGround, Topic::GpsFused],
                    send_timestamp: true,
                },
                std::time::Duration::from_secs(1),
            )
            .await
            .expect("subscribe");
        manager
    });

    (runtime, manager)
}

fn bench_package_decode(c: &mut Criterion) {
    let (_runtime, manager) = active_manager();

    let payload = encode_package_frame(
        Some(1_000_000),
        &[
            TopicValue::Quaternion(Quaternion { q0: 1.0, ..Default::default() }),
            TopicValue::VelocityGround(Vector3f { x: 1.0, y: 2.0, z: 3.0 }),
            TopicValue::GpsFused(Default::default()),
        ],
    );

    // Keep one stream alive so the frame also goes through the watch channel.
    let _stream = manager.package_stream(0, StreamRate::Native).expect("stream");

    c.bench_function("handle_package_data_3_topics", |b| {
        b.iter(|| manager.handle_package_data(black_box(0), black_box(&payload)))
    });
}

fn bench_callback_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("callback_fanout");
    for bindings in [1usize, 4, 16] {
        let registry = CallbackRegistry::new();
        for _ in 0..bindings {
            registry.subscribe(
                CallbackKey::Topic(Topic::Quaternion),
                Arc::new(|event| {
                    black_box(event);
                }),
            );
        }
        let event =
            CallbackEvent::Telemetry(TopicValue::Quaternion(Quaternion::default()));

        group.bench_with_input(
            BenchmarkId::from_parameter(bindings),
            &bindings,
            |b, _| b.iter(|| registry.dispatch(CallbackKey::Topic(Topic::Quaternion), &event)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_package_decode, bench_callback_fanout);
criterion_main!(benches);
