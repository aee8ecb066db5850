use criterion::{criterion_group, criterion_main};

mod session;

criterion_group!(
    benches,
    telemetry::bench_encode_payload,
    telemetry::bench_encode_publish,
    session::bench_publish,
    session::bench_connect
);
criterion_main!(benches);
