use criterion::{BatchSize, Criterion, Throughput};
use std::hint::black_box;
use telemetry_agent::network::application::mqtt::CONNACK;
use telemetry_agent::network::error::Error;
use telemetry_agent::network::{LinkState, NetworkEndpoint, Transport};
use telemetry_agent::session::{Credentials, Session};

/// Accepts every write and answers every read with an accepted `CONNACK`.
struct SinkTransport {
    state: LinkState,
}

impl SinkTransport {
    fn new() -> Self {
        Self {
            state: LinkState::Closed,
        }
    }
}

impl Transport for SinkTransport {
    fn connect(&mut self, _endpoint: &NetworkEndpoint) -> Result<(), Error> {
        self.state = LinkState::Connected;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let connack = [CONNACK, 2, 0, 0];
        let n = buf.len().min(connack.len());
        buf[..n].copy_from_slice(&connack[..n]);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        Ok(buf.len())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.state = LinkState::Closed;
        Ok(())
    }

    fn state(&self) -> LinkState {
        self.state
    }
}

fn endpoint() -> NetworkEndpoint {
    NetworkEndpoint::new("demo.thingsboard.io", 1883).expect("valid endpoint")
}

fn credentials() -> Credentials {
    Credentials::new("bench-node")
        .and_then(|c| c.with_username("bench-access-token"))
        .expect("credentials fit")
}

fn established() -> Session<SinkTransport> {
    let mut session = Session::new(SinkTransport::new(), 60);
    session
        .connect(&endpoint(), &credentials())
        .expect("Failed to connect");
    session
}

pub fn bench_connect(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_connect");
    group.bench_function("connect", |b| {
        b.iter_batched_ref(
            || Session::new(SinkTransport::new(), 60),
            |session| {
                session
                    .connect(black_box(&endpoint()), black_box(&credentials()))
                    .expect("Failed to connect");
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_publish");
    let payload = br#"{"Temperature":21.43, "humidity":38.20, "Pressure":1013.25}"#;
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function("publish_x50", |b| {
        b.iter_batched_ref(
            established,
            |session| {
                for _ in 0..50 {
                    session
                        .publish("v1/devices/me/telemetry", black_box(payload))
                        .expect("Failed to publish");
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
