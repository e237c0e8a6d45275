//! Message path benchmarks
//!
//! Measures the adapter's per-message cost without any network I/O:
//! - inbound: socket message event → read buffer → consumer read
//! - outbound: write → socket send → completion
//!
//! The recording socket stands in for a real message socket, so numbers are
//! the adapter's own overhead plus call recording.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wsbridge::recording::RecordingSocket;
use wsbridge::{Completion, ReadyState, SocketEvent, StreamAdapter, StreamOptions};

const MESSAGE_SIZES: &[usize] = &[64, 1024, 16384];
const MESSAGE_COUNT: usize = 1_000;

fn inbound(c: &mut Criterion) {
    wsbridge::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("message_path/inbound");

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let payload = Bytes::from(vec![0u8; size]);
            b.iter(|| {
                let socket = RecordingSocket::new(ReadyState::Open);
                let mut adapter = StreamAdapter::new(socket, StreamOptions::default());
                for _ in 0..MESSAGE_COUNT {
                    adapter.handle_socket_event(SocketEvent::Message(payload.clone()));
                    black_box(adapter.read());
                }
                adapter.run_ticks().ok();
            });
        });
    }

    group.finish();
}

fn outbound(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_path/outbound");

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let payload = Bytes::from(vec![0u8; size]);
            b.iter(|| {
                let socket = RecordingSocket::new(ReadyState::Open);
                let mut adapter = StreamAdapter::new(socket, StreamOptions::default());
                for _ in 0..MESSAGE_COUNT {
                    adapter.write(black_box(payload.clone()), Completion::noop());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, inbound, outbound);
criterion_main!(benches);
