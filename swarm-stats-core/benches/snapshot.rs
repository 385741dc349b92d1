use criterion::{Criterion, black_box, criterion_group, criterion_main};
use swarm_stats_core::{
    Accumulator, ConnectStats, ConnectionId, ConnectionObserver, DhtSockets, DhtStats, Reporter,
    Swarm, TransportField, TransportStats,
};
use std::sync::{Arc, Mutex};

const LIVE_CONNECTIONS: u64 = 10_000;

/// a swarm with a fixed live set, no lifecycle
struct FixedSwarm(Mutex<Vec<Option<TransportStats>>>);

impl Swarm for FixedSwarm {
    fn subscribe(&self, _observer: Arc<dyn ConnectionObserver>) {}

    fn with_live_transports<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = Option<&TransportStats>>) -> R,
    ) -> R {
        let live = self.0.lock().unwrap();
        f(&mut live.iter().map(Option::as_ref))
    }

    fn peer_count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn connects(&self) -> ConnectStats {
        ConnectStats::default()
    }

    fn updates(&self) -> u64 {
        0
    }

    fn dht(&self) -> DhtStats {
        DhtStats::default()
    }

    fn dht_sockets(&self) -> DhtSockets {
        DhtSockets::default()
    }

    fn udx(&self) -> TransportStats {
        TransportStats::default()
    }
}

fn fixed_swarm() -> Arc<FixedSwarm> {
    let live = (0..LIVE_CONNECTIONS)
        .map(|i| {
            // one in ten connections has no transport yet
            (i % 10 != 0).then(|| {
                TransportStats::ZERO
                    .with(TransportField::BytesTransmitted, i * 1_500)
                    .with(TransportField::PacketsTransmitted, i)
                    .with(TransportField::CongestionWindow, 14_720)
                    .with(TransportField::Mtu, 1_200)
            })
        })
        .collect();
    Arc::new(FixedSwarm(Mutex::new(live)))
}

fn snapshot(c: &mut Criterion) {
    let reporter = Reporter::attach(fixed_swarm());

    c.bench_function("cumulative", |b| {
        b.iter(|| reporter.cumulative(black_box(TransportField::BytesTransmitted)))
    });
    c.bench_function("cumulative_sample", |b| b.iter(|| reporter.cumulative_sample()));
    c.bench_function("average", |b| {
        b.iter(|| reporter.average(black_box(TransportField::CongestionWindow)))
    });
}

fn accumulate(c: &mut Criterion) {
    let accumulator = Accumulator::new();
    let last = TransportStats::ZERO
        .with(TransportField::BytesTransmitted, 64 * 1_024)
        .with(TransportField::BytesReceived, 32 * 1_024);
    let mut id = ConnectionId::ZERO;

    c.bench_function("open_close", |b| {
        b.iter(|| {
            id = id.next();
            accumulator.connection_opened(id);
            accumulator.connection_closed(id, black_box(Some(&last)))
        })
    });
}

criterion_group!(benches, snapshot, accumulate);
criterion_main!(benches);
