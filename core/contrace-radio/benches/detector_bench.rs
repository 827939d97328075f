use contrace_radio::{DiscoveryEvent, EncounterDetector, TracingConfig};
use contrace_types::{EphemeralId, Timestamp, UserId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn sightings(peers: u64, rounds: u64) -> Vec<DiscoveryEvent> {
    let ids: Vec<EphemeralId> = (0..peers)
        .map(|i| EphemeralId::parse(&format!("{i:016x}")).unwrap())
        .collect();
    (0..rounds)
        .flat_map(|round| {
            ids.iter().map(move |peer| DiscoveryEvent {
                peer: peer.clone(),
                rssi: -55 - (round % 20) as i32,
                seen_at: Timestamp::from_millis(round * 5_000),
            })
        })
        .collect()
}

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector_observe");
    let owner = UserId::from_uuid(uuid::Uuid::from_u128(7));
    let config = TracingConfig::default();

    for peers in [1u64, 32, 256] {
        let events = sightings(peers, 60);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(peers), &events, |b, events| {
            b.iter(|| {
                let mut detector = EncounterDetector::new(owner, &config);
                let emitted = events
                    .iter()
                    .filter_map(|e| detector.observe(black_box(e)))
                    .count();
                black_box(emitted)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_observe);
criterion_main!(benches);
