// Asset identity codec benchmarks.
//
// Covers short-name <-> id conversion on both sides of the numeric-names
// activation, sub-asset long-name compaction and expansion, and the stable
// payload JSON rendering used by the message log.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tally_protocol::asset::{
    compact_subasset_longname, expand_subasset_longname, id_to_name, name_to_id, AssetId,
};
use tally_protocol::bindings;
use tally_protocol::config::Network;
use tally_protocol::messages::to_payload_json;
use tally_protocol::ProtocolSchedule;

const BEFORE_NUMERIC: u64 = 333_499;
const AFTER_NUMERIC: u64 = 333_500;

fn bench_name_to_id(c: &mut Criterion) {
    let schedule = ProtocolSchedule::embedded(Network::Mainnet).unwrap();

    c.bench_function("codec/name_to_id_alphabetic", |b| {
        b.iter(|| name_to_id(black_box("PEPECASH"), &schedule, BEFORE_NUMERIC).unwrap());
    });
    c.bench_function("codec/name_to_id_numeric", |b| {
        b.iter(|| {
            name_to_id(black_box("A95428956661682177"), &schedule, AFTER_NUMERIC).unwrap()
        });
    });
}

fn bench_id_to_name(c: &mut Criterion) {
    let schedule = ProtocolSchedule::embedded(Network::Mainnet).unwrap();
    let id = name_to_id("PEPECASH", &schedule, BEFORE_NUMERIC).unwrap();

    c.bench_function("codec/id_to_name_alphabetic", |b| {
        b.iter(|| id_to_name(black_box(id), &schedule, BEFORE_NUMERIC).unwrap());
    });
    c.bench_function("codec/id_to_name_numeric", |b| {
        b.iter(|| {
            id_to_name(black_box(AssetId(95_428_956_661_682_177)), &schedule, AFTER_NUMERIC)
                .unwrap()
        });
    });
}

fn bench_subasset_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/subasset");

    for length in [16, 64, 250] {
        let name: String = "PARENT.child-name_@!"
            .chars()
            .cycle()
            .take(length)
            .collect();
        let compact = compact_subasset_longname(&name).unwrap();

        group.throughput(Throughput::Bytes(length as u64));
        group.bench_with_input(BenchmarkId::new("compact", length), &name, |b, name| {
            b.iter(|| compact_subasset_longname(name).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("expand", length), &compact, |b, raw| {
            b.iter(|| expand_subasset_longname(raw));
        });
    }

    group.finish();
}

fn bench_payload_json(c: &mut Criterion) {
    let payload = bindings! {
        "tx_index" => 12_345u64,
        "tx_hash" => "4f0433ba841038e2e16328445930dd7bca35309b14b0da4451c8f94c631368b8",
        "block_index" => 500_000u64,
        "source" => "1AuTJDwH6xNqxRLEjPB7m86dgmerYVQ5G1",
        "asset" => "PEPECASH",
        "quantity" => 100_000_000u64,
        "memo" => vec![0xdeu8, 0xad, 0xbe, 0xef],
        "status" => "valid",
    };

    c.bench_function("messages/payload_json", |b| {
        b.iter(|| to_payload_json(black_box(&payload)));
    });
}

criterion_group!(
    benches,
    bench_name_to_id,
    bench_id_to_name,
    bench_subasset_compaction,
    bench_payload_json,
);
criterion_main!(benches);
