//! Benchmarks for blockcheck lookup and load performance.
//!
//! Run with: cargo bench
//!
//! Measured:
//! - Single address lookups against indexes of different sizes
//! - Batch checks through the query service
//! - Dataset parsing throughput
//! - Publishing a freshly built index

use blockcheck::{DatasetLoader, PrefixIndex, PublishedIndex, QueryService};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::net::IpAddr;
use std::sync::Arc;

/// Generate a dump in the upstream format with `records` lines.
///
/// Every fourth record lists two addresses, every tenth an IPv6 network.
fn generate_dataset(records: usize) -> Vec<u8> {
    let mut out = String::from("Updated: 2024-01-01 00:00:00 +0000\n");
    for i in 0..records {
        let a = (i >> 16) as u8;
        let b = (i >> 8) as u8;
        let c = i as u8;
        if i % 10 == 0 {
            out.push_str(&format!("2001:db8:{:x}::/48;entry {}\n", i, i));
        } else if i % 4 == 0 {
            let net = format!("{}.{}.{}", a + 1, b, c);
            out.push_str(&format!("{net}.1 | {net}.2;entry {i}\n"));
        } else {
            out.push_str(&format!("{}.{}.{}.0/24;entry {}\n", a + 1, b, c, i));
        }
    }
    out.into_bytes()
}

fn build_index(records: usize) -> PrefixIndex {
    DatasetLoader::load_bytes(&generate_dataset(records))
        .unwrap()
        .0
}

/// Generate query addresses, roughly `hit_ratio` of which are listed.
fn generate_queries(count: usize, records: usize, hit_ratio: f64) -> Vec<String> {
    let hits = (count as f64 * hit_ratio) as usize;
    let mut queries = Vec::with_capacity(count);

    for i in 0..hits {
        let r = (i * 7919) % records;
        let r = if r % 10 == 0 { r + 1 } else { r };
        queries.push(format!("{}.{}.{}.1", (r >> 16) as u8 + 1, (r >> 8) as u8, r as u8));
    }
    for i in hits..count {
        queries.push(format!("200.{}.{}.9", (i >> 8) as u8, i as u8));
    }

    queries
}

/// Benchmark single lookups as the index grows.
fn bench_lookup_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_scalability");

    for size in [1_000, 10_000, 100_000].iter() {
        let index = build_index(*size);
        let ips: Vec<IpAddr> = generate_queries(100, *size, 0.8)
            .iter()
            .map(|q| q.parse().unwrap())
            .collect();

        group.throughput(Throughput::Elements(ips.len() as u64));
        group.bench_with_input(BenchmarkId::new("records", size), size, |b, _| {
            b.iter(|| {
                for ip in &ips {
                    black_box(index.lookup(*ip));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark IPv6 lookups, which walk the wider trie.
fn bench_ipv6_lookup(c: &mut Criterion) {
    let index = build_index(10_000);
    let ips: Vec<IpAddr> = (0..100)
        .map(|i| format!("2001:db8:{:x}::1", i * 10).parse().unwrap())
        .collect();

    let mut group = c.benchmark_group("ipv6_lookup");
    group.throughput(Throughput::Elements(ips.len() as u64));

    group.bench_function("listed_48", |b| {
        b.iter(|| {
            for ip in &ips {
                black_box(index.lookup(*ip));
            }
        })
    });

    group.bench_function("unlisted", |b| {
        let ip: IpAddr = "2a00:1450:4001::1".parse().unwrap();
        b.iter(|| black_box(index.lookup(ip)))
    });

    group.finish();
}

/// Benchmark batch checks through the query service.
fn bench_check_batch(c: &mut Criterion) {
    let records = 50_000;
    let service = QueryService::new(Arc::new(PublishedIndex::new(build_index(records))));

    let mut group = c.benchmark_group("check_batch");

    for batch in [1, 10, 100, 1_000].iter() {
        let queries = generate_queries(*batch, records, 0.5);
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("addresses", batch), batch, |b, _| {
            b.iter(|| black_box(service.check_batch(&queries).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark parsing a dump into a fresh index.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for size in [10_000, 100_000].iter() {
        let data = generate_dataset(*size);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("records", size), size, |b, _| {
            b.iter(|| black_box(DatasetLoader::load_bytes(&data).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark swapping in a new index while the old one is referenced.
fn bench_publish(c: &mut Criterion) {
    let published = PublishedIndex::new(build_index(10_000));
    let next = build_index(10_000);

    let mut group = c.benchmark_group("publish");

    group.bench_function("swap_10k_records", |b| {
        b.iter_batched(
            || (published.snapshot(), next.clone()),
            |(_held, index)| black_box(published.publish(index)),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_lookup_scalability,
    bench_ipv6_lookup,
    bench_check_batch,
    bench_load,
    bench_publish,
);

criterion_main!(benches);
