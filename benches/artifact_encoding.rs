//! Artifact encoding benchmark suite.
//!
//! Benchmarks chunked base64 encoding of downloaded artifacts:
//! - Artifact sizes: 64 KiB, 1 MiB, 16 MiB
//! - Chunk sizes: 3 KiB, 96 KiB, 1 MiB
//!
//! Run with: cargo bench --bench artifact_encoding
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use cadagent_bridge::artifact::{decode, encode_chunked};
use cadagent_bridge::parameters;
use cadagent_bridge::{ParameterDescriptor, ParameterId};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ARTIFACT_SIZES: &[usize] = &[64 * 1024, 1024 * 1024, 16 * 1024 * 1024];
const CHUNK_SIZES: &[usize] = &[3 * 1024, 96 * 1024, 1024 * 1024];

fn artifact(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

// ============================================================================
// Benchmark: Chunked Encoding
// ============================================================================

fn bench_encode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_chunked");

    for &size in ARTIFACT_SIZES {
        let bytes = artifact(size);
        group.throughput(Throughput::Bytes(size as u64));

        for &chunk in CHUNK_SIZES {
            group.bench_with_input(
                BenchmarkId::new(format!("chunk_{}k", chunk / 1024), size),
                &bytes,
                |b, bytes| b.iter(|| encode_chunked(black_box(bytes), chunk)),
            );
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decoding
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &size in ARTIFACT_SIZES {
        let text = encode_chunked(&artifact(size), 96 * 1024);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| decode(black_box(text)))
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Parameter Presentation
// ============================================================================

fn bench_parameter_views(c: &mut Criterion) {
    let descriptors: Vec<ParameterDescriptor> = (0..500u32)
        .map(|i| ParameterDescriptor {
            id: ParameterId::new(format!("p{i}")),
            display_name: if i % 10 == 0 {
                format!("origin_{i}")
            } else {
                format!("length_{i}")
            },
            hierarchical_path: format!("Body{}.feature{i}", i / 50),
            current_value: f64::from(i) * 1.5,
            unit: Some("mm".to_string()),
            step_hint: None,
        })
        .collect();

    c.bench_function("parameter_views_500", |b| {
        b.iter(|| parameters::views(black_box(&descriptors)))
    });
}

criterion_group!(
    benches,
    bench_encode_chunked,
    bench_decode,
    bench_parameter_views
);
criterion_main!(benches);
