use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fec_xor::xor::available_kernels;
use fec_xor::{AlignedBuffer, EncoderContext, GroupSizes, SlabEncoder};
use std::hint::black_box;

const PACKETS_PER_GROUP: usize = 10;

fn make_packets(size: usize) -> Vec<Vec<u8>> {
    (0..PACKETS_PER_GROUP)
        .map(|p| (0..size).map(|i| (i * 31 + p * 7) as u8).collect())
        .collect()
}

/// One group through each kernel the host supports
fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("xor_kernels");

    for size in [1200usize, 1500, 4096, 9000, 65536] {
        let packets = make_packets(size);
        let refs: Vec<&[u8]> = packets.iter().map(|p| &p[..]).collect();
        group.throughput(Throughput::Bytes((size * PACKETS_PER_GROUP) as u64));

        for kernel in available_kernels() {
            // Aligned output so large sizes take the streaming path
            let mut repair = AlignedBuffer::new(size).unwrap();
            group.bench_with_input(BenchmarkId::new(kernel.name(), size), &size, |b, &size| {
                b.iter(|| kernel.encode(black_box(&refs), black_box(&mut repair[..size])));
            });
        }
    }

    group.finish();
}

/// Full batches from a slab, sequential vs rayon
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");
    let size = 1200;
    let ctx = EncoderContext::default();

    for num_groups in [16usize, 256, 1024] {
        let total = num_groups * PACKETS_PER_GROUP;
        let mut slab = AlignedBuffer::new(total * size).unwrap();
        for (i, byte) in slab.iter_mut().enumerate() {
            *byte = (i * 13) as u8;
        }
        let offsets: Vec<u32> = (0..total).map(|i| (i * size) as u32).collect();
        let mut repair = AlignedBuffer::new(num_groups * size).unwrap();
        group.throughput(Throughput::Bytes((total * size) as u64));

        group.bench_function(BenchmarkId::new("sequential", num_groups), |b| {
            b.iter(|| {
                ctx.encode_batch(
                    black_box(&slab),
                    &offsets,
                    num_groups,
                    GroupSizes::Uniform(PACKETS_PER_GROUP),
                    size,
                    &mut repair,
                )
                .unwrap()
            });
        });

        group.bench_function(BenchmarkId::new("parallel", num_groups), |b| {
            b.iter(|| {
                ctx.encode_batch_parallel(
                    black_box(&slab),
                    &offsets,
                    num_groups,
                    GroupSizes::Uniform(PACKETS_PER_GROUP),
                    size,
                    &mut repair,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

/// Loose packets copied into the slab encoder each batch
fn bench_slab_encoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab_encoder");
    let size = 1200;
    let groups: Vec<Vec<Vec<u8>>> = (0..64).map(|_| make_packets(size)).collect();
    let mut encoder = SlabEncoder::new(0.1, 64).unwrap();
    group.throughput(Throughput::Bytes((64 * PACKETS_PER_GROUP * size) as u64));

    group.bench_function("64_groups", |b| {
        b.iter(|| encoder.encode(black_box(&groups), size).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_kernels, bench_batch, bench_slab_encoder);
criterion_main!(benches);
