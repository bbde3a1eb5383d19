//! Benchmark batched gathers from a table much larger than the LLC.
//!
//! Compares the JIT routine, the portable unrolled copy and the scalar
//! reference, plus the one-off cost of generating a routine.
//!
//! Run with: cargo bench --bench gather_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gather_kernels::cpu_kernels::gather_unrolled;
use gather_kernels::{capability, GatherCompiler, GatherConfig, RoutineRegistry};
use gather_scalar_ops::scalar_gather;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TABLE_BYTES: usize = 256 << 20;
const BATCHES: usize = 1024;

/// Source pointers for `BATCHES` batches of `count` random records.
fn random_batches(table: &[u8], count: usize, size: usize) -> Vec<*const u8> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let slots = table.len() / size;
    (0..BATCHES * count)
        .map(|_| table[rng.gen_range(0..slots) * size..].as_ptr())
        .collect()
}

fn bench_gather(c: &mut Criterion) {
    let table = vec![0x5Au8; TABLE_BYTES];
    let registry = RoutineRegistry::detect();
    let jit = capability().supports_gather_jit();

    let mut group = c.benchmark_group("gather");
    for &(count, size) in &[(8usize, 16usize), (8, 64), (16, 20), (32, 48)] {
        let ptrs = random_batches(&table, count, size);
        let mut dst = vec![0u8; count * size];
        let label = format!("{count}x{size}B");

        if jit {
            let routine = registry.get_or_build(count, size).unwrap();
            group.bench_with_input(BenchmarkId::new("jit", &label), &ptrs, |b, ptrs| {
                b.iter(|| {
                    for batch in ptrs.chunks_exact(count) {
                        unsafe { routine.call(dst.as_mut_ptr(), batch.as_ptr()) };
                    }
                    black_box(&dst);
                })
            });
        }

        group.bench_with_input(BenchmarkId::new("portable", &label), &ptrs, |b, ptrs| {
            b.iter(|| {
                for batch in ptrs.chunks_exact(count) {
                    unsafe { gather_unrolled(dst.as_mut_ptr(), batch.as_ptr(), count, size) };
                }
                black_box(&dst);
            })
        });

        group.bench_with_input(BenchmarkId::new("scalar", &label), &ptrs, |b, ptrs| {
            b.iter(|| {
                for batch in ptrs.chunks_exact(count) {
                    unsafe { scalar_gather(dst.as_mut_ptr(), batch.as_ptr(), count, size) };
                }
                black_box(&dst);
            })
        });
    }
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    if !capability().supports_gather_jit() {
        return;
    }
    let compiler = GatherCompiler::with_config(*capability(), &GatherConfig::default());
    c.bench_function("generate_gather_16x76", |b| {
        b.iter(|| black_box(compiler.compile(black_box(16), black_box(76))).unwrap())
    });
}

criterion_group!(benches, bench_gather, bench_generation);
criterion_main!(benches);
