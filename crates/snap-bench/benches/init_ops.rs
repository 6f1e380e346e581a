//! Criterion benchmarks for the field initializers.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use snap_bench::{bench_registry, bench_runtime, reference_problem, stress_problem};
use snap_init::{InitMaterial, InitSource, Snap, SnapConfig};
use snap_task::SnapTask;

fn bench_init(c: &mut Criterion, name: &str, config: SnapConfig, workers: usize) {
    let snap = Snap::new(config).unwrap();
    let rt = bench_runtime(bench_registry(|_| Ok(())).unwrap(), workers).unwrap();
    let mat = rt.create_array(snap.material_def().unwrap()).unwrap();
    let qi = rt.create_array(snap.source_def().unwrap()).unwrap();

    c.bench_function(name, |b| {
        b.iter(|| {
            InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
            InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
            rt.fence().unwrap();
        });
    });
    black_box(rt.map_array(&mat).unwrap());
}

fn bench_init_reference(c: &mut Criterion) {
    bench_init(c, "init_reference_4w", reference_problem(), 4);
}

fn bench_init_reference_serial(c: &mut Criterion) {
    bench_init(c, "init_reference_1w", reference_problem(), 1);
}

fn bench_init_stress(c: &mut Criterion) {
    bench_init(c, "init_stress_4w", stress_problem(), 4);
}

criterion_group!(
    benches,
    bench_init_reference,
    bench_init_reference_serial,
    bench_init_stress
);
criterion_main!(benches);
