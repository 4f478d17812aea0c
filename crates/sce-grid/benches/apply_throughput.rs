use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sce_core::PhysicalConstants;
use sce_grid::{CollisionKernel, KernelTensor, MassGrid};

fn setup(num_bins: usize) -> (KernelTensor, Vec<f64>, Vec<f64>) {
    let constants = PhysicalConstants::default();
    let grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, num_bins).expect("grid");
    let tensor = KernelTensor::discretize(&constants, &grid, &CollisionKernel::Hall)
        .expect("tensor");
    let dsd: Vec<f64> = (0..num_bins)
        .map(|idx| 1.0e-3 * (-(idx as f64) / num_bins as f64).exp())
        .collect();
    let out = vec![0.0; num_bins];
    (tensor, dsd, out)
}

fn bench_apply(c: &mut Criterion) {
    for &num_bins in &[42usize, 168, 672] {
        let (tensor, dsd, mut out) = setup(num_bins);
        c.bench_function(&format!("apply_nb{num_bins}"), |b| {
            b.iter(|| {
                out.iter_mut().for_each(|value| *value = 0.0);
                tensor
                    .apply_into(black_box(&dsd), black_box(&mut out))
                    .expect("apply");
            })
        });
    }
}

criterion_group!(benches, bench_apply);
criterion_main!(benches);
