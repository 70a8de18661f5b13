use criterion::{criterion_group, criterion_main, Criterion};

use metrics_instruments::{ExpDecaySample, Sample, UniformSample};

fn sample_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_update");

    for size in [257usize, 514, 1028] {
        group.bench_function(format!("uniform/{size}"), |b| {
            let sample = UniformSample::new(size);
            let mut i = 0i64;
            b.iter(|| {
                i += 1;
                sample.update(i);
            });
        });

        group.bench_function(format!("exp_decay/{size}"), |b| {
            let sample = ExpDecaySample::builder().reservoir_size(size).build();
            let mut i = 0i64;
            b.iter(|| {
                i += 1;
                sample.update(i);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, sample_benchmark);
criterion_main!(benches);
