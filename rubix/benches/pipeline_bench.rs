//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rubix::pipeline::{build_pipeline, AbstractPipeline, StageRegistry};
use rubix::testing::{galaxy_config, galaxy_fixture};

fn pipeline_benchmark(c: &mut Criterion) {
    let pipeline = match build_pipeline(&StageRegistry::with_builtins(), &galaxy_config(), "calc_ifu") {
        Ok(pipeline) => pipeline,
        Err(err) => panic!("calc_ifu does not build: {err}"),
    };

    let mut group = c.benchmark_group("calc_ifu");
    for particles in [100, 10_000] {
        let input = galaxy_fixture(particles, particles);

        group.bench_with_input(BenchmarkId::new("linear", particles), &input, |b, input| {
            b.iter(|| black_box(pipeline.run(input.clone())))
        });
        group.bench_with_input(BenchmarkId::new("compiled", particles), &input, |b, input| {
            b.iter(|| black_box(pipeline.run_compiled(input)))
        });
    }
    group.finish();
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
