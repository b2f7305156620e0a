//! Resolver throughput: single-fit resolve/calculate and a parallel corpus batch.
//!
//! Run with: `cargo bench --bench resolver`

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dogma_parity::engine::{calculate, resolve};
use dogma_parity::fit::{Fit, FittedModule, SlotKind};
use dogma_parity::parallel::WorkerPool;
use rayon::prelude::*;

use common::*;

fn brawler(pack: &dogma_parity::data::pack::DataPack, fit_id: &str) -> Fit {
    Fit::builder(fit_id, RIFTER)
        .module(FittedModule::new(LIGHT_AUTOCANNON, SlotKind::High).with_charge(HAIL))
        .module(FittedModule::new(GATLING, SlotKind::High).with_charge(BARRAGE))
        .module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
        .module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
        .module(FittedModule::new(ARMOR_EM_HARDENER, SlotKind::Low))
        .drone(WARRIOR, 3)
        .build(pack)
        .expect("bench fit should build")
}

fn bench_single_fit(c: &mut Criterion) {
    let pack = pack();
    let fit = brawler(&pack, "brawler");

    let mut group = c.benchmark_group("resolver");
    group.throughput(Throughput::Elements(1));
    group.bench_function("resolve", |b| {
        b.iter(|| resolve(black_box(&pack), black_box(&fit)).expect("resolve"))
    });
    group.bench_function("calculate", |b| {
        b.iter(|| calculate(black_box(&pack), black_box(&fit)).expect("calculate"))
    });
    group.finish();
}

fn bench_parallel_batch(c: &mut Criterion) {
    let pack = pack();
    let fits: Vec<Fit> = (0..256)
        .map(|index| brawler(&pack, &format!("fit-{index}")))
        .collect();

    let mut group = c.benchmark_group("resolver_batch");
    group.throughput(Throughput::Elements(fits.len() as u64));
    group.sample_size(20);
    for workers in [1usize, 2, 4] {
        let pool = WorkerPool::with_workers(workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &fits, |b, fits| {
            b.iter(|| {
                pool.install(|| {
                    fits.par_iter()
                        .map(|fit| calculate(&pack, fit).map(|metrics| metrics.result.dps_total))
                        .collect::<Result<Vec<f64>, _>>()
                })
                .expect("pool")
                .expect("calculate")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_fit, bench_parallel_batch);
criterion_main!(benches);
