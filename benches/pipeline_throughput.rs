//! Benchmarks for flowgraph processing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use demod_engine::backend::{share, CarrierModulation, SimulatedCarrier, SimulatedFrontEnd};
use demod_engine::config::EngineConfig;
use demod_engine::demod::{ModeSwitchCoordinator, PipelineBuilder, PipelineState, WiringTable};
use demod_engine::pipeline::Flowgraph;
use demod_engine::Mode;
use std::sync::Arc;

fn front_end() -> SimulatedFrontEnd {
    SimulatedFrontEnd::new()
        .with_carrier(
            SimulatedCarrier::tone(434_000_000.0, 0.5).with_modulation(CarrierModulation::Fm {
                deviation: 2_500.0,
                tone: 1_000.0,
            }),
        )
        .with_noise(0.01)
}

/// Graph wired for `mode`, optionally with every monitoring tap open.
fn wired_graph(mode: Mode, block_size: usize, taps: bool) -> (Flowgraph, ModeSwitchCoordinator) {
    let mut config = EngineConfig::default();
    config.pipeline.block_size = block_size;
    let fe = share(Box::new(front_end()));
    let built = PipelineBuilder::new(config)
        .build(Arc::clone(&fe))
        .expect("pipeline builds");
    let mut graph = built.graph;
    let mut coordinator = ModeSwitchCoordinator::new(
        WiringTable::standard(),
        built.ids,
        built.handles,
        fe,
        PipelineState::new(434_000_000),
    );
    coordinator.set_mode(&mut graph, mode).expect("mode applies");
    coordinator.set_fft_enabled(taps);
    coordinator.set_const_enabled(taps);
    graph.activate();
    (graph, coordinator)
}

fn bench_tick_per_family(c: &mut Criterion) {
    let mut group = c.benchmark_group("flowgraph_tick");
    let block_size = 4096;
    group.throughput(Throughput::Elements(block_size as u64));

    for mode in [Mode::Bpsk2000, Mode::Qpsk20000, Mode::Nbfm2500, Mode::Wbfm] {
        let (mut graph, _coordinator) = wired_graph(mode, block_size, false);
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, _| {
            b.iter(|| graph.tick().expect("tick succeeds"))
        });
    }
    group.finish();
}

fn bench_monitoring_taps(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitoring_taps");
    let block_size = 4096;
    group.throughput(Throughput::Elements(block_size as u64));

    for taps in [false, true] {
        let (mut graph, _coordinator) = wired_graph(Mode::Bpsk1000, block_size, taps);
        let label = if taps { "open" } else { "closed" };
        group.bench_function(label, |b| b.iter(|| graph.tick().expect("tick succeeds")));
    }
    group.finish();
}

fn bench_block_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_size");

    for block_size in [1024usize, 4096, 16384] {
        group.throughput(Throughput::Elements(block_size as u64));
        let (mut graph, _coordinator) = wired_graph(Mode::Nbfm5000, block_size, true);
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| b.iter(|| graph.tick().expect("tick succeeds")),
        );
    }
    group.finish();
}

fn bench_mode_switch(c: &mut Criterion) {
    let (mut graph, mut coordinator) = wired_graph(Mode::Bpsk2000, 4096, true);
    let mut modes = Mode::ALL.iter().cycle();

    c.bench_function("mode_switch", |b| {
        b.iter(|| {
            let mode = *modes.next().unwrap_or(&Mode::Bpsk2000);
            coordinator
                .set_mode(&mut graph, black_box(mode))
                .expect("switch succeeds")
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    let (mut graph, _coordinator) = wired_graph(Mode::Qpsk250000, 4096, true);
    c.bench_function("compile_plan", |b| {
        b.iter(|| black_box(graph.compile().stats.active_nodes))
    });
}

criterion_group!(
    benches,
    bench_tick_per_family,
    bench_monitoring_taps,
    bench_block_size,
    bench_mode_switch,
    bench_compile
);
criterion_main!(benches);
