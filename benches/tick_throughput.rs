use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vitalsim_core::sim::{EcgGenerator, TICK_SECONDS};
use vitalsim_core::{MonitorSim, Pathology, SimConfig};

const PATHOLOGIES: &[Pathology] = &[
    Pathology::SinusRhythm,
    Pathology::AtrialFibrillation,
    Pathology::VentricularFibrillation,
    Pathology::AVBlock3,
    Pathology::Asystole,
];

fn benchmark_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_tick");
    group.throughput(Throughput::Elements(1000));

    for pathology in PATHOLOGIES {
        group.bench_with_input(
            BenchmarkId::new("1000_ticks", pathology.label()),
            pathology,
            |b, pathology| {
                let config = SimConfig::from_pathology(pathology);
                let mut sim = MonitorSim::with_seed(config, 42).unwrap();
                b.iter(|| {
                    for _ in 0..1000 {
                        let sample = sim.tick(black_box(TICK_SECONDS)).unwrap();
                        black_box(sample);
                    }
                });
            },
        );
    }
    group.finish();
}

fn benchmark_ecg_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecg_generator");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("sinus_1000_ticks", |b| {
        let config = SimConfig::from_pathology(&Pathology::SinusRhythm);
        let mut ecg = EcgGenerator::new(config, 42).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(ecg.tick(black_box(TICK_SECONDS)));
            }
        });
    });

    group.bench_function("config_switch_mid_run", |b| {
        let sinus = SimConfig::from_pathology(&Pathology::SinusRhythm);
        let mut tachy = sinus.clone();
        tachy.vitals.hr = 160.0;
        tachy.touch();
        let mut ecg = EcgGenerator::new(sinus.clone(), 42).unwrap();
        b.iter(|| {
            ecg.apply_config(black_box(tachy.clone()), false);
            for _ in 0..100 {
                black_box(ecg.tick(TICK_SECONDS));
            }
            ecg.apply_config(black_box(sinus.clone()), true);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_full_tick, benchmark_ecg_synthesis);
criterion_main!(benches);
