//! Benchmarks for the evolution environment.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use maze_evolution::{
    compute::{
        Environment, TrackGenerator,
        evolution::{EvolutionRng, next_generation},
    },
    schema::SimulationConfig,
};

fn bench_environment_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("environment_tick");

    for population in [10, 30, 100, 300] {
        let config = SimulationConfig {
            population_size: population,
            ticks_per_generation: 600,
            random_seed: Some(1),
            ..Default::default()
        };
        let mut env = Environment::new(config).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &population,
            |b, _| {
                b.iter(|| {
                    black_box(env.tick().unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_track_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("track_generation");

    for size in [3, 7, 11, 15] {
        let generator = TrackGenerator::new(size, 700.0 / size as f64);
        let mut rng = StdRng::seed_from_u64(3);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(generator.generate(&mut rng)));
        });
    }

    group.finish();
}

fn bench_next_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_generation");

    // Default topology: 6 inputs, two hidden layers of 10, 2 outputs
    let genome_len = 6 * 10 + 10 * 10 + 10 * 2;
    for population in [30, 100, 300] {
        let mut rng = EvolutionRng::new(5);
        let genomes: Vec<Vec<f64>> = (0..population)
            .map(|i| vec![i as f64 * 0.01; genome_len])
            .collect();
        let fitnesses: Vec<f64> = (0..population).map(|i| (i % 7) as f64).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &population,
            |b, _| {
                b.iter(|| {
                    next_generation(&mut rng, black_box(&genomes), &fitnesses, 0.2, 0.1, 0.1)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_environment_tick,
    bench_track_generation,
    bench_next_generation
);
criterion_main!(benches);
