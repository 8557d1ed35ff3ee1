//! Criterion benchmarks for the round protocol.
//!
//! - One MGM-2 cycle (5 rounds) on a 30-agent, D=10 problem
//! - One DSA round on the same problem
//! - Problem generation

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use dcop::problem::{generate, GeneratorParams};
use dcop::{AlgorithmKind, Config, Problem, Simulation};

fn bench_config(algorithm: AlgorithmKind) -> Config {
    let mut config = Config::default();
    config.environment.algorithm = algorithm;
    config
}

fn bench_problem(config: &Config) -> Problem {
    let params = GeneratorParams::from_config(&config.environment, &config.constraints);
    generate(&params, &mut ChaCha8Rng::seed_from_u64(0)).expect("generate problem")
}

fn bench_mgm2_cycle(c: &mut Criterion) {
    let config = bench_config(AlgorithmKind::Mgm2);
    let problem = bench_problem(&config);

    c.bench_function("mgm2_cycle_30_agents", |b| {
        b.iter_batched(
            || Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(1)).expect("simulation"),
            |mut sim| black_box(sim.run(5).expect("cycle")),
            BatchSize::SmallInput,
        );
    });
}

fn bench_dsa_round(c: &mut Criterion) {
    let config = bench_config(AlgorithmKind::Dsa);
    let problem = bench_problem(&config);
    let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(1)).expect("simulation");

    c.bench_function("dsa_round_30_agents", |b| {
        b.iter(|| black_box(sim.step().expect("round")));
    });
}

fn bench_generate(c: &mut Criterion) {
    let config = Config::default();
    let params = GeneratorParams::from_config(&config.environment, &config.constraints);
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    c.bench_function("generate_30_agents", |b| {
        b.iter(|| black_box(generate(&params, &mut rng).expect("generate")));
    });
}

criterion_group!(benches, bench_mgm2_cycle, bench_dsa_round, bench_generate);
criterion_main!(benches);
