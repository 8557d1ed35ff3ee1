//! End-to-end simulation tests.
//!
//! These drive whole runs through the public API: problem construction,
//! agent setup, the round loop and the file formats the CLI reads.

use dcop::agent::Phase;
use dcop::problem::{generate, GeneratorParams};
use dcop::{
    Agent, AgentCore, AlgorithmKind, Config, CostMatrix, DcopError, DsaAgent, DsaVariant, Mailer, Mgm2Agent, Payload,
    Problem, Simulation, Value,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Two agents that pay 3 each whenever they disagree.
fn disagreement_problem() -> Problem {
    let mut problem = Problem::new(2, 2).unwrap();
    let costs = CostMatrix::from_rows(&[vec![0.0, 3.0], vec![3.0, 0.0]]).unwrap();
    problem.add_constraint(0, 1, costs).unwrap();
    problem
}

fn dsa_agents(problem: &Problem, values: &[Value], p: f64, rng: &mut ChaCha8Rng) -> Vec<Box<dyn Agent>> {
    problem
        .constraint_models()
        .unwrap()
        .into_iter()
        .zip(values)
        .map(|(model, &value)| {
            let core = AgentCore::with_value(model, problem.domain(), value).unwrap();
            Box::new(DsaAgent::new(core, DsaVariant::C, p, rng).unwrap()) as Box<dyn Agent>
        })
        .collect()
}

fn generated(config: &Config, seed: u64) -> Problem {
    let params = GeneratorParams::from_config(&config.environment, &config.constraints);
    generate(&params, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap()
}

/// Synchronous best response makes both agents jump at once
#[test]
fn test_dsa_certain_replacement_swaps_together() {
    let problem = disagreement_problem();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut sim = Simulation::new(dsa_agents(&problem, &[0, 1], 1.0, &mut rng)).unwrap();

    assert_eq!(sim.total_cost().unwrap(), 6.0);

    sim.step().unwrap();
    assert_eq!(sim.assignment(), vec![1, 0]);
    sim.step().unwrap();
    assert_eq!(sim.assignment(), vec![0, 1]);
    assert_eq!(sim.total_cost().unwrap(), 6.0);
}

/// With p = 1 the pair ends at cost 0 exactly when it starts in agreement
#[test]
fn test_dsa_certain_replacement_converges_iff_initial_agreement() {
    let problem = disagreement_problem();
    let mut config = Config::default();
    config.dsa.p = 1.0;

    let mut agreed = 0;
    let mut disagreed = 0;
    for seed in 0..40 {
        let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let initial = sim.assignment();
        let report = sim.run(100).unwrap();

        if initial[0] == initial[1] {
            agreed += 1;
            assert_eq!(report.final_assignment, initial, "seed {seed}");
            assert!(report.trace.per_round().iter().all(|&c| c == 0.0), "seed {seed}");
        } else {
            disagreed += 1;
            // Every round both flip, so the pair never agrees
            assert!(report.trace.per_round().iter().all(|&c| c == 6.0), "seed {seed}");
            assert_eq!(report.final_assignment, initial, "seed {seed}");
        }
    }
    assert!(agreed > 0 && disagreed > 0);
}

/// With p < 1 one side eventually moves alone and the pair settles
#[test]
fn test_dsa_two_agents_converge() {
    let problem = disagreement_problem();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sim = Simulation::new(dsa_agents(&problem, &[0, 1], 0.5, &mut rng)).unwrap();

    let report = sim.run(200).unwrap();

    assert_eq!(report.final_cost, 0.0);
    assert_eq!(report.final_assignment[0], report.final_assignment[1]);
    assert_eq!(report.rounds, 200);
}

/// Agreement is stable under DSA-C
#[test]
fn test_dsa_agreement_is_stable() {
    let problem = disagreement_problem();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut sim = Simulation::new(dsa_agents(&problem, &[1, 1], 1.0, &mut rng)).unwrap();

    let report = sim.run(20).unwrap();
    assert_eq!(report.final_assignment, vec![1, 1]);
    assert!(report.trace.per_round().iter().all(|&c| c == 0.0));
}

#[test]
fn test_dsa_zero_probability_never_moves() {
    let mut config = Config::default();
    config.environment.agents = 12;
    config.environment.domain_size = 4;
    config.dsa.p = 0.0;
    let problem = generated(&config, 3);

    let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
    let initial = sim.assignment();
    let report = sim.run(25).unwrap();

    assert_eq!(report.final_assignment, initial);
}

/// Every path through one MGM-2 cycle resolves the disagreement
#[test]
fn test_mgm2_two_agents_settle_in_one_cycle() {
    let problem = disagreement_problem();
    let mut config = Config::default();
    config.environment.algorithm = AlgorithmKind::Mgm2;

    for seed in 0..10 {
        let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let report = sim.run(5).unwrap();
        assert_eq!(report.final_cost, 0.0, "seed {seed}");
    }
}

#[test]
fn test_mgm2_cost_never_rises_between_cycles() {
    let mut config = Config::default();
    config.environment.agents = 15;
    config.environment.domain_size = 5;
    config.environment.iterations = 20;
    config.environment.algorithm = AlgorithmKind::Mgm2;

    for seed in 0..3 {
        let problem = generated(&config, seed);
        let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let report = sim.run(config.rounds()).unwrap();

        let cycles = report.cycle_costs();
        assert_eq!(cycles.len(), 21);
        for pair in cycles.windows(2) {
            assert!(pair[1] <= pair[0], "seed {seed}: {cycles:?}");
        }
        assert_eq!(report.cycles(), 20);
    }
}

/// Two agents that both win their neighborhoods move together
#[test]
fn test_mgm2_pair_moves_by_mutual_consent() {
    let problem = disagreement_problem();
    let models = problem.constraint_models().unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let mut offerer = Mgm2Agent::new(
        AgentCore::with_value(models[0].clone(), problem.domain(), 0).unwrap(),
        1.0,
        &mut rng,
    )
    .unwrap();
    let mut responder = Mgm2Agent::new(
        AgentCore::with_value(models[1].clone(), problem.domain(), 1).unwrap(),
        0.0,
        &mut rng,
    )
    .unwrap();

    let mut mailer = Mailer::new();
    offerer.broadcast_value(&mut mailer);
    responder.broadcast_value(&mut mailer);

    for _ in 0..5 {
        mailer.advance_round();
        offerer.iteration(&mut mailer).unwrap();
        responder.iteration(&mut mailer).unwrap();
    }

    assert_eq!(offerer.phase(), Phase::CommitOffers);
    assert_eq!(offerer.value(), responder.value());
    assert_eq!(offerer.last_cost(), Some(3.0));
}

#[test]
fn test_unexpected_message_aborts_run() {
    let problem = disagreement_problem();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut agents = dsa_agents(&problem, &[0, 0], 1.0, &mut rng);

    let mut mailer = Mailer::new();
    mailer.deliver(1, 0, Payload::Gain(4.0));
    mailer.advance_round();

    let err = agents[0].iteration(&mut mailer).unwrap_err();
    assert!(matches!(err, DcopError::UnexpectedMessage { agent: 0, sender: 1, .. }));
    assert!(err.is_protocol_violation());
}

#[test]
fn test_problem_file_round_trip() {
    let config = Config::default();
    let problem = generated(&config, 11);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("problem.json");
    problem.save(&path).unwrap();

    let loaded = Problem::from_file(&path).unwrap();
    assert_eq!(loaded, problem);
    assert_eq!(loaded.topology(), problem.topology());
}

#[test]
fn test_config_file_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dcop.toml");
    std::fs::write(
        &path,
        r#"
[environment]
agents = 8
domain_size = 3
iterations = 6
algorithm = "mgm2"
seed = 5

[constraints]
density = 0.6
toughness = 0.7
cost_range = [1, 20]
seed = 9

[mgm2]
offer_probability = 0.3
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.environment.algorithm, AlgorithmKind::Mgm2);
    assert_eq!(config.rounds(), 30);
    assert_eq!(config.dsa.variant, DsaVariant::C);

    let problem = generated(&config, config.constraints.seed);
    let mut sim = Simulation::from_problem(&problem, &config, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    let report = sim.run(config.rounds()).unwrap();

    assert_eq!(report.agents, 8);
    assert_eq!(report.algorithm, Some(AlgorithmKind::Mgm2));
    assert!(report.final_assignment.iter().all(|&v| v < 3));
    assert!(report.messages.total() > 0);
}
