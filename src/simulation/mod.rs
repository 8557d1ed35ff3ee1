//! Simulation driver.
//!
//! Builds agents from a [`Problem`], then runs lock-step rounds:
//!
//! ```text
//! new():   every agent broadcasts its initial value
//! step():  mailer.advance_round()
//!          agent.iteration(&mut mailer)   for every agent, in id order
//!          record total cost
//! ```
//!
//! The protocol never terminates on its own; the caller picks the round
//! count, which must be a whole number of algorithm cycles.

pub mod experiment;
mod report;

use std::time::Instant;

use rand::Rng;

use crate::agent::{Agent, AgentCore, DsaAgent, Mgm2Agent};
use crate::config::{AlgorithmKind, Config};
use crate::error::{DcopError, Result};
use crate::problem::{NeighborValues, Problem};
use crate::protocol::{Mailer, MailerStats};
use crate::Value;

pub use report::{CostTrace, RunReport};

/// Create one agent per problem variable, running `config`'s algorithm.
pub fn build_agents(problem: &Problem, config: &Config, rng: &mut impl Rng) -> Result<Vec<Box<dyn Agent>>> {
    let domain = problem.domain();
    let mut agents: Vec<Box<dyn Agent>> = Vec::with_capacity(problem.agents());

    for model in problem.constraint_models()? {
        let core = AgentCore::new(model, domain.clone(), rng)?;
        let agent: Box<dyn Agent> = match config.environment.algorithm {
            AlgorithmKind::Dsa => Box::new(DsaAgent::new(core, config.dsa.variant, config.dsa.p, rng)?),
            AlgorithmKind::Mgm2 => Box::new(Mgm2Agent::new(core, config.mgm2.offer_probability, rng)?),
        };
        agents.push(agent);
    }

    Ok(agents)
}

/// Round-synchronous DCOP run.
#[derive(Debug)]
pub struct Simulation {
    agents: Vec<Box<dyn Agent>>,
    mailer: Mailer,
    algorithm: Option<AlgorithmKind>,
    cycle_len: usize,
    round: usize,
    trace: CostTrace,
}

impl Simulation {
    /// Start a simulation over `agents`.
    ///
    /// Agents must be indexed by id (`agents[i].id() == i`) and share one
    /// cycle length. Every agent's initial value is queued for round 1.
    pub fn new(agents: Vec<Box<dyn Agent>>) -> Result<Self> {
        for (index, agent) in agents.iter().enumerate() {
            if agent.id() != index {
                return Err(DcopError::Config(format!(
                    "Agent at position {index} has id {}",
                    agent.id()
                )));
            }
        }

        let cycle_len = agents.first().map_or(1, |a| a.rounds_per_cycle());
        if agents.iter().any(|a| a.rounds_per_cycle() != cycle_len) {
            return Err(DcopError::Config("Agents disagree on cycle length".to_string()));
        }

        let mut mailer = Mailer::new();
        for agent in &agents {
            agent.broadcast_value(&mut mailer);
        }

        let mut sim = Self {
            agents,
            mailer,
            algorithm: None,
            cycle_len,
            round: 0,
            trace: CostTrace::default(),
        };
        let initial = sim.total_cost()?;
        sim.trace = CostTrace::new(initial);
        Ok(sim)
    }

    /// Build agents for `problem` per `config` and start a simulation.
    pub fn from_problem(problem: &Problem, config: &Config, rng: &mut impl Rng) -> Result<Self> {
        let topology = problem.topology();
        tracing::info!(
            algorithm = %config.environment.algorithm,
            agents = problem.agents(),
            edges = topology.edges,
            components = topology.components,
            "Building simulation"
        );
        if topology.isolated > 0 {
            tracing::warn!("{} agents have no neighbors", topology.isolated);
        }

        let agents = build_agents(problem, config, rng)?;
        let mut sim = Self::new(agents)?;
        sim.algorithm = Some(config.environment.algorithm);
        Ok(sim)
    }

    /// Run one round and return the total cost after it.
    pub fn step(&mut self) -> Result<f64> {
        self.mailer.advance_round();

        for agent in &mut self.agents {
            agent.iteration(&mut self.mailer)?;
        }
        self.round += 1;

        let cost = self.total_cost()?;
        self.trace.record(cost);

        if self.round % self.cycle_len == 0 {
            tracing::debug!(
                round = self.round,
                cycle = self.round / self.cycle_len,
                cost,
                "Cycle complete"
            );
        }
        Ok(cost)
    }

    /// Run `rounds` rounds and report.
    pub fn run(&mut self, rounds: usize) -> Result<RunReport> {
        if rounds % self.cycle_len != 0 {
            return Err(DcopError::InvalidRoundCount {
                rounds,
                cycle_len: self.cycle_len,
            });
        }

        let started = Instant::now();
        let initial = self.trace.last();

        for _ in 0..rounds {
            self.step()?;
        }

        let report = RunReport::new(
            self.algorithm,
            self.agents.len(),
            self.cycle_len,
            self.trace.clone(),
            self.assignment(),
            self.mailer.stats(),
            started.elapsed(),
        );
        tracing::info!(
            rounds = self.round,
            initial,
            final_cost = report.final_cost,
            best = report.best_cost,
            "Run finished"
        );
        Ok(report)
    }

    /// `Σ_agents cost(agent.value, current neighbor values)`.
    ///
    /// Read-only view over actual values; each edge is counted from both
    /// sides.
    pub fn total_cost(&self) -> Result<f64> {
        let mut total = 0.0;
        for agent in &self.agents {
            let mut neighbor_values = NeighborValues::new();
            for neighbor in agent.core().neighbors() {
                let other = self.agents.get(neighbor).ok_or(DcopError::UnknownAgent(neighbor))?;
                neighbor_values.insert(neighbor, other.value());
            }
            total += agent.cost(agent.value(), &neighbor_values)?;
        }
        Ok(total)
    }

    /// Current value of every agent, by id.
    pub fn assignment(&self) -> Vec<Value> {
        self.agents.iter().map(|a| a.value()).collect()
    }

    /// Agents, by id.
    pub fn agents(&self) -> &[Box<dyn Agent>] {
        &self.agents
    }

    /// Rounds run so far.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Rounds per algorithm cycle.
    pub fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    /// Cost after every round so far.
    pub fn trace(&self) -> &CostTrace {
        &self.trace
    }

    /// Message bus counters.
    pub fn mailer_stats(&self) -> MailerStats {
        self.mailer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::CostMatrix;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn two_agent_problem() -> Problem {
        let mut problem = Problem::new(2, 2).unwrap();
        let costs = CostMatrix::from_rows(&[vec![0.0, 3.0], vec![3.0, 0.0]]).unwrap();
        problem.add_constraint(0, 1, costs).unwrap();
        problem
    }

    #[test]
    fn test_total_cost_counts_both_sides() {
        let problem = two_agent_problem();
        let models = problem.constraint_models().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let agents: Vec<Box<dyn Agent>> = models
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let core = AgentCore::with_value(m, vec![0, 1], i).unwrap();
                Box::new(DsaAgent::new(core, crate::DsaVariant::C, 0.0, &mut rng).unwrap()) as Box<dyn Agent>
            })
            .collect();

        let sim = Simulation::new(agents).unwrap();
        assert_eq!(sim.assignment(), vec![0, 1]);
        assert_eq!(sim.total_cost().unwrap(), 6.0);
        assert_eq!(sim.trace().last(), 6.0);
    }

    #[test]
    fn test_agents_must_be_indexed_by_id() {
        let problem = two_agent_problem();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut agents = build_agents(&problem, &Config::default(), &mut rng).unwrap();
        agents.reverse();
        assert!(Simulation::new(agents).is_err());
    }

    #[test]
    fn test_mgm2_rejects_partial_cycle() {
        let problem = two_agent_problem();
        let mut config = Config::default();
        config.environment.algorithm = AlgorithmKind::Mgm2;

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut sim = Simulation::from_problem(&problem, &config, &mut rng).unwrap();
        assert_eq!(sim.cycle_len(), 5);
        assert!(matches!(
            sim.run(7),
            Err(DcopError::InvalidRoundCount { rounds: 7, cycle_len: 5 })
        ));
        assert!(sim.run(10).is_ok());
        assert_eq!(sim.round(), 10);
    }

    #[test]
    fn test_step_records_trace() {
        let problem = two_agent_problem();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut sim = Simulation::from_problem(&problem, &Config::default(), &mut rng).unwrap();

        for _ in 0..4 {
            sim.step().unwrap();
        }
        // Initial cost plus one entry per round
        assert_eq!(sim.trace().per_round().len(), 5);
        assert_eq!(sim.mailer_stats().rounds, 4);
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new(Vec::new()).unwrap();
        let report = sim.run(3).unwrap();
        assert_eq!(report.final_cost, 0.0);
        assert!(report.final_assignment.is_empty());
    }
}
