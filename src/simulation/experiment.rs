//! Multi-run experiments.
//!
//! - [`compare_toughness`]: final cost across problem toughness (p2) values
//! - [`cost_curves`]: per-cycle cost for several seeds of one configuration
//!
//! Run `i` generates its problem from `constraints.seed + i` and seeds its
//! agents from `environment.seed + i` (`constraints.seed + i` if unset), so a
//! configuration always reproduces the same numbers. Seed offsets wrap at
//! `u64::MAX`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{RunReport, Simulation};
use crate::config::Config;
use crate::error::Result;
use crate::problem::{generate, GeneratorParams};

/// Final costs of every run at one toughness value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToughnessResult {
    /// p2
    pub toughness: f64,
    /// Final cost per run
    pub final_costs: Vec<f64>,
}

impl ToughnessResult {
    /// Mean final cost
    pub fn mean(&self) -> f64 {
        if self.final_costs.is_empty() {
            0.0
        } else {
            self.final_costs.iter().sum::<f64>() / self.final_costs.len() as f64
        }
    }

    /// Lowest final cost
    pub fn min(&self) -> f64 {
        self.final_costs.iter().copied().reduce(f64::min).unwrap_or_default()
    }

    /// Highest final cost
    pub fn max(&self) -> f64 {
        self.final_costs.iter().copied().reduce(f64::max).unwrap_or_default()
    }
}

/// p2 values 0.1, 0.2, …, 0.9
pub fn default_toughness_values() -> Vec<f64> {
    (1..10).map(|i| f64::from(i) / 10.0).collect()
}

/// Run `config` once on a freshly generated problem for seed offset `run`.
pub fn run_once(config: &Config, run: u64) -> Result<RunReport> {
    let problem_seed = config.constraints.seed.wrapping_add(run);
    let agent_seed = config
        .environment
        .seed
        .unwrap_or(config.constraints.seed)
        .wrapping_add(run);

    let params = GeneratorParams::from_config(&config.environment, &config.constraints);
    let problem = generate(&params, &mut StdRng::seed_from_u64(problem_seed))?;

    let mut sim = Simulation::from_problem(&problem, config, &mut StdRng::seed_from_u64(agent_seed))?;
    sim.run(config.rounds())
}

/// Final cost at each toughness value, `runs` seeds each.
pub fn compare_toughness(config: &Config, toughness_values: &[f64], runs: usize) -> Result<Vec<ToughnessResult>> {
    config.validate()?;

    toughness_values
        .iter()
        .map(|&toughness| {
            let mut run_config = config.clone();
            run_config.constraints.toughness = toughness;

            let final_costs = (0..runs as u64)
                .map(|run| run_once(&run_config, run).map(|report| report.final_cost))
                .collect::<Result<Vec<_>>>()?;

            let result = ToughnessResult {
                toughness,
                final_costs,
            };
            tracing::info!(toughness, mean = result.mean(), "Toughness sweep point");
            Ok(result)
        })
        .collect()
}

/// Per-cycle cost trace of each of `runs` seeds.
pub fn cost_curves(config: &Config, runs: usize) -> Result<Vec<Vec<f64>>> {
    config.validate()?;

    (0..runs as u64)
        .map(|run| run_once(config, run).map(|report| report.cycle_costs()))
        .collect()
}
