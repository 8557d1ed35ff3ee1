//! Random problem generation.
//!
//! Two knobs shape an instance:
//!
//! - **density** (p1): fraction of all `n(n-1)/2` agent pairs that become edges
//! - **toughness** (p2): fraction of each cost matrix that is non-zero
//!
//! Edges are sampled without replacement; each matrix gets exactly
//! `floor((1 - p2) · D²)` zero cells, the rest uniform integers in
//! `[low, high)`, shuffled into place.

use ndarray::Array2;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{CostMatrix, Problem};
use crate::config::{ConstraintConfig, EnvironmentConfig};
use crate::error::{DcopError, Result};

/// Parameters for [`generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorParams {
    /// Number of agents
    pub agents: usize,
    /// Domain size D
    pub domain_size: usize,
    /// Edge probability p1 in `[0, 1]`
    pub density: f64,
    /// Non-zero cost fraction p2 in `[0, 1]`
    pub toughness: f64,
    /// Cost bounds `[low, high)`
    pub cost_range: (u32, u32),
}

impl GeneratorParams {
    /// Take agent count and domain from `[environment]`, the rest from `[constraints]`.
    pub fn from_config(env: &EnvironmentConfig, constraints: &ConstraintConfig) -> Self {
        Self {
            agents: env.agents,
            domain_size: env.domain_size,
            density: constraints.density,
            toughness: constraints.toughness,
            cost_range: constraints.cost_range,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("density", self.density), ("toughness", self.toughness)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DcopError::InvalidProbability { name, value });
            }
        }
        let (low, high) = self.cost_range;
        if low >= high {
            return Err(DcopError::Config(format!("Empty cost range [{low}, {high})")));
        }
        Ok(())
    }
}

/// Generate a random problem.
pub fn generate(params: &GeneratorParams, rng: &mut impl Rng) -> Result<Problem> {
    params.validate()?;

    let mut problem = Problem::new(params.agents, params.domain_size)?;

    let pairs: Vec<(usize, usize)> = (0..params.agents)
        .flat_map(|a| ((a + 1)..params.agents).map(move |b| (a, b)))
        .collect();
    let edge_count = (params.density * pairs.len() as f64) as usize;

    for i in index::sample(rng, pairs.len(), edge_count) {
        let (a, b) = pairs[i];
        let costs = random_matrix(params, rng)?;
        problem.add_constraint(a, b, costs)?;
    }

    tracing::debug!(
        agents = params.agents,
        edges = edge_count,
        domain = params.domain_size,
        "Generated problem"
    );
    if edge_count == 0 && params.agents > 1 {
        tracing::warn!("Density {} produced no edges", params.density);
    }

    Ok(problem)
}

fn random_matrix(params: &GeneratorParams, rng: &mut impl Rng) -> Result<CostMatrix> {
    let cells = params.domain_size * params.domain_size;
    let zeros = ((1.0 - params.toughness) * cells as f64) as usize;
    let (low, high) = params.cost_range;

    let mut costs: Vec<f64> = std::iter::repeat(0.0)
        .take(zeros)
        .chain((zeros..cells).map(|_| f64::from(rng.gen_range(low..high))))
        .collect();
    costs.shuffle(rng);

    Array2::from_shape_vec((params.domain_size, params.domain_size), costs)
        .map(CostMatrix::new)
        .map_err(|e| DcopError::Config(format!("Invalid cost matrix: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params() -> GeneratorParams {
        GeneratorParams {
            agents: 10,
            domain_size: 4,
            density: 0.5,
            toughness: 0.25,
            cost_range: (10, 20),
        }
    }

    #[test]
    fn test_edge_count_follows_density() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let problem = generate(&params(), &mut rng).unwrap();
        // 45 pairs * 0.5
        assert_eq!(problem.constraints().len(), 22);
    }

    #[test]
    fn test_zero_cells_follow_toughness() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let problem = generate(&params(), &mut rng).unwrap();

        for edge in problem.constraints() {
            let zeros = edge.costs.as_array().iter().filter(|&&c| c == 0.0).count();
            // 16 cells, 12 forced zeros; sampled costs are never zero
            assert_eq!(zeros, 12);
            assert!(edge
                .costs
                .as_array()
                .iter()
                .all(|&c| c == 0.0 || (10.0..20.0).contains(&c)));
        }
    }

    #[test]
    fn test_same_seed_same_problem() {
        let a = generate(&params(), &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let b = generate(&params(), &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_density() {
        let mut p = params();
        p.density = 1.0;
        let problem = generate(&p, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(problem.topology().edges, 45);
        assert_eq!(problem.topology().components, 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut p = params();
        p.density = 1.5;
        assert!(matches!(
            generate(&p, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(DcopError::InvalidProbability { name: "density", .. })
        ));

        let mut p = params();
        p.cost_range = (5, 5);
        assert!(generate(&p, &mut ChaCha8Rng::seed_from_u64(0)).is_err());
    }
}
