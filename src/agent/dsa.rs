//! DSA: Distributed Stochastic Algorithm.
//!
//! One phase per round:
//!
//! 1. Read neighbor values from the mailbox (every neighbor must have sent one).
//! 2. Find the cheapest value other than the current one. Ties go to the value
//!    that comes first in domain order.
//! 3. Replace the current value if the variant's cost test passes *and* a
//!    uniform draw is below `p`.
//! 4. Broadcast the (possibly unchanged) value.
//!
//! | Variant | Cost test |
//! |---------|-----------|
//! | `C` (reference) | `candidate <= current` |
//! | `A` | `candidate < current` |

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{read_values, Agent, AgentCore};
use crate::error::{DcopError, Result};
use crate::problem::NeighborValues;
use crate::protocol::Mailer;
use crate::Value;

/// DSA replacement rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DsaVariant {
    /// Move on strict improvement only
    A,
    /// Move on improvement or tie
    C,
}

impl DsaVariant {
    /// Check whether a candidate cost passes this variant's test.
    pub fn accepts(self, candidate_cost: f64, current_cost: f64) -> bool {
        match self {
            Self::A => candidate_cost < current_cost,
            Self::C => candidate_cost <= current_cost,
        }
    }
}

impl std::fmt::Display for DsaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::C => write!(f, "C"),
        }
    }
}

impl std::str::FromStr for DsaVariant {
    type Err = DcopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "a" => Ok(Self::A),
            "c" => Ok(Self::C),
            _ => Err(DcopError::UnsupportedDsaVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for DsaVariant {
    type Error = DcopError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DsaVariant> for String {
    fn from(variant: DsaVariant) -> Self {
        variant.to_string()
    }
}

/// Agent running DSA.
#[derive(Debug)]
pub struct DsaAgent {
    core: AgentCore,
    variant: DsaVariant,
    p: f64,
    rng: StdRng,
}

impl DsaAgent {
    /// Create a DSA agent. `p` must lie in `[0, 1]`.
    pub fn new(core: AgentCore, variant: DsaVariant, p: f64, rng: &mut impl Rng) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(DcopError::InvalidProbability { name: "dsa.p", value: p });
        }

        Ok(Self {
            core,
            variant,
            p,
            rng: StdRng::seed_from_u64(rng.gen()),
        })
    }

    /// Replacement rule
    pub fn variant(&self) -> DsaVariant {
        self.variant
    }

    /// Replacement probability
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Cheapest value other than the current one, with its cost.
    ///
    /// `None` when the domain has a single value.
    pub fn best_alternative(&self, neighbor_values: &NeighborValues) -> Result<Option<(Value, f64)>> {
        let mut best: Option<(Value, f64)> = None;

        for &value in self.core.domain().iter() {
            if value == self.core.value() {
                continue;
            }
            let cost = self.core.cost(value, neighbor_values)?;
            if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                best = Some((value, cost));
            }
        }

        Ok(best)
    }

    /// Apply the replacement rule; returns the value to hold next.
    fn decide(&mut self, neighbor_values: &NeighborValues) -> Result<Value> {
        let current = self.core.value();
        let current_cost = self.core.cost(current, neighbor_values)?;

        let Some((candidate, candidate_cost)) = self.best_alternative(neighbor_values)? else {
            return Ok(current);
        };

        if self.variant.accepts(candidate_cost, current_cost) && self.rng.gen::<f64>() < self.p {
            tracing::trace!(
                agent = self.core.id(),
                current_cost,
                candidate_cost,
                "DSA replacement"
            );
            return Ok(candidate);
        }

        Ok(current)
    }
}

impl Agent for DsaAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn iteration(&mut self, mailer: &mut Mailer) -> Result<()> {
        let neighbor_values = read_values(&self.core, mailer.messages_for(self.core.id()))?;

        let next = self.decide(&neighbor_values)?;
        self.core.set_value(next)?;

        self.core.broadcast_value(mailer);
        Ok(())
    }
}
