//! Agents: owners of one problem variable each.
//!
//! Every agent wraps an [`AgentCore`] (id, domain, constraints, current
//! value) and implements [`Agent::iteration`], the single entry point the
//! driver calls once per agent per round.
//!
//! | Agent | Rounds per cycle | Decision rule |
//! |-------|------------------|---------------|
//! | [`DsaAgent`] | 1 | stochastic best-response |
//! | [`Mgm2Agent`] | 5 | gain-maximal unilateral or coordinated pair move |

pub mod dsa;
pub mod mgm2;

use std::fmt::Debug;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DcopError, Result};
use crate::problem::{ConstraintModel, NeighborValues};
use crate::protocol::{Mailer, Message, Payload, Tag};
use crate::{AgentId, Value};

pub use dsa::{DsaAgent, DsaVariant};
pub use mgm2::{Mgm2Agent, Phase};

/// State shared by every agent algorithm.
#[derive(Debug, Clone)]
pub struct AgentCore {
    id: AgentId,
    domain: Arc<[Value]>,
    constraints: Arc<ConstraintModel>,
    value: Value,
}

impl AgentCore {
    /// Create an agent core with a value drawn uniformly from `domain`.
    pub fn new(constraints: ConstraintModel, domain: Vec<Value>, rng: &mut impl Rng) -> Result<Self> {
        let value = domain
            .choose(rng)
            .copied()
            .ok_or_else(|| DcopError::Config(format!("Agent {} has an empty domain", constraints.owner())))?;
        Self::with_value(constraints, domain, value)
    }

    /// Create an agent core starting from a fixed value.
    pub fn with_value(constraints: ConstraintModel, domain: Vec<Value>, value: Value) -> Result<Self> {
        let id = constraints.owner();

        for neighbor in constraints.neighbors() {
            if let Some(costs) = constraints.matrix(neighbor) {
                let (rows, cols) = costs.shape();
                if domain.iter().any(|&v| v >= rows) {
                    return Err(DcopError::MatrixShape {
                        owner: id,
                        neighbor,
                        rows,
                        cols,
                        expected: domain.len(),
                    });
                }
            }
        }

        let core = Self {
            id,
            domain: domain.into(),
            constraints: Arc::new(constraints),
            value,
        };
        core.check_domain(value)?;
        Ok(core)
    }

    /// Agent id
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Ordered domain
    pub fn domain(&self) -> &Arc<[Value]> {
        &self.domain
    }

    /// Constraint model
    pub fn constraints(&self) -> &Arc<ConstraintModel> {
        &self.constraints
    }

    /// Current value
    pub fn value(&self) -> Value {
        self.value
    }

    /// Neighbor ids, ascending.
    pub fn neighbors(&self) -> Vec<AgentId> {
        self.constraints.neighbors().collect()
    }

    /// Number of neighbors.
    pub fn degree(&self) -> usize {
        self.constraints.degree()
    }

    /// Local cost of taking `value` given the neighbors' values.
    ///
    /// Fails if `value` is outside the domain or a neighbor is missing from
    /// `neighbor_values`. Never mutates state.
    pub fn cost(&self, value: Value, neighbor_values: &NeighborValues) -> Result<f64> {
        self.check_domain(value)?;
        self.constraints.cost(value, neighbor_values)
    }

    /// Send the current value to every neighbor.
    pub fn broadcast_value(&self, mailer: &mut Mailer) {
        for neighbor in self.constraints.neighbors() {
            mailer.deliver(self.id, neighbor, Payload::Value(self.value));
        }
    }

    pub(crate) fn set_value(&mut self, value: Value) -> Result<()> {
        self.check_domain(value)?;
        if value != self.value {
            tracing::debug!(agent = self.id, from = self.value, to = value, "Value changed");
        }
        self.value = value;
        Ok(())
    }

    fn check_domain(&self, value: Value) -> Result<()> {
        if self.domain.contains(&value) {
            Ok(())
        } else {
            Err(DcopError::ValueOutOfDomain {
                agent: self.id,
                value,
            })
        }
    }
}

/// An agent taking part in the round-synchronous protocol.
pub trait Agent: Debug + Send {
    /// Shared state
    fn core(&self) -> &AgentCore;

    /// Run this agent's step for the current round: read its messages from
    /// `mailer`, update internal state and queue outgoing messages.
    fn iteration(&mut self, mailer: &mut Mailer) -> Result<()>;

    /// Rounds in one algorithm cycle.
    fn rounds_per_cycle(&self) -> usize {
        1
    }

    /// Agent id
    fn id(&self) -> AgentId {
        self.core().id()
    }

    /// Current value
    fn value(&self) -> Value {
        self.core().value()
    }

    /// Local cost of taking `value` given the neighbors' values.
    fn cost(&self, value: Value, neighbor_values: &NeighborValues) -> Result<f64> {
        self.core().cost(value, neighbor_values)
    }

    /// Send the current value to every neighbor.
    fn broadcast_value(&self, mailer: &mut Mailer) {
        self.core().broadcast_value(mailer);
    }
}

/// Collect value messages into a neighbor-value map.
///
/// Any other tag in `inbox`, or a value from a non-neighbor, is a protocol
/// violation.
pub(crate) fn read_values(core: &AgentCore, inbox: &[Message]) -> Result<NeighborValues> {
    let agent = core.id();
    inbox
        .iter()
        .map(|msg| match msg.payload {
            Payload::Value(value) if core.constraints().is_neighbor(msg.sender) => Ok((msg.sender, value)),
            Payload::Value(_) => Err(DcopError::UnexpectedSender {
                agent,
                sender: msg.sender,
                tag: Tag::Value,
            }),
            ref other => Err(DcopError::UnexpectedMessage {
                agent,
                sender: msg.sender,
                expected: Tag::Value,
                found: other.tag(),
            }),
        })
        .collect()
}
