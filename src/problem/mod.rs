//! Problem data: cost matrices, per-agent constraint models and the
//! constraint graph.
//!
//! Every edge `(i, j)` of the constraint graph carries a D×D matrix `C` where
//! `C[v_i][v_j]` is the cost agent `i` pays when `i = v_i` and `j = v_j`.
//! Agent `i` stores `C`, agent `j` stores `Cᵀ`, so both sides index by
//! "my value, their value":
//!
//! ```text
//! C_i[j][a][b] == C_j[i][b][a]    for all a, b
//! ```
//!
//! Problems are generated once before a run (see [`generator`]) and are
//! immutable afterwards.

pub mod generator;

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array2;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::error::{DcopError, Result};
use crate::{AgentId, Value};

pub use generator::{generate, GeneratorParams};

/// Values of an agent's neighbors, keyed by neighbor id.
///
/// Ordered so that iteration (and anything seeded from it) is reproducible.
pub type NeighborValues = BTreeMap<AgentId, Value>;

/// Square cost table for one side of a constraint edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostMatrix(Array2<f64>);

impl CostMatrix {
    /// Wrap an existing array.
    pub fn new(costs: Array2<f64>) -> Self {
        Self(costs)
    }

    /// Build from row vectors. Rows must all have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(DcopError::Config("Cost matrix rows have different lengths".to_string()));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows.len(), cols), flat)
            .map(Self)
            .map_err(|e| DcopError::Config(format!("Invalid cost matrix: {e}")))
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Cost for `(mine, theirs)`, `None` if either index is out of range.
    pub fn get(&self, mine: Value, theirs: Value) -> Option<f64> {
        self.0.get((mine, theirs)).copied()
    }

    /// The matrix as seen from the other side of the edge.
    pub fn transposed(&self) -> Self {
        Self(self.0.t().to_owned())
    }

    /// Underlying array.
    pub fn as_array(&self) -> &Array2<f64> {
        &self.0
    }

    fn check_shape(&self, owner: AgentId, neighbor: AgentId, domain_size: usize) -> Result<()> {
        let (rows, cols) = self.shape();
        if rows != domain_size || cols != domain_size {
            return Err(DcopError::MatrixShape {
                owner,
                neighbor,
                rows,
                cols,
                expected: domain_size,
            });
        }
        Ok(())
    }
}

/// One agent's view of the constraint graph: neighbor id → cost matrix.
///
/// The key set is the agent's neighbor set and never changes during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintModel {
    owner: AgentId,
    edges: BTreeMap<AgentId, CostMatrix>,
}

impl ConstraintModel {
    /// Build a model, checking every matrix is `domain_size × domain_size`.
    pub fn new(
        owner: AgentId,
        domain_size: usize,
        edges: impl IntoIterator<Item = (AgentId, CostMatrix)>,
    ) -> Result<Self> {
        let mut model = BTreeMap::new();
        for (neighbor, costs) in edges {
            if neighbor == owner {
                return Err(DcopError::Config(format!("Agent {owner} is constrained with itself")));
            }
            costs.check_shape(owner, neighbor, domain_size)?;
            model.insert(neighbor, costs);
        }
        Ok(Self { owner, edges: model })
    }

    /// Agent this model belongs to.
    pub fn owner(&self) -> AgentId {
        self.owner
    }

    /// Neighbor ids, ascending.
    pub fn neighbors(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.edges.keys().copied()
    }

    /// Number of neighbors.
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Check whether `agent` is a neighbor.
    pub fn is_neighbor(&self, agent: AgentId) -> bool {
        self.edges.contains_key(&agent)
    }

    /// Matrix for the edge to `neighbor`.
    pub fn matrix(&self, neighbor: AgentId) -> Option<&CostMatrix> {
        self.edges.get(&neighbor)
    }

    /// Cost of a single edge for `(mine, theirs)`.
    pub fn edge_cost(&self, neighbor: AgentId, mine: Value, theirs: Value) -> Result<f64> {
        let costs = self.matrix(neighbor).ok_or(DcopError::UnknownAgent(neighbor))?;
        costs.get(mine, theirs).ok_or_else(|| {
            if mine >= costs.shape().0 {
                DcopError::ValueOutOfDomain {
                    agent: self.owner,
                    value: mine,
                }
            } else {
                DcopError::ValueOutOfDomain {
                    agent: neighbor,
                    value: theirs,
                }
            }
        })
    }

    /// `Σ_{n ∈ neighbors} C[n][value][neighbor_values[n]]`.
    ///
    /// Every neighbor must be present in `neighbor_values`; extra entries are
    /// ignored.
    pub fn cost(&self, value: Value, neighbor_values: &NeighborValues) -> Result<f64> {
        let mut total = 0.0;
        for neighbor in self.neighbors() {
            let theirs = neighbor_values
                .get(&neighbor)
                .copied()
                .ok_or(DcopError::MissingNeighborValue {
                    agent: self.owner,
                    neighbor,
                })?;
            total += self.edge_cost(neighbor, value, theirs)?;
        }
        Ok(total)
    }
}

/// A constraint edge as stored in a [`Problem`]: `costs[a_value][b_value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConstraint {
    /// Lower-id endpoint.
    pub a: AgentId,
    /// Higher-id endpoint.
    pub b: AgentId,
    /// Costs from `a`'s point of view.
    pub costs: CostMatrix,
}

/// Shape of the constraint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Edge count
    pub edges: usize,
    /// Connected components
    pub components: usize,
    /// Agents with no neighbors
    pub isolated: usize,
    /// Highest degree
    pub max_degree: usize,
}

/// A complete DCOP instance: agent count, shared domain size and edges.
///
/// Deserialization rebuilds the problem through [`Problem::add_constraint`],
/// so a loaded problem holds the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProblemData")]
pub struct Problem {
    agents: usize,
    domain_size: usize,
    constraints: Vec<EdgeConstraint>,
}

/// Unchecked wire form of a [`Problem`].
#[derive(Deserialize)]
struct ProblemData {
    agents: usize,
    domain_size: usize,
    constraints: Vec<EdgeConstraint>,
}

impl TryFrom<ProblemData> for Problem {
    type Error = DcopError;

    fn try_from(data: ProblemData) -> Result<Self> {
        let mut problem = Self::new(data.agents, data.domain_size)?;
        for edge in data.constraints {
            problem.add_constraint(edge.a, edge.b, edge.costs)?;
        }
        Ok(problem)
    }
}

impl Problem {
    /// Empty problem (no edges).
    pub fn new(agents: usize, domain_size: usize) -> Result<Self> {
        if domain_size == 0 {
            return Err(DcopError::Config("Domain size must be at least 1".to_string()));
        }
        Ok(Self {
            agents,
            domain_size,
            constraints: Vec::new(),
        })
    }

    /// Add an edge between `a` and `b` with costs indexed `[a_value][b_value]`.
    pub fn add_constraint(&mut self, a: AgentId, b: AgentId, costs: CostMatrix) -> Result<()> {
        if a == b {
            return Err(DcopError::Config(format!("Agent {a} is constrained with itself")));
        }
        for agent in [a, b] {
            if agent >= self.agents {
                return Err(DcopError::UnknownAgent(agent));
            }
        }
        if self.has_edge(a, b) {
            return Err(DcopError::Config(format!("Duplicate constraint between {a} and {b}")));
        }
        costs.check_shape(a, b, self.domain_size)?;

        // Normalise so `a` is always the lower id
        let edge = if a < b {
            EdgeConstraint { a, b, costs }
        } else {
            EdgeConstraint {
                a: b,
                b: a,
                costs: costs.transposed(),
            }
        };
        self.constraints.push(edge);
        Ok(())
    }

    /// Number of agents.
    pub fn agents(&self) -> usize {
        self.agents
    }

    /// Domain size shared by all agents.
    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    /// The shared domain `0..D`.
    pub fn domain(&self) -> Vec<Value> {
        (0..self.domain_size).collect()
    }

    /// Edges of the constraint graph.
    pub fn constraints(&self) -> &[EdgeConstraint] {
        &self.constraints
    }

    /// Check whether an edge exists between `a` and `b`.
    pub fn has_edge(&self, a: AgentId, b: AgentId) -> bool {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        self.constraints.iter().any(|e| e.a == lo && e.b == hi)
    }

    /// Split the edges into one [`ConstraintModel`] per agent.
    ///
    /// The lower-id endpoint stores the matrix, the higher-id endpoint its
    /// transpose.
    pub fn constraint_models(&self) -> Result<Vec<ConstraintModel>> {
        let mut per_agent: Vec<Vec<(AgentId, CostMatrix)>> = vec![Vec::new(); self.agents];
        for edge in &self.constraints {
            per_agent
                .get_mut(edge.a)
                .ok_or(DcopError::UnknownAgent(edge.a))?
                .push((edge.b, edge.costs.clone()));
            per_agent
                .get_mut(edge.b)
                .ok_or(DcopError::UnknownAgent(edge.b))?
                .push((edge.a, edge.costs.transposed()));
        }

        per_agent
            .into_iter()
            .enumerate()
            .map(|(owner, edges)| ConstraintModel::new(owner, self.domain_size, edges))
            .collect()
    }

    /// The constraint graph; node weights are agent ids.
    pub fn graph(&self) -> UnGraph<AgentId, ()> {
        let mut graph = UnGraph::with_capacity(self.agents, self.constraints.len());
        for agent in 0..self.agents {
            graph.add_node(agent);
        }
        for edge in &self.constraints {
            graph.add_edge(NodeIndex::new(edge.a), NodeIndex::new(edge.b), ());
        }
        graph
    }

    /// Summary statistics of the constraint graph.
    pub fn topology(&self) -> Topology {
        let graph = self.graph();
        let degrees: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors(n).count())
            .collect();

        Topology {
            edges: graph.edge_count(),
            components: petgraph::algo::connected_components(&graph),
            isolated: degrees.iter().filter(|&&d| d == 0).count(),
            max_degree: degrees.iter().copied().max().unwrap_or(0),
        }
    }

    /// Load a problem from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the problem as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
