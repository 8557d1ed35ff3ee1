//! # DCOP Simulator - Round-Synchronous Agent Coordination
//!
//! Simulates a Distributed Constraint Optimization Problem: autonomous agents,
//! each owning one variable, converge on a low-cost assignment by exchanging
//! messages in lock-step rounds. No agent ever reads another agent's state.
//!
//! ## Features
//!
//! - **Synchronous message bus**: messages sent in round k are readable in round k+1
//! - **DSA**: single-phase stochastic best response (variants A and C)
//! - **MGM-2**: five-phase protocol with offers, gain broadcast and paired moves
//! - **Problem generation**: random constraint graphs with density/toughness knobs
//! - **Experiments**: multi-seed sweeps over problem toughness
//!
//! ## Architecture
//!
//! ```text
//!  Problem ──> ConstraintModel (per agent) ──> Agent (DSA | MGM-2)
//!                                                   │
//!   Simulation driver, once per round:              │
//!     Mailer::advance_round()                       │
//!     Agent::iteration(&mut Mailer)  <──────────────┘
//!     total cost = Σ agent.cost(value, neighbor values)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dcop::{Config, Simulation};
//! use dcop::problem::{generate, GeneratorParams};
//! use rand::SeedableRng;
//!
//! let config = Config::default();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(config.constraints.seed);
//! let problem = generate(
//!     &GeneratorParams::from_config(&config.environment, &config.constraints),
//!     &mut rng,
//! )?;
//!
//! let mut sim = Simulation::from_problem(&problem, &config, &mut rng)?;
//! let report = sim.run(config.rounds())?;
//! println!("final cost: {}", report.final_cost);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Messages and the synchronous mailer
//! - [`agent`]: Agent base, DSA and MGM-2
//! - [`problem`]: Cost matrices, constraint models, generation
//! - [`simulation`]: Round driver, reports and experiments
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod agent;
pub mod config;
pub mod error;
pub mod problem;
pub mod protocol;
pub mod simulation;

// Re-exports for convenience
pub use agent::{Agent, AgentCore, DsaAgent, DsaVariant, Mgm2Agent};
pub use config::{AlgorithmKind, Config};
pub use error::{DcopError, Result};
pub use problem::{ConstraintModel, CostMatrix, NeighborValues, Problem};
pub use protocol::{Mailer, Message, Payload};
pub use simulation::{RunReport, Simulation};

/// Agent identifier; agents of a problem are numbered `0..n`.
pub type AgentId = usize;

/// Domain value; domains are `0..D`.
pub type Value = usize;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
