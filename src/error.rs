//! DCOP simulator error types.
//!
//! # Error Classification
//!
//! Errors fall into three groups:
//!
//! | Group | Variants | Raised |
//! |-------|----------|--------|
//! | Configuration | `Config`, `UnsupportedDsaVariant`, `InvalidProbability`, `MatrixShape`, `InvalidRoundCount` | At construction, before any round runs |
//! | Protocol | `MissingNeighborValue`, `GainCountMismatch`, `MissingResponse`, `MissingChangeFlag`, `UnexpectedMessage`, `UnexpectedSender` | During a round, by the agent that observed it |
//! | Domain | `ValueOutOfDomain`, `UnknownAgent` | On cost lookups |
//!
//! There is no retry policy. A protocol violation means the driver advanced
//! the mailer at the wrong point (or ran a partial MGM-2 cycle) and the run
//! is aborted.

use thiserror::Error;

use crate::protocol::Tag;
use crate::AgentId;

/// DCOP simulator errors.
#[derive(Error, Debug)]
pub enum DcopError {
    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),

    /// DSA variant string not in the supported set.
    #[error("Unsupported DSA variant: {0}")]
    UnsupportedDsaVariant(String),

    /// Probability parameter outside `[0, 1]`.
    #[error("Invalid probability for {name}: {value}")]
    InvalidProbability {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Cost matrix does not match the declared domain.
    #[error("Cost matrix for edge {owner}->{neighbor} is {rows}x{cols}, expected {expected}x{expected}")]
    MatrixShape {
        /// Agent owning the constraint.
        owner: AgentId,
        /// Neighbor on the other side of the edge.
        neighbor: AgentId,
        /// Actual row count.
        rows: usize,
        /// Actual column count.
        cols: usize,
        /// Domain size.
        expected: usize,
    },

    /// Round count is not a whole number of algorithm cycles.
    #[error("Round count {rounds} is not a multiple of the cycle length {cycle_len}")]
    InvalidRoundCount {
        /// Requested rounds.
        rounds: usize,
        /// Rounds per cycle.
        cycle_len: usize,
    },

    /// A declared neighbor's value was not available.
    #[error("Agent {agent} is missing the value of neighbor {neighbor}")]
    MissingNeighborValue {
        /// Agent computing the cost.
        agent: AgentId,
        /// Neighbor with no value.
        neighbor: AgentId,
    },

    /// MGM-2 phase 4 received the wrong number of gain broadcasts.
    #[error("Agent {agent} expected {expected} gain messages, received {received}")]
    GainCountMismatch {
        /// Receiving agent.
        agent: AgentId,
        /// Expected count.
        expected: usize,
        /// Received count.
        received: usize,
    },

    /// An agent that sent an offer got no response from that neighbor.
    #[error("Agent {agent} received no response to its offer to {partner}")]
    MissingResponse {
        /// Bidder.
        agent: AgentId,
        /// Neighbor the offer was sent to.
        partner: AgentId,
    },

    /// A partnered agent got no change flag from its partner.
    #[error("Agent {agent} received no change flag from partner {partner}")]
    MissingChangeFlag {
        /// Receiving agent.
        agent: AgentId,
        /// Partner.
        partner: AgentId,
    },

    /// A message arrived in a phase that does not accept it.
    #[error("Agent {agent} expected {expected} but got {found} from {sender}")]
    UnexpectedMessage {
        /// Receiving agent.
        agent: AgentId,
        /// Sender of the message.
        sender: AgentId,
        /// Tag the current phase accepts.
        expected: Tag,
        /// Tag that arrived.
        found: Tag,
    },

    /// A message came from an agent the current phase does not expect to hear from.
    #[error("Agent {agent} got an unsolicited {tag} from {sender}")]
    UnexpectedSender {
        /// Receiving agent.
        agent: AgentId,
        /// Sender of the message.
        sender: AgentId,
        /// Tag of the message.
        tag: Tag,
    },

    /// Value outside the agent's declared domain.
    #[error("Value {value} is outside the domain of agent {agent}")]
    ValueOutOfDomain {
        /// Agent whose domain was violated.
        agent: AgentId,
        /// Offending value.
        value: usize,
    },

    /// Agent id not present in the problem.
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DcopError {
    /// True for errors raised mid-run by the message protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingNeighborValue { .. }
                | Self::GainCountMismatch { .. }
                | Self::MissingResponse { .. }
                | Self::MissingChangeFlag { .. }
                | Self::UnexpectedMessage { .. }
                | Self::UnexpectedSender { .. }
        )
    }
}

/// Result type alias for DCOP operations
pub type Result<T> = std::result::Result<T, DcopError>;

impl From<toml::de::Error> for DcopError {
    fn from(err: toml::de::Error) -> Self {
        DcopError::Config(format!("Failed to parse config: {err}"))
    }
}
