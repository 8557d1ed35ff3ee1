//! Protocol messages exchanged between agents.
//!
//! Every message is an immutable `{sender, recipient, payload}` triple. The
//! payload is a sum type; its [`Tag`] is derived from the variant so the two
//! can never disagree.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::problem::{ConstraintModel, NeighborValues};
use crate::{AgentId, Value};

/// Message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    /// Current value broadcast
    Value,
    /// MGM-2 joint move bid
    Offer,
    /// MGM-2 answer to a bid
    Response,
    /// MGM-2 gain broadcast
    Gain,
    /// MGM-2 partner go/no-go
    ChangeFlag,
}

impl Tag {
    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Offer => "offer",
            Self::Response => "response",
            Self::Gain => "gain",
            Self::ChangeFlag => "change-flag",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A bid for a coordinated move, carrying everything the responder needs to
/// evaluate the bidder's side of the pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    /// Bidder's view of its neighbors' values
    pub neighbor_values: NeighborValues,
    /// Bidder's constraints
    pub constraints: Arc<ConstraintModel>,
    /// Bidder's current value
    pub value: Value,
    /// Bidder's domain
    pub domain: Arc<[Value]>,
}

/// Answer to an [`Offer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// Pair up: the joint move gains `gain` and the bidder should move to `value`
    Accept {
        /// Joint cost reduction
        gain: f64,
        /// Bidder's value in the best joint assignment
        value: Value,
    },
    /// Decline
    Reject,
}

impl Response {
    /// Check whether this is an acceptance.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

/// Message payload variants
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sender's current value
    Value(Value),
    /// Joint move bid
    Offer(Offer),
    /// Bid answer
    Response(Response),
    /// Sender's best gain this cycle
    Gain(f64),
    /// Whether the sender won its neighborhood
    ChangeFlag(bool),
}

impl Payload {
    /// Tag for this payload.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Value(_) => Tag::Value,
            Self::Offer(_) => Tag::Offer,
            Self::Response(_) => Tag::Response,
            Self::Gain(_) => Tag::Gain,
            Self::ChangeFlag(_) => Tag::ChangeFlag,
        }
    }
}

/// Protocol message envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Sending agent
    pub sender: AgentId,
    /// Receiving agent
    pub recipient: AgentId,
    /// Content
    pub payload: Payload,
}

impl Message {
    /// Create a message
    pub fn new(sender: AgentId, recipient: AgentId, payload: Payload) -> Self {
        Self {
            sender,
            recipient,
            payload,
        }
    }

    /// Tag of the payload.
    pub fn tag(&self) -> Tag {
        self.payload.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_follows_payload() {
        assert_eq!(Message::new(0, 1, Payload::Value(3)).tag(), Tag::Value);
        assert_eq!(Message::new(0, 1, Payload::Gain(1.5)).tag(), Tag::Gain);
        assert_eq!(
            Message::new(0, 1, Payload::Response(Response::Reject)).tag(),
            Tag::Response
        );
        assert_eq!(Message::new(0, 1, Payload::ChangeFlag(true)).tag(), Tag::ChangeFlag);
    }

    #[test]
    fn test_response_accept() {
        assert!(Response::Accept { gain: 2.0, value: 1 }.is_accept());
        assert!(!Response::Reject.is_accept());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::ChangeFlag.to_string(), "change-flag");
        assert_eq!(Tag::Offer.to_string(), "offer");
    }
}
