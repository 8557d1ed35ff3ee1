//! MGM-2: Maximum Gain Message with 2-coordinated moves.
//!
//! Each cycle spans five rounds. An agent's progress through a cycle is a
//! tagged state; each round applies one transition
//! `(state, inbox) → (next state, outgoing messages)`.
//!
//! ```text
//!   ┌──────────────┐  values   ┌───────────────┐  offers   ┌──────────┐
//!   │ CommitOffers │ ────────> │ RespondOffers │ ────────> │ SendGain │
//!   └──────────────┘           └───────────────┘           └──────────┘
//!          ^                                                  │ responses
//!          │ change flag  ┌─────────────┐  gains  ┌─────────────┐
//!          └───────────── │ UpdateValue │ <────── │ FindMaxGain │ <┘
//!                         └─────────────┘         └─────────────┘
//! ```
//!
//! | Phase | Reads | Sends |
//! |-------|-------|-------|
//! | 1 CommitOffers | neighbor values | offer to one random neighbor (with `offer_probability`) |
//! | 2 RespondOffers | offers | accept to the best bidder, reject to the rest (bidders reject all) |
//! | 3 SendGain | response to own offer | gain to every neighbor but the partner |
//! | 4 FindMaxGain | neighbor gains | change flag to the partner |
//! | 5 UpdateValue | partner's change flag | value to every neighbor |
//!
//! Gain ties in phase 4 go to the higher agent id. A partnered pair moves
//! only if both sides won their neighborhoods.
//!
//! The negotiation scratch state (neighbor snapshot, offer target, partner,
//! gain, candidate value, change flag) lives in a [`Negotiation`] built in
//! phase 1 and carried through the cycle's states, so nothing survives into
//! the next cycle.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{read_values, Agent, AgentCore};
use crate::error::{DcopError, Result};
use crate::problem::NeighborValues;
use crate::protocol::{Mailer, Message, Offer, Payload, Response, Tag};
use crate::{AgentId, Value};

/// Rounds in one MGM-2 cycle
pub const ROUNDS_PER_CYCLE: usize = 5;

/// MGM-2 phases, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Read values, pick a unilateral move, maybe bid
    CommitOffers,
    /// Evaluate received bids
    RespondOffers,
    /// Settle partner, broadcast gain
    SendGain,
    /// Compare gains with neighbors
    FindMaxGain,
    /// Apply the move, broadcast value
    UpdateValue,
}

impl Phase {
    /// 1-based position in the cycle.
    pub fn number(self) -> usize {
        match self {
            Self::CommitOffers => 1,
            Self::RespondOffers => 2,
            Self::SendGain => 3,
            Self::FindMaxGain => 4,
            Self::UpdateValue => 5,
        }
    }

    /// Phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Self::CommitOffers => Self::RespondOffers,
            Self::RespondOffers => Self::SendGain,
            Self::SendGain => Self::FindMaxGain,
            Self::FindMaxGain => Self::UpdateValue,
            Self::UpdateValue => Self::CommitOffers,
        }
    }
}

/// Per-cycle negotiation context.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    /// Neighbor values read in phase 1
    pub neighbor_values: NeighborValues,
    /// Neighbor this agent bid to (committed iff `Some`)
    pub offered_to: Option<AgentId>,
    /// Neighbor paired with for a joint move
    pub partner: Option<AgentId>,
    /// Best unilateral gain, or the pair gain once partnered
    pub gain: f64,
    /// Value to adopt if the move goes ahead
    pub new_value: Value,
    /// Whether this agent won its neighborhood
    pub change_value: bool,
}

impl Negotiation {
    /// Check whether this agent bid in phase 1.
    pub fn is_committed(&self) -> bool {
        self.offered_to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CycleState {
    CommitOffers,
    RespondOffers(Negotiation),
    SendGain(Negotiation),
    FindMaxGain(Negotiation),
    UpdateValue(Negotiation),
}

impl CycleState {
    fn phase(&self) -> Phase {
        match self {
            Self::CommitOffers => Phase::CommitOffers,
            Self::RespondOffers(_) => Phase::RespondOffers,
            Self::SendGain(_) => Phase::SendGain,
            Self::FindMaxGain(_) => Phase::FindMaxGain,
            Self::UpdateValue(_) => Phase::UpdateValue,
        }
    }

    fn negotiation(&self) -> Option<&Negotiation> {
        match self {
            Self::CommitOffers => None,
            Self::RespondOffers(ctx)
            | Self::SendGain(ctx)
            | Self::FindMaxGain(ctx)
            | Self::UpdateValue(ctx) => Some(ctx),
        }
    }
}

/// Best joint assignment found for one offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMove {
    /// Responder's value
    pub own_value: Value,
    /// Bidder's value
    pub partner_value: Value,
    /// Pair cost reduction
    pub gain: f64,
}

type Outgoing = Vec<(AgentId, Payload)>;

/// Agent running MGM-2.
#[derive(Debug)]
pub struct Mgm2Agent {
    core: AgentCore,
    offer_probability: f64,
    rng: StdRng,
    state: CycleState,
    last_cost: Option<f64>,
}

impl Mgm2Agent {
    /// Create an MGM-2 agent. `offer_probability` must lie in `[0, 1]`.
    pub fn new(core: AgentCore, offer_probability: f64, rng: &mut impl Rng) -> Result<Self> {
        if !(0.0..=1.0).contains(&offer_probability) {
            return Err(DcopError::InvalidProbability {
                name: "mgm2.offer_probability",
                value: offer_probability,
            });
        }

        Ok(Self {
            core,
            offer_probability,
            rng: StdRng::seed_from_u64(rng.gen()),
            state: CycleState::CommitOffers,
            last_cost: None,
        })
    }

    /// Phase the next call to `iteration` will run.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Negotiation context of the cycle in progress, if any.
    pub fn negotiation(&self) -> Option<&Negotiation> {
        self.state.negotiation()
    }

    /// Local cost measured at the last phase 1.
    pub fn last_cost(&self) -> Option<f64> {
        self.last_cost
    }

    /// Best joint assignment for the pair `(self, sender)` described by `offer`.
    ///
    /// Pair cost is `own + partner - shared`: the shared edge appears in both
    /// local costs and is counted once. Only strict improvements replace the
    /// current assignment, so the gain is never negative.
    pub fn best_joint_move(
        &self,
        sender: AgentId,
        offer: &Offer,
        neighbor_values: &NeighborValues,
    ) -> Result<JointMove> {
        let mut own_view = neighbor_values.clone();
        let mut partner_view = offer.neighbor_values.clone();

        let current = self.joint_cost(
            sender,
            offer,
            (&mut own_view, &mut partner_view),
            self.core.value(),
            offer.value,
        )?;

        let mut best_cost = current;
        let mut best = (self.core.value(), offer.value);

        for &own_value in self.core.domain().iter() {
            for &partner_value in offer.domain.iter() {
                let cost = self.joint_cost(
                    sender,
                    offer,
                    (&mut own_view, &mut partner_view),
                    own_value,
                    partner_value,
                )?;
                if cost < best_cost {
                    best_cost = cost;
                    best = (own_value, partner_value);
                }
            }
        }

        Ok(JointMove {
            own_value: best.0,
            partner_value: best.1,
            gain: current - best_cost,
        })
    }

    fn joint_cost(
        &self,
        sender: AgentId,
        offer: &Offer,
        (own_view, partner_view): (&mut NeighborValues, &mut NeighborValues),
        own_value: Value,
        partner_value: Value,
    ) -> Result<f64> {
        own_view.insert(sender, partner_value);
        partner_view.insert(self.core.id(), own_value);

        let own = self.core.cost(own_value, own_view)?;
        let partner = offer.constraints.cost(partner_value, partner_view)?;
        let shared = self
            .core
            .constraints()
            .edge_cost(sender, own_value, partner_value)?;

        Ok(own + partner - shared)
    }

    /// Value with the largest unilateral gain (first in domain order on ties).
    fn best_unilateral(&self, neighbor_values: &NeighborValues, current_cost: f64) -> Result<(Value, f64)> {
        let mut best = (self.core.value(), 0.0);
        let mut found = false;

        for &value in self.core.domain().iter() {
            let gain = current_cost - self.core.cost(value, neighbor_values)?;
            if !found || gain > best.1 {
                best = (value, gain);
                found = true;
            }
        }

        Ok(best)
    }

    fn transition(&mut self, state: CycleState, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        match state {
            CycleState::CommitOffers => self.commit_offers(inbox),
            CycleState::RespondOffers(ctx) => self.respond_offers(ctx, inbox),
            CycleState::SendGain(ctx) => self.send_gain(ctx, inbox),
            CycleState::FindMaxGain(ctx) => self.find_max_gain(ctx, inbox),
            CycleState::UpdateValue(ctx) => self.update_value(ctx, inbox),
        }
    }

    // Phase 1
    fn commit_offers(&mut self, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        let id = self.core.id();
        let neighbor_values = read_values(&self.core, inbox)?;

        let current_cost = self.core.cost(self.core.value(), &neighbor_values)?;
        self.last_cost = Some(current_cost);

        let (new_value, gain) = self.best_unilateral(&neighbor_values, current_cost)?;

        let neighbors = self.core.neighbors();
        let offered_to = if !neighbors.is_empty() && self.rng.gen::<f64>() < self.offer_probability {
            neighbors.choose(&mut self.rng).copied()
        } else {
            None
        };

        let mut outgoing = Vec::new();
        if let Some(target) = offered_to {
            tracing::debug!(agent = id, to = target, "Offer sent");
            outgoing.push((
                target,
                Payload::Offer(Offer {
                    neighbor_values: neighbor_values.clone(),
                    constraints: Arc::clone(self.core.constraints()),
                    value: self.core.value(),
                    domain: Arc::clone(self.core.domain()),
                }),
            ));
        }

        let ctx = Negotiation {
            neighbor_values,
            offered_to,
            partner: None,
            gain,
            new_value,
            change_value: false,
        };

        Ok((CycleState::RespondOffers(ctx), outgoing))
    }

    // Phase 2
    fn respond_offers(&mut self, mut ctx: Negotiation, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        let id = self.core.id();

        let mut offers: Vec<(AgentId, &Offer)> = Vec::with_capacity(inbox.len());
        for msg in inbox {
            match &msg.payload {
                Payload::Offer(offer) => offers.push((msg.sender, offer)),
                other => {
                    return Err(DcopError::UnexpectedMessage {
                        agent: id,
                        sender: msg.sender,
                        expected: Tag::Offer,
                        found: other.tag(),
                    })
                },
            }
        }

        // A bidder cannot also be a responder
        let mut best: Option<(AgentId, JointMove)> = None;
        if !ctx.is_committed() {
            for &(sender, offer) in &offers {
                let joint = self.best_joint_move(sender, offer, &ctx.neighbor_values)?;
                if best.map_or(true, |(_, b)| joint.gain > b.gain) {
                    best = Some((sender, joint));
                }
            }
        }

        let mut outgoing = Vec::with_capacity(offers.len());
        for &(sender, _) in &offers {
            let response = match best {
                Some((partner, joint)) if partner == sender => Response::Accept {
                    gain: joint.gain,
                    value: joint.partner_value,
                },
                _ => Response::Reject,
            };
            outgoing.push((sender, Payload::Response(response)));
        }

        if let Some((partner, joint)) = best {
            tracing::debug!(agent = id, partner, gain = joint.gain, "Offer accepted");
            ctx.partner = Some(partner);
            ctx.gain = joint.gain;
            ctx.new_value = joint.own_value;
        }

        Ok((CycleState::SendGain(ctx), outgoing))
    }

    // Phase 3
    fn send_gain(&mut self, mut ctx: Negotiation, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        let id = self.core.id();

        let mut answer = None;
        for msg in inbox {
            let Payload::Response(response) = msg.payload else {
                return Err(DcopError::UnexpectedMessage {
                    agent: id,
                    sender: msg.sender,
                    expected: Tag::Response,
                    found: msg.tag(),
                });
            };
            if ctx.offered_to != Some(msg.sender) || answer.is_some() {
                return Err(DcopError::UnexpectedSender {
                    agent: id,
                    sender: msg.sender,
                    tag: Tag::Response,
                });
            }
            answer = Some(response);
        }

        if let Some(target) = ctx.offered_to {
            match answer {
                Some(Response::Accept { gain, value }) => {
                    tracing::debug!(agent = id, partner = target, gain, "Paired");
                    ctx.partner = Some(target);
                    ctx.gain = gain;
                    ctx.new_value = value;
                },
                Some(Response::Reject) => {},
                None => {
                    return Err(DcopError::MissingResponse {
                        agent: id,
                        partner: target,
                    })
                },
            }
        }

        let outgoing = self
            .core
            .neighbors()
            .into_iter()
            .filter(|&n| Some(n) != ctx.partner)
            .map(|n| (n, Payload::Gain(ctx.gain)))
            .collect();

        Ok((CycleState::FindMaxGain(ctx), outgoing))
    }

    // Phase 4
    fn find_max_gain(&mut self, mut ctx: Negotiation, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        let id = self.core.id();

        let mut gains = Vec::with_capacity(inbox.len());
        for msg in inbox {
            match msg.payload {
                Payload::Gain(gain) => gains.push((msg.sender, gain)),
                ref other => {
                    return Err(DcopError::UnexpectedMessage {
                        agent: id,
                        sender: msg.sender,
                        expected: Tag::Gain,
                        found: other.tag(),
                    })
                },
            }
        }

        let expected = self.core.degree() - usize::from(ctx.partner.is_some());
        if gains.len() != expected {
            return Err(DcopError::GainCountMismatch {
                agent: id,
                expected,
                received: gains.len(),
            });
        }

        ctx.change_value = is_max_gain(id, ctx.gain, &gains) && ctx.gain > 0.0;

        let outgoing = ctx
            .partner
            .map(|partner| vec![(partner, Payload::ChangeFlag(ctx.change_value))])
            .unwrap_or_default();

        Ok((CycleState::UpdateValue(ctx), outgoing))
    }

    // Phase 5
    fn update_value(&mut self, ctx: Negotiation, inbox: &[Message]) -> Result<(CycleState, Outgoing)> {
        let id = self.core.id();

        let mut partner_flag = None;
        for msg in inbox {
            let Payload::ChangeFlag(flag) = msg.payload else {
                return Err(DcopError::UnexpectedMessage {
                    agent: id,
                    sender: msg.sender,
                    expected: Tag::ChangeFlag,
                    found: msg.tag(),
                });
            };
            if ctx.partner != Some(msg.sender) || partner_flag.is_some() {
                return Err(DcopError::UnexpectedSender {
                    agent: id,
                    sender: msg.sender,
                    tag: Tag::ChangeFlag,
                });
            }
            partner_flag = Some(flag);
        }

        let adopt = match ctx.partner {
            None => ctx.change_value,
            Some(partner) => {
                let flag = partner_flag.ok_or(DcopError::MissingChangeFlag { agent: id, partner })?;
                flag && ctx.change_value
            },
        };

        if adopt {
            self.core.set_value(ctx.new_value)?;
        }

        let value = self.core.value();
        let outgoing = self
            .core
            .neighbors()
            .into_iter()
            .map(|n| (n, Payload::Value(value)))
            .collect();

        Ok((CycleState::CommitOffers, outgoing))
    }
}

/// Whether `gain` beats every neighbor gain. Equal gains go to the higher id.
pub fn is_max_gain(id: AgentId, gain: f64, neighbor_gains: &[(AgentId, f64)]) -> bool {
    neighbor_gains
        .iter()
        .all(|&(neighbor, other)| gain > other || (gain == other && id > neighbor))
}

impl Agent for Mgm2Agent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn iteration(&mut self, mailer: &mut Mailer) -> Result<()> {
        let id = self.core.id();
        let state = std::mem::replace(&mut self.state, CycleState::CommitOffers);

        let (next, outgoing) = self.transition(state, mailer.messages_for(id))?;
        self.state = next;

        for (recipient, payload) in outgoing {
            mailer.deliver(id, recipient, payload);
        }
        Ok(())
    }

    fn rounds_per_cycle(&self) -> usize {
        ROUNDS_PER_CYCLE
    }
}
