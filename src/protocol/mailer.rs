//! Round-synchronous message bus.
//!
//! The mailer keeps two buffers:
//!
//! ```text
//!   round k                         round k+1
//!  ┌─────────┐  advance_round()   ┌─────────┐
//!  │ outbox  │ ─────────────────> │ mailbox │ ──> messages_for(id)
//!  └─────────┘   group by         └─────────┘
//!   deliver()    recipient
//! ```
//!
//! A message delivered during round `k` becomes readable only after the next
//! `advance_round()`, and is discarded by the one after that. The driver
//! calls `advance_round()` exactly once per round, between agent passes.

use std::collections::HashMap;

use super::{MailerStats, Message, Payload};
use crate::AgentId;

/// Synchronous message bus
#[derive(Debug, Default)]
pub struct Mailer {
    outbox: Vec<Message>,
    mailbox: HashMap<AgentId, Vec<Message>>,
    stats: MailerStats,
}

impl Mailer {
    /// Create an empty mailer
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for the next round.
    ///
    /// The recipient need not be a neighbor of the sender; the bus does not
    /// know the constraint graph.
    pub fn deliver(&mut self, sender: AgentId, recipient: AgentId, payload: Payload) {
        self.stats.record(payload.tag());
        self.outbox.push(Message::new(sender, recipient, payload));
    }

    /// Messages visible to `recipient` this round, in delivery order.
    pub fn messages_for(&self, recipient: AgentId) -> &[Message] {
        self.mailbox.get(&recipient).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Move the outbox into the mailbox, grouped by recipient, and clear the
    /// outbox. The previous mailbox is dropped.
    pub fn advance_round(&mut self) {
        let outbox = std::mem::take(&mut self.outbox);
        self.mailbox.clear();

        for msg in outbox {
            self.mailbox.entry(msg.recipient).or_default().push(msg);
        }

        self.stats.record_round();
        tracing::trace!(
            round = self.stats.rounds,
            recipients = self.mailbox.len(),
            "Mailbox advanced"
        );
    }

    /// Messages queued for the next round
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Completed round advances
    pub fn round(&self) -> u64 {
        self.stats.rounds
    }

    /// Delivery counters
    pub fn stats(&self) -> MailerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Tag;

    #[test]
    fn test_round_isolation() {
        let mut mailer = Mailer::new();
        mailer.deliver(0, 1, Payload::Value(4));

        assert!(mailer.messages_for(1).is_empty());
        assert_eq!(mailer.pending(), 1);

        mailer.advance_round();
        let inbox = mailer.messages_for(1);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender, 0);
        assert_eq!(inbox[0].payload, Payload::Value(4));
        assert_eq!(mailer.pending(), 0);
    }

    #[test]
    fn test_messages_discarded_after_next_advance() {
        let mut mailer = Mailer::new();
        mailer.deliver(0, 1, Payload::Value(4));
        mailer.advance_round();
        mailer.advance_round();
        assert!(mailer.messages_for(1).is_empty());
    }

    #[test]
    fn test_unknown_recipient_is_empty() {
        let mailer = Mailer::new();
        assert!(mailer.messages_for(42).is_empty());
    }

    #[test]
    fn test_fifo_per_recipient() {
        let mut mailer = Mailer::new();
        mailer.deliver(2, 0, Payload::Gain(1.0));
        mailer.deliver(1, 9, Payload::Value(0));
        mailer.deliver(1, 0, Payload::Gain(2.0));
        mailer.deliver(3, 0, Payload::Gain(3.0));
        mailer.advance_round();

        let senders: Vec<AgentId> = mailer.messages_for(0).iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![2, 1, 3]);
        assert_eq!(mailer.messages_for(9).len(), 1);
    }

    #[test]
    fn test_deliveries_during_read_round_go_to_next_round() {
        let mut mailer = Mailer::new();
        mailer.deliver(0, 1, Payload::Value(1));
        mailer.advance_round();

        // Reply while round 1's mailbox is being read
        mailer.deliver(1, 0, Payload::Value(0));
        assert!(mailer.messages_for(0).is_empty());
        assert_eq!(mailer.messages_for(1).len(), 1);

        mailer.advance_round();
        assert_eq!(mailer.messages_for(0).len(), 1);
        assert!(mailer.messages_for(1).is_empty());
    }

    #[test]
    fn test_stats() {
        let mut mailer = Mailer::new();
        mailer.deliver(0, 1, Payload::Value(1));
        mailer.deliver(1, 0, Payload::ChangeFlag(false));
        mailer.advance_round();

        let stats = mailer.stats();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.total(), 2);
        assert_eq!(mailer.round(), 1);
        assert_eq!(mailer.messages_for(0)[0].tag(), Tag::ChangeFlag);
    }
}
