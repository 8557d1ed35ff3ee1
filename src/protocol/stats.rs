//! Message bus statistics.
//!
//! Counts messages by tag over the life of a [`Mailer`](super::Mailer).

use serde::{Deserialize, Serialize};

use super::Tag;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailerStats {
    /// Completed round advances
    pub rounds: u64,
    /// Value broadcasts
    pub values: u64,
    /// Offers
    pub offers: u64,
    /// Responses
    pub responses: u64,
    /// Gain broadcasts
    pub gains: u64,
    /// Change flags
    pub change_flags: u64,
}

impl MailerStats {
    /// Record one delivered message
    pub fn record(&mut self, tag: Tag) {
        let counter = match tag {
            Tag::Value => &mut self.values,
            Tag::Offer => &mut self.offers,
            Tag::Response => &mut self.responses,
            Tag::Gain => &mut self.gains,
            Tag::ChangeFlag => &mut self.change_flags,
        };
        *counter += 1;
    }

    /// Record a round advance
    pub fn record_round(&mut self) {
        self.rounds += 1;
    }

    /// Total messages delivered
    pub fn total(&self) -> u64 {
        self.values + self.offers + self.responses + self.gains + self.change_flags
    }

    /// Average messages per round
    pub fn per_round(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.total() as f64 / self.rounds as f64
        }
    }
}
