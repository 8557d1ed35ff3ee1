//! Agent coordination protocol: messages and the synchronous bus.
//!
//! # Round Model
//!
//! Agents never read each other's state. Everything an agent knows about its
//! neighbors arrives as a [`Message`] through the [`Mailer`], one round late:
//!
//! ```text
//! Driver                 Mailer                   Agents
//!    |                     |                         |
//!    |-- advance_round --->|  outbox -> mailbox      |
//!    |                     |                         |
//!    |-- iteration ------------------------------->  | read messages_for(id)
//!    |                     |<------- deliver --------| write next round
//!    |                     |                         |
//!    |-- advance_round --->|  ...                    |
//! ```
//!
//! ## Message Types
//!
//! | Tag          | Payload                | Used by       |
//! |--------------|------------------------|---------------|
//! | `Value`      | current value          | DSA, MGM-2 p5 |
//! | `Offer`      | bidder snapshot        | MGM-2 p1      |
//! | `Response`   | accept(gain, value) / reject | MGM-2 p2 |
//! | `Gain`       | best gain              | MGM-2 p3      |
//! | `ChangeFlag` | partner go/no-go       | MGM-2 p4      |

mod mailer;
mod message;
mod stats;

pub use mailer::Mailer;
pub use message::{Message, Offer, Payload, Response, Tag};
pub use stats::MailerStats;
