//! # Parley
//!
//! A thread-safe mediator hub: participants join a hub, publish through it,
//! and receive every other member's messages after they pass a filter.
//!
//! ## Core Concepts
//!
//! - **Hub**: owns membership and an append-only history of filtered messages
//! - **Participant**: anything with an identity that can receive; holds only a
//!   weak link back to its hub
//! - **Filter**: a pure text transform applied before recording and fan-out
//! - **Sink**: where a [`User`] puts what it receives (console, log, channel)
//!
//! ## Example
//!
//! ```ignore
//! use parley::{Hub, User};
//!
//! let hub = Hub::new();
//! let (alice, _alice_inbox) = User::with_inbox("alice");
//! let (bob, bob_inbox) = User::with_inbox("bob");
//! hub.join(alice.clone())?;
//! hub.join(bob)?;
//!
//! alice.send("This is a badword test message")?;
//! assert_eq!(bob_inbox.recv()?.text, "This is a ***** test message");
//! ```

pub mod error;
pub mod filter;
pub mod hub;
pub mod participant;
pub mod sink;
pub mod types;

// Re-exports
pub use error::{DeliveryFailure, HubError, Result, SinkError};
pub use filter::{Denylist, MessageFilter, PassThrough};
pub use hub::{Hub, HubConfig, Mediator, PublishReport};
pub use participant::{HubLink, Participant, User};
pub use sink::{ChannelSink, ConsoleSink, Inbox, MessageSink, TracingSink};
pub use types::{Envelope, ParticipantId, Sequence, Timestamp};
