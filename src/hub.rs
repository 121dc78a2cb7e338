//! The hub: membership, history, filtering and fan-out.

use crate::error::{DeliveryFailure, HubError, Result};
use crate::filter::{Denylist, MessageFilter, DEFAULT_BANNED_TERM};
use crate::participant::{HubLink, Participant};
use crate::types::{Envelope, ParticipantId, Sequence, Timestamp};
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Hub configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Name used in log output.
    pub name: String,

    /// Banned substring -> replacement.
    /// Default: `{"badword": "*****"}`
    pub denylist: BTreeMap<String, String>,

    /// Hold a per-hub delivery lock through fan-out so every member sees
    /// messages in history order. A slow member then delays other
    /// publishers.
    /// Default: false
    pub ordered_delivery: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        let mut denylist = BTreeMap::new();
        denylist.insert(DEFAULT_BANNED_TERM.to_string(), "*****".to_string());
        Self {
            name: "hub".to_string(),
            denylist,
            ordered_delivery: false,
        }
    }
}

impl HubConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Outcome of one publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReport {
    /// Where the message landed in the history.
    pub sequence: Sequence,
    /// The filtered text that was recorded and delivered.
    pub text: String,
    /// Members that took the message, in snapshot order.
    pub delivered: Vec<ParticipantId>,
    /// Members whose receive failed.
    pub failures: Vec<DeliveryFailure>,
}

impl PublishReport {
    /// True when no member failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn any delivery failure into an error, for callers that treat
    /// partial delivery as fatal.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(HubError::PartialDelivery {
                sequence: self.sequence,
                failures: self.failures,
            })
        }
    }
}

/// Membership and publishing capability of a hub.
///
/// Participants only ever see a hub through this trait, so alternative hub
/// policies can be dropped in without touching participant code.
pub trait Mediator: Send + Sync {
    /// Add a participant. `Ok(false)` if it was already a member.
    fn join(&self, participant: Arc<dyn Participant>) -> Result<bool>;

    /// Remove a participant by identity. `false` if it was not a member.
    fn leave(&self, participant: &dyn Participant) -> bool;

    /// Filter, record and fan out a message to every member but `sender`.
    fn publish(&self, message: &str, sender: &ParticipantId) -> PublishReport;
}

struct HubState {
    /// Join order; one entry per identity.
    members: Vec<Arc<dyn Participant>>,
    /// Append-only, filtered.
    history: Vec<Envelope>,
    head: Sequence,
}

/// A chat-room style hub.
///
/// Members and history sit behind one mutex per hub. Fan-out runs after
/// that mutex is released, against a snapshot of the membership, so a
/// participant may publish from inside `receive`.
pub struct Hub {
    name: String,
    filter: Box<dyn MessageFilter>,
    state: Mutex<HubState>,
    /// Present when ordered delivery is on. Reentrant so a publish from
    /// inside `receive` on the same thread does not deadlock.
    delivery: Option<ReentrantMutex<()>>,
    this: Weak<Hub>,
}

impl Hub {
    /// A hub with the default configuration.
    pub fn new() -> Arc<Self> {
        let config = HubConfig::default();
        Self::build(config.name, Box::new(Denylist::default()), false)
    }

    /// A hub built from configuration. Fails if the denylist is invalid.
    pub fn with_config(config: HubConfig) -> Result<Arc<Self>> {
        let filter = Denylist::from_map(&config.denylist)?;
        Ok(Self::build(
            config.name,
            Box::new(filter),
            config.ordered_delivery,
        ))
    }

    /// A hub with a custom filter and unordered delivery.
    pub fn with_filter(name: impl Into<String>, filter: impl MessageFilter + 'static) -> Arc<Self> {
        Self::build(name.into(), Box::new(filter), false)
    }

    fn build(name: String, filter: Box<dyn MessageFilter>, ordered_delivery: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name,
            filter,
            state: Mutex::new(HubState {
                members: Vec::new(),
                history: Vec::new(),
                head: Sequence::default(),
            }),
            delivery: ordered_delivery.then(|| ReentrantMutex::new(())),
            this: this.clone(),
        })
    }

    fn link(&self) -> HubLink {
        let hub: Weak<dyn Mediator> = self.this.clone();
        HubLink::new(hub)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordered_delivery(&self) -> bool {
        self.delivery.is_some()
    }

    // --- Membership ---

    /// Add `participant` and point its hub association here.
    ///
    /// Joining a participant that is already a member is a no-op returning
    /// `Ok(false)`. A different participant claiming an identity that is
    /// already present is rejected with `IdentityTaken`: `leave` and
    /// `publish` only need an identity to act on the stored member, but
    /// accepting a second object here would either leave it unattached or
    /// let it send as someone else while the first stays the delivery
    /// target.
    pub fn join(&self, participant: Arc<dyn Participant>) -> Result<bool> {
        let mut state = self.state.lock();

        if let Some(existing) = state.members.iter().find(|m| m.id() == participant.id()) {
            if Arc::ptr_eq(existing, &participant) {
                participant.attach(self.link());
                return Ok(false);
            }
            warn!(hub = %self.name, participant = %participant.id(), "identity already taken");
            return Err(HubError::IdentityTaken(participant.id().clone()));
        }

        participant.attach(self.link());
        debug!(
            hub = %self.name,
            participant = %participant.id(),
            members = state.members.len() + 1,
            "participant joined"
        );
        state.members.push(participant);
        Ok(true)
    }

    /// Remove the member with `participant`'s identity and clear the
    /// association if it points here.
    pub fn leave(&self, participant: &dyn Participant) -> bool {
        let mut state = self.state.lock();
        let link = self.link();

        // The caller's handle may differ from the stored one.
        participant.detach(&link);

        let Some(pos) = state.members.iter().position(|m| m.id() == participant.id()) else {
            return false;
        };
        let removed = state.members.remove(pos);
        removed.detach(&link);

        debug!(
            hub = %self.name,
            participant = %removed.id(),
            members = state.members.len(),
            "participant left"
        );
        true
    }

    // --- Publishing ---

    /// Filter `message`, append it to the history and deliver it to every
    /// current member except `sender`.
    ///
    /// `sender` does not have to be a member. Members whose `receive` fails
    /// or panics are listed in the report; the rest are still delivered.
    pub fn publish(&self, message: &str, sender: &ParticipantId) -> PublishReport {
        let _ordered = self.delivery.as_ref().map(|lock| lock.lock());

        let (envelope, snapshot) = {
            let mut state = self.state.lock();
            let text = self.filter.apply(message);
            let sequence = state.head.next();
            state.head = sequence;

            let envelope = Envelope {
                sequence,
                sender: sender.clone(),
                text,
                timestamp: Timestamp::now(),
            };
            state.history.push(envelope.clone());
            (envelope, state.members.clone())
        };

        let mut delivered = Vec::with_capacity(snapshot.len());
        let mut failures = Vec::new();

        for member in snapshot.iter().filter(|m| m.id() != sender) {
            let outcome = catch_unwind(AssertUnwindSafe(|| member.receive(&envelope)));
            let reason = match outcome {
                Ok(Ok(())) => {
                    delivered.push(member.id().clone());
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("receive panicked: {}", panic_message(panic.as_ref())),
            };
            warn!(
                hub = %self.name,
                participant = %member.id(),
                sequence = envelope.sequence.0,
                %reason,
                "delivery failed"
            );
            failures.push(DeliveryFailure {
                recipient: member.id().clone(),
                reason,
            });
        }

        debug!(
            hub = %self.name,
            sender = %sender,
            sequence = envelope.sequence.0,
            recipients = delivered.len(),
            failures = failures.len(),
            "message published"
        );

        PublishReport {
            sequence: envelope.sequence,
            text: envelope.text,
            delivered,
            failures,
        }
    }

    // --- Inspection ---

    /// Filtered texts recorded so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .history
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }

    /// Recorded envelopes, oldest first.
    pub fn entries(&self) -> Vec<Envelope> {
        self.state.lock().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Member identities in join order.
    pub fn members(&self) -> Vec<ParticipantId> {
        self.state
            .lock()
            .members
            .iter()
            .map(|m| m.id().clone())
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    pub fn is_member(&self, id: &ParticipantId) -> bool {
        self.state.lock().members.iter().any(|m| m.id() == id)
    }
}

impl Mediator for Hub {
    fn join(&self, participant: Arc<dyn Participant>) -> Result<bool> {
        Hub::join(self, participant)
    }

    fn leave(&self, participant: &dyn Participant) -> bool {
        Hub::leave(self, participant)
    }

    fn publish(&self, message: &str, sender: &ParticipantId) -> PublishReport {
        Hub::publish(self, message, sender)
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Hub")
            .field("name", &self.name)
            .field("members", &state.members.len())
            .field("history", &state.history.len())
            .field("ordered_delivery", &self.delivery.is_some())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
