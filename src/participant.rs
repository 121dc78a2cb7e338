//! Participants and their non-owning link back to a hub.

use crate::error::{HubError, Result, SinkError};
use crate::hub::{Mediator, PublishReport};
use crate::sink::{self, ConsoleSink, Inbox, MessageSink};
use crate::types::{Envelope, ParticipantId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Anything a hub can deliver to.
///
/// `attach` and `detach` are called by the hub while it holds its own lock,
/// so implementations must not call back into the hub from them. `receive`
/// runs after the hub lock is released and may publish.
pub trait Participant: Send + Sync {
    fn id(&self) -> &ParticipantId;

    fn receive(&self, envelope: &Envelope) -> std::result::Result<(), SinkError>;

    /// Record the hub this participant just joined.
    fn attach(&self, _link: HubLink) {}

    /// Forget `link` if it is still the current association.
    fn detach(&self, _link: &HubLink) {}
}

/// Weak back-reference from a participant to its hub.
///
/// Never keeps the hub alive; once the hub is dropped `upgrade` returns
/// `None`.
#[derive(Clone)]
pub struct HubLink {
    hub: Weak<dyn Mediator>,
}

impl HubLink {
    pub fn new(hub: Weak<dyn Mediator>) -> Self {
        Self { hub }
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Mediator>> {
        self.hub.upgrade()
    }

    pub fn is_live(&self) -> bool {
        self.hub.strong_count() > 0
    }

    /// Whether both links point at the same hub.
    pub fn same_hub(&self, other: &HubLink) -> bool {
        Weak::ptr_eq(&self.hub, &other.hub)
    }
}

impl fmt::Debug for HubLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubLink")
            .field("live", &self.is_live())
            .finish()
    }
}

/// A participant that can send through its hub and hands deliveries to a
/// sink.
pub struct User {
    id: ParticipantId,
    sink: Box<dyn MessageSink>,
    hub: RwLock<Option<HubLink>>,
}

impl User {
    pub fn new(id: impl Into<ParticipantId>, sink: impl MessageSink + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            sink: Box::new(sink),
            hub: RwLock::new(None),
        })
    }

    /// A user that prints what it receives.
    pub fn console(id: impl Into<ParticipantId>) -> Arc<Self> {
        Self::new(id, ConsoleSink)
    }

    /// A user backed by an unbounded inbox.
    pub fn with_inbox(id: impl Into<ParticipantId>) -> (Arc<Self>, Inbox) {
        let (sink, inbox) = sink::channel(None);
        (Self::new(id, sink), inbox)
    }

    /// A user whose deliveries fail with `SinkError::Full` past `capacity`
    /// unread messages.
    pub fn with_bounded_inbox(id: impl Into<ParticipantId>, capacity: usize) -> (Arc<Self>, Inbox) {
        let (sink, inbox) = sink::channel(Some(capacity));
        (Self::new(id, sink), inbox)
    }

    /// Publish through the joined hub.
    ///
    /// Fails with `NotJoined` if the user never joined, has left, or the hub
    /// has been dropped.
    pub fn send(&self, message: &str) -> Result<PublishReport> {
        let hub = self.hub.read().as_ref().and_then(HubLink::upgrade);
        match hub {
            Some(hub) => Ok(hub.publish(message, &self.id)),
            None => {
                debug!(participant = %self.id, "send without a hub");
                Err(HubError::NotJoined(self.id.clone()))
            }
        }
    }

    pub fn is_joined(&self) -> bool {
        self.hub.read().as_ref().is_some_and(HubLink::is_live)
    }
}

impl Participant for User {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    fn receive(&self, envelope: &Envelope) -> std::result::Result<(), SinkError> {
        self.sink.deliver(&self.id, envelope)
    }

    fn attach(&self, link: HubLink) {
        *self.hub.write() = Some(link);
    }

    fn detach(&self, link: &HubLink) {
        let mut hub = self.hub.write();
        if hub.as_ref().is_some_and(|current| current.same_hub(link)) {
            *hub = None;
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("joined", &self.is_joined())
            .finish()
    }
}
