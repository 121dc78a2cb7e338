//! Where a [`User`](crate::User) puts the messages delivered to it.

use crate::error::SinkError;
use crate::types::{Envelope, ParticipantId};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::time::Duration;
use tracing::info;

/// Receiving end of a participant.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, recipient: &ParticipantId, envelope: &Envelope) -> Result<(), SinkError>;
}

impl<F> MessageSink for F
where
    F: Fn(&ParticipantId, &Envelope) -> Result<(), SinkError> + Send + Sync,
{
    fn deliver(&self, recipient: &ParticipantId, envelope: &Envelope) -> Result<(), SinkError> {
        self(recipient, envelope)
    }
}

/// Prints each delivery to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn deliver(&self, recipient: &ParticipantId, envelope: &Envelope) -> Result<(), SinkError> {
        println!("{} received message: {}", recipient, envelope.text);
        Ok(())
    }
}

/// Emits each delivery as a tracing event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn deliver(&self, recipient: &ParticipantId, envelope: &Envelope) -> Result<(), SinkError> {
        info!(
            participant = %recipient,
            sender = %envelope.sender,
            sequence = envelope.sequence.0,
            text = %envelope.text,
            "message received"
        );
        Ok(())
    }
}

/// Forwards deliveries into a channel read through an [`Inbox`].
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: Sender<Envelope>,
}

impl MessageSink for ChannelSink {
    fn deliver(&self, _recipient: &ParticipantId, envelope: &Envelope) -> Result<(), SinkError> {
        match self.sender.try_send(envelope.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::Full),
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Disconnected),
        }
    }
}

/// Create a connected sink/inbox pair. `None` means unbounded.
pub fn channel(capacity: Option<usize>) -> (ChannelSink, Inbox) {
    let (sender, receiver) = match capacity {
        Some(cap) => bounded(cap),
        None => unbounded(),
    };
    (ChannelSink { sender }, Inbox { receiver })
}

/// Reading side of a [`ChannelSink`].
#[derive(Clone, Debug)]
pub struct Inbox {
    receiver: Receiver<Envelope>,
}

impl Inbox {
    /// Receive the next message (blocking).
    pub fn recv(&self) -> Result<Envelope, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> Result<Envelope, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Envelope, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<Envelope> {
        self.receiver.try_iter().collect()
    }

    /// Texts currently queued, oldest first.
    pub fn drain_texts(&self) -> Vec<String> {
        self.receiver.try_iter().map(|e| e.text).collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sequence, Timestamp};

    fn envelope(seq: u64, text: &str) -> Envelope {
        Envelope {
            sequence: Sequence(seq),
            sender: "alice".into(),
            text: text.to_string(),
            timestamp: Timestamp::now(),
        }
    }

    #[test]
    fn test_channel_roundtrip_order() {
        let (sink, inbox) = channel(None);
        let bob = ParticipantId::from("bob");

        sink.deliver(&bob, &envelope(1, "one")).unwrap();
        sink.deliver(&bob, &envelope(2, "two")).unwrap();

        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox.drain_texts(), vec!["one", "two"]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_bounded_channel_reports_full() {
        let (sink, _inbox) = channel(Some(1));
        let bob = ParticipantId::from("bob");

        sink.deliver(&bob, &envelope(1, "one")).unwrap();
        assert_eq!(sink.deliver(&bob, &envelope(2, "two")), Err(SinkError::Full));
    }

    #[test]
    fn test_dropped_inbox_reports_disconnected() {
        let (sink, inbox) = channel(None);
        drop(inbox);

        let result = sink.deliver(&"bob".into(), &envelope(1, "one"));
        assert_eq!(result, Err(SinkError::Disconnected));
    }

    #[test]
    fn test_recv_timeout_on_empty_inbox() {
        let (_sink, inbox) = channel(None);
        assert!(inbox.recv_timeout(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_console_and_tracing_sinks_accept_everything() {
        let bob = ParticipantId::from("bob");
        assert!(ConsoleSink.deliver(&bob, &envelope(1, "printed")).is_ok());
        assert!(TracingSink.deliver(&bob, &envelope(2, "logged")).is_ok());
    }

    #[test]
    fn test_closure_sink() {
        let sink = |_: &ParticipantId, e: &Envelope| {
            if e.text.is_empty() {
                Err(SinkError::Rejected("empty".to_string()))
            } else {
                Ok(())
            }
        };
        let bob = ParticipantId::from("bob");
        assert!(sink.deliver(&bob, &envelope(1, "x")).is_ok());
        assert_eq!(
            sink.deliver(&bob, &envelope(2, "")),
            Err(SinkError::Rejected("empty".to_string()))
        );
    }
}
