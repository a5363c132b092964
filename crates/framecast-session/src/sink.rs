//! Outbound event channel of a session.

use std::future::Future;

use framecast_protocols::SessionEvent;
use tokio::sync::mpsc;

/// How an [`EventSink::emit_unless`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event is queued for the client.
    Sent,
    /// The cancel future won while the queue was full; the event was dropped.
    Cancelled,
    /// The receiving side is gone.
    Closed,
}

/// Bounded, ordered channel towards the connection writer.
///
/// `emit` waits for queue space, so a slow client slows the producer down
/// instead of growing a buffer.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSink {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an event. Returns `false` once the receiving side is gone.
    pub async fn emit(&self, event: SessionEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Queue an event unless `cancelled` resolves before there is room for it.
    ///
    /// A client that stops reading must never hold up whoever cancels.
    pub async fn emit_unless<C>(&self, event: SessionEvent, cancelled: C) -> Delivery
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => Delivery::Cancelled,
            sent = self.tx.send(event) => match sent {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::Closed,
            },
        }
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
