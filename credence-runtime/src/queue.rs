//! Queue interface towards the network layer
//!
//! The trust layer talks to its network module through a message queue
//! carrying serialized envelopes. Sending goes through the [`MessageQueue`]
//! trait; receiving is a plain channel receiver drained by the dispatcher,
//! so the inbound side closes naturally when the transport goes away.

use thiserror::Error;
use tokio::sync::mpsc;

/// Queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue closed")]
    Closed,
}

/// Sending side of the queue connecting the trust layer to the network layer.
///
/// Implementations must not block; backpressure is the transport's concern.
pub trait MessageQueue: Send + Sync {
    /// Sends serialized data to the queue
    fn send(&self, serialized: &str) -> Result<(), QueueError>;
}

/// In-process queue over a tokio channel.
///
/// Outbound messages go to the receiver returned by [`ChannelQueue::new`];
/// the network side (tests, the stdio bridge) drains it and feeds inbound
/// messages into the dispatcher through its own channel.
pub struct ChannelQueue {
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl ChannelQueue {
    /// Create a queue, returning it together with the network-side receiver
    /// for outbound messages
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (Self { outbound_tx }, outbound_rx)
    }
}

impl MessageQueue for ChannelQueue {
    fn send(&self, serialized: &str) -> Result<(), QueueError> {
        self.outbound_tx
            .send(serialized.to_string())
            .map_err(|_| QueueError::Closed)
    }
}
