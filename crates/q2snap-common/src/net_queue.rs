// net_queue.rs — inbound server message queue
//
// The transport thread reassembles server messages and hands them to the
// client thread through this queue. The decoder drains it once per frame;
// an empty queue means no message arrived this tick.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

/// A complete server message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Transport sequence number, strictly increasing
    pub sequence: u32,
    /// Message payload, opcode stream only
    pub data: Vec<u8>,
    /// Receive time in milliseconds
    pub timestamp: i32,
}

impl QueuedMessage {
    pub fn new(sequence: u32, data: Vec<u8>, timestamp: i32) -> Self {
        Self {
            sequence,
            data,
            timestamp,
        }
    }
}

/// Bounded single-consumer message queue.
pub struct MessageQueue {
    sender: Sender<QueuedMessage>,
    receiver: Receiver<QueuedMessage>,
}

impl MessageQueue {
    /// When full, new messages are dropped; the producer never blocks.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.clamp(1, MAX_QUEUE_CAPACITY));
        Self { sender, receiver }
    }

    /// Get a clone of the sender handle (for the transport thread).
    pub fn sender(&self) -> MessageQueueSender {
        MessageQueueSender {
            sender: self.sender.clone(),
        }
    }

    /// Returns `None` if no message is waiting.
    pub fn try_recv(&self) -> Option<QueuedMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Sender handle for the message queue.
#[derive(Clone)]
pub struct MessageQueueSender {
    sender: Sender<QueuedMessage>,
}

impl MessageQueueSender {
    /// Returns `true` if queued, `false` if the queue is full or gone.
    pub fn try_send(&self, message: QueuedMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const MAX_QUEUE_CAPACITY: usize = 4096;
