// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delivery Queue
//!
//! Encodes outgoing messages, sends them when logged in and keeps them until
//! the server acknowledges them. Pending entries are resent in order on every
//! login and can be persisted across restarts.

use std::io::{Read, Write};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::BOX_OVERHEAD;
use crate::message::boxed::HEADER_LEN;
use crate::message::{AbstractMessage, BoxedMessage, EncodeError, MessageCoder, MessageId};
use crate::network::{
    Connection, ConnectionEvent, ConnectionListener, ConnectionState, MessageAck,
    MAX_PACKET_LEN, PAYLOAD_HEADER_LEN,
};
use crate::nonce::NonceFactory;

/// Largest message box that still fits into one frame.
pub const MAX_MESSAGE_BOX_LEN: usize =
    MAX_PACKET_LEN - BOX_OVERHEAD - PAYLOAD_HEADER_LEN - HEADER_LEN;

/// Delivery queue error types.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("No identity configured")]
    NoIdentity,

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Message too long: {0} bytes")]
    MessageTooLong(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Where the queue sends boxed messages.
pub trait MessageSink: Send + Sync {
    fn is_logged_in(&self) -> bool;

    /// Returns false if the message could not be handed to the transport.
    fn send_boxed_message(&self, message: &BoxedMessage) -> bool;
}

impl MessageSink for Connection {
    fn is_logged_in(&self) -> bool {
        self.state() == ConnectionState::LoggedIn
    }

    fn send_boxed_message(&self, message: &BoxedMessage) -> bool {
        Connection::send_boxed_message(self, message)
    }
}

/// Outgoing messages awaiting a server acknowledgment.
///
/// Register the queue as a listener on the connection it sends through so
/// that it flushes on login and drops acknowledged entries.
pub struct MessageQueue {
    coder: Arc<MessageCoder>,
    nonces: NonceFactory,
    sink: Weak<dyn MessageSink>,
    pending: Mutex<Vec<BoxedMessage>>,
}

impl MessageQueue {
    /// The queue holds a weak reference to `sink`.
    pub fn new(
        coder: Arc<MessageCoder>,
        nonces: NonceFactory,
        sink: &Arc<dyn MessageSink>,
    ) -> Self {
        MessageQueue {
            coder,
            nonces,
            sink: Arc::downgrade(sink),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Encodes `message` and sends or queues it.
    ///
    /// The sender is always the active identity; the nickname is filled in
    /// if the message has none. Immediate messages are dropped while offline.
    pub fn enqueue(&self, mut message: AbstractMessage) -> Result<BoxedMessage, QueueError> {
        let identity = self
            .coder
            .identity_store()
            .identity()
            .ok_or(QueueError::NoIdentity)?;
        message.from = identity.id();
        if message.push_from_name.is_none() {
            message.push_from_name = identity.nickname().map(str::to_string);
        }

        let boxed = self.coder.encode(&message, &self.nonces)?;
        if boxed.ciphertext.len() > MAX_MESSAGE_BOX_LEN {
            return Err(QueueError::MessageTooLong(boxed.ciphertext.len()));
        }
        info!(
            to = %boxed.to,
            id = %boxed.message_id,
            kind = ?message.message_type(),
            "Enqueue message"
        );

        let mut pending = self.pending.lock();
        let sent = match self.sink.upgrade() {
            Some(sink) if sink.is_logged_in() => sink.send_boxed_message(&boxed),
            _ => false,
        };
        if sent {
            if boxed.expects_ack() {
                pending.push(boxed.clone());
            }
        } else if boxed.is_immediate() {
            debug!(id = %boxed.message_id, "Dropping immediate message while offline");
        } else {
            pending.push(boxed.clone());
        }
        Ok(boxed)
    }

    /// Resends every pending entry in enqueue order.
    ///
    /// Entries that expect no acknowledgment are removed once sent. Returns
    /// the number of messages sent.
    pub fn flush(&self) -> usize {
        let Some(sink) = self.sink.upgrade() else {
            return 0;
        };
        let mut pending = self.pending.lock();

        let mut sent = 0;
        for message in pending.iter() {
            if !sink.send_boxed_message(message) {
                warn!(id = %message.message_id, "Flush interrupted");
                break;
            }
            sent += 1;
        }

        let mut index = 0;
        pending.retain(|message| {
            let keep = index >= sent || message.expects_ack();
            index += 1;
            keep
        });
        info!(sent, remaining = pending.len(), "Flushed message queue");
        sent
    }

    /// Removes the first entry matching the acknowledged recipient and id.
    pub fn process_ack(&self, ack: &MessageAck) -> bool {
        let mut pending = self.pending.lock();
        let position = pending
            .iter()
            .position(|m| m.to == ack.identity && m.message_id == ack.message_id);
        match position {
            Some(index) => {
                pending.remove(index);
                debug!(to = %ack.identity, id = %ack.message_id, "Message acknowledged");
                true
            }
            None => {
                info!(to = %ack.identity, id = %ack.message_id, "Ack for unknown message");
                false
            }
        }
    }

    /// Removes all entries with `message_id`. Returns true if any matched.
    pub fn cancel(&self, message_id: &MessageId) -> bool {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|m| m.message_id != *message_id);
        pending.len() != before
    }

    pub fn is_queued(&self, message_id: &MessageId) -> bool {
        self.pending.lock().iter().any(|m| m.message_id == *message_id)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Snapshot of the pending entries in order.
    pub fn pending(&self) -> Vec<BoxedMessage> {
        self.pending.lock().clone()
    }

    /// Writes the pending entries to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), QueueError> {
        let pending = self.pending.lock();
        bincode::serialize_into(writer, &*pending)
            .map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Appends entries previously written by [`MessageQueue::save`].
    ///
    /// Entries from another identity are discarded. Returns the number of
    /// entries restored.
    pub fn load<R: Read>(&self, reader: R) -> Result<usize, QueueError> {
        let stored: Vec<BoxedMessage> = bincode::deserialize_from(reader)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;
        let Some(identity) = self.coder.identity_store().identity() else {
            warn!(count = stored.len(), "No identity, discarding stored queue");
            return Ok(0);
        };

        let total = stored.len();
        let restored: Vec<_> = stored
            .into_iter()
            .filter(|m| m.from == identity.id())
            .collect();
        if restored.len() != total {
            warn!(
                discarded = total - restored.len(),
                "Discarding queued messages of another identity"
            );
        }

        let count = restored.len();
        self.pending.lock().extend(restored);
        info!(count, "Restored message queue");
        Ok(count)
    }
}

impl ConnectionListener for MessageQueue {
    fn on_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged {
                state: ConnectionState::LoggedIn,
                ..
            } => {
                self.flush();
            }
            ConnectionEvent::MessageAck(ack) => {
                self.process_ack(ack);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_message_box_len() {
        assert_eq!(MAX_MESSAGE_BOX_LEN, 8084);
    }
}
