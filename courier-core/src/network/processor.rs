//! Incoming message processing hooks.

use std::sync::Arc;

use tracing::{info, warn};

use crate::message::{AbstractMessage, BoxedMessage, DecodeError, MessageCoder, MessageType};

/// Outcome of processing one incoming boxed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessIncomingResult {
    /// The message was handled (or deliberately discarded) and may be acked.
    pub processed: bool,
    /// Decoded message kind, if decoding succeeded.
    pub message_type: Option<MessageType>,
}

impl ProcessIncomingResult {
    pub fn processed(message_type: MessageType) -> Self {
        ProcessIncomingResult {
            processed: true,
            message_type: Some(message_type),
        }
    }

    /// Acknowledge without recording the nonce.
    pub fn discarded() -> Self {
        ProcessIncomingResult {
            processed: true,
            message_type: None,
        }
    }

    /// Leave unacknowledged so the server redelivers.
    pub fn retry() -> Self {
        ProcessIncomingResult::default()
    }
}

/// Receives messages and server notices from the connection.
pub trait MessageProcessor: Send + Sync {
    fn process_incoming(&self, message: &BoxedMessage) -> ProcessIncomingResult;

    fn process_server_error(&self, _message: &str, _reconnect_allowed: bool) {}

    fn process_server_alert(&self, _message: &str) {}
}

/// Application callback for decoded messages.
pub trait MessageHandler: Send + Sync {
    /// Returns true once the message has been handled.
    fn handle_message(&self, message: &AbstractMessage) -> bool;
}

impl<F> MessageHandler for F
where
    F: Fn(&AbstractMessage) -> bool + Send + Sync,
{
    fn handle_message(&self, message: &AbstractMessage) -> bool {
        self(message)
    }
}

/// Processor that decodes boxes and forwards them to a [`MessageHandler`].
pub struct DecodingProcessor {
    coder: Arc<MessageCoder>,
    handler: Arc<dyn MessageHandler>,
}

impl DecodingProcessor {
    pub fn new(coder: Arc<MessageCoder>, handler: Arc<dyn MessageHandler>) -> Self {
        DecodingProcessor { coder, handler }
    }
}

impl MessageProcessor for DecodingProcessor {
    fn process_incoming(&self, message: &BoxedMessage) -> ProcessIncomingResult {
        match self.coder.decode(message, true) {
            Ok(decoded) => {
                let message_type = decoded.message_type();
                if self.handler.handle_message(&decoded) {
                    ProcessIncomingResult::processed(message_type)
                } else {
                    ProcessIncomingResult::retry()
                }
            }
            Err(DecodeError::Drop(reason)) => {
                warn!(
                    from = %message.from,
                    id = %message.message_id,
                    %reason,
                    "Discarding undecodable message"
                );
                ProcessIncomingResult::discarded()
            }
            Err(DecodeError::Retry(reason)) => {
                info!(
                    from = %message.from,
                    id = %message.message_id,
                    %reason,
                    "Message left for redelivery"
                );
                ProcessIncomingResult::retry()
            }
        }
    }

    fn process_server_error(&self, message: &str, reconnect_allowed: bool) {
        warn!(message, reconnect_allowed, "Server error");
    }

    fn process_server_alert(&self, message: &str) {
        info!(message, "Server alert");
    }
}
