//! Transport payloads carried inside encrypted frames.
//!
//! A decrypted frame is `type(1) || reserved(3, zero) || data`.

use crate::crypto::BOX_OVERHEAD;
use crate::identity::{IdentityId, IDENTITY_LEN};
use crate::message::MessageId;

use super::NetworkError;

/// Maximum ciphertext length of a single frame.
pub const MAX_PACKET_LEN: usize = 8192;

/// Type byte plus the reserved gap.
pub const PAYLOAD_HEADER_LEN: usize = 4;

/// Length of an echo sequence number.
pub const ECHO_LEN: usize = 4;

/// Payload type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadType {
    EchoRequest = 0x00,
    OutgoingMessage = 0x01,
    IncomingMessage = 0x02,
    PushToken = 0x20,
    PushAllowedIdentities = 0x21,
    VoipPushToken = 0x24,
    EchoReply = 0x80,
    OutgoingMessageAck = 0x81,
    IncomingMessageAck = 0x82,
    QueueSendComplete = 0xd0,
    Error = 0xe0,
    Alert = 0xe1,
}

impl PayloadType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PayloadType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        let kind = match byte {
            0x00 => PayloadType::EchoRequest,
            0x01 => PayloadType::OutgoingMessage,
            0x02 => PayloadType::IncomingMessage,
            0x20 => PayloadType::PushToken,
            0x21 => PayloadType::PushAllowedIdentities,
            0x24 => PayloadType::VoipPushToken,
            0x80 => PayloadType::EchoReply,
            0x81 => PayloadType::OutgoingMessageAck,
            0x82 => PayloadType::IncomingMessageAck,
            0xd0 => PayloadType::QueueSendComplete,
            0xe0 => PayloadType::Error,
            0xe1 => PayloadType::Alert,
            other => return Err(other),
        };
        Ok(kind)
    }
}

/// A typed transport payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub payload_type: u8,
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(payload_type: PayloadType, data: Vec<u8>) -> Self {
        Payload {
            payload_type: payload_type.as_byte(),
            data,
        }
    }

    /// Known payload type, or the raw byte if unknown.
    pub fn kind(&self) -> Result<PayloadType, u8> {
        PayloadType::try_from(self.payload_type)
    }

    /// Serializes to frame plaintext. The reserved gap is written as zero.
    pub fn to_plaintext(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_HEADER_LEN + self.data.len());
        out.push(self.payload_type);
        out.extend_from_slice(&[0u8; PAYLOAD_HEADER_LEN - 1]);
        out.extend_from_slice(&self.data);
        out
    }

    /// Length of the encrypted frame body this payload produces.
    pub fn boxed_len(&self) -> usize {
        PAYLOAD_HEADER_LEN + self.data.len() + BOX_OVERHEAD
    }

    /// Fails with [`NetworkError::PayloadTooLarge`] if the payload does not
    /// fit into one frame.
    pub fn check_len(&self) -> Result<(), NetworkError> {
        match self.boxed_len() {
            len if len > MAX_PACKET_LEN => Err(NetworkError::PayloadTooLarge(len)),
            _ => Ok(()),
        }
    }

    /// Parses frame plaintext. The reserved gap is ignored.
    pub fn from_plaintext(plain: &[u8]) -> Result<Self, NetworkError> {
        if plain.len() < PAYLOAD_HEADER_LEN {
            return Err(NetworkError::Protocol(format!(
                "payload too short: {} bytes",
                plain.len()
            )));
        }
        Ok(Payload {
            payload_type: plain[0],
            data: plain[PAYLOAD_HEADER_LEN..].to_vec(),
        })
    }

    /// Echo request carrying a big-endian sequence number.
    pub fn echo_request(seq: u32) -> Self {
        Payload::new(PayloadType::EchoRequest, seq.to_be_bytes().to_vec())
    }

    /// Push token registration: `token_type(1) || token(ASCII)`.
    pub fn push_token(payload_type: PayloadType, token_type: u8, token: &str) -> Self {
        let mut data = Vec::with_capacity(1 + token.len());
        data.push(token_type);
        data.extend_from_slice(token.as_bytes());
        Payload::new(payload_type, data)
    }
}

/// Parses the sequence number of an echo reply.
pub fn parse_echo_reply(data: &[u8]) -> Result<u32, NetworkError> {
    let seq: [u8; ECHO_LEN] = data.try_into().map_err(|_| {
        NetworkError::Protocol(format!("bad echo reply length {}", data.len()))
    })?;
    Ok(u32::from_be_bytes(seq))
}

/// Server error notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub reconnect_allowed: bool,
    pub message: String,
}

impl ServerError {
    /// Parses `reconnect_allowed(1) || message(UTF-8)`.
    pub fn parse(data: &[u8]) -> Result<Self, NetworkError> {
        let (flag, text) = data
            .split_first()
            .ok_or_else(|| NetworkError::Protocol("empty error payload".into()))?;
        Ok(ServerError {
            reconnect_allowed: *flag != 0,
            message: String::from_utf8_lossy(text).into_owned(),
        })
    }
}

/// Acknowledgment of a message: `identity(8) || message_id(8)`.
///
/// For outgoing acks the identity is the recipient; for incoming acks it
/// is the original sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageAck {
    pub identity: IdentityId,
    pub message_id: MessageId,
}

impl MessageAck {
    pub const LEN: usize = IDENTITY_LEN + MessageId::LEN;

    pub fn new(identity: IdentityId, message_id: MessageId) -> Self {
        MessageAck {
            identity,
            message_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(self.identity.as_bytes());
        out.extend_from_slice(self.message_id.as_bytes());
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, NetworkError> {
        if data.len() != Self::LEN {
            return Err(NetworkError::Protocol(format!(
                "bad ack length {}",
                data.len()
            )));
        }
        let identity = IdentityId::from_slice(&data[..IDENTITY_LEN])
            .ok_or_else(|| NetworkError::Protocol("bad ack identity".into()))?;
        let message_id = MessageId::from_slice(&data[IDENTITY_LEN..])
            .ok_or_else(|| NetworkError::Protocol("bad ack message id".into()))?;
        Ok(MessageAck::new(identity, message_id))
    }
}
