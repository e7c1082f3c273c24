//! Boxed (encrypted) message wire form.
//!
//! ```text
//! from(8) to(8) message_id(8) date(u32 LE) flags(1) reserved(3)
//! push_from_name(32, zero padded) nonce(24) box(..)
//! ```

use serde::{Deserialize, Serialize};

use super::error::DecodeError;
use super::flags::MessageFlags;
use super::ids::MessageId;
use crate::crypto::{Nonce, NONCE_LEN};
use crate::identity::{IdentityId, IDENTITY_LEN};

/// Length of the push-from-name field.
pub const PUSH_FROM_NAME_LEN: usize = 32;

/// Bytes preceding the box.
pub const HEADER_LEN: usize =
    IDENTITY_LEN * 2 + MessageId::LEN + 4 + 1 + 3 + PUSH_FROM_NAME_LEN + NONCE_LEN;

/// An encrypted message as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxedMessage {
    pub from: IdentityId,
    pub to: IdentityId,
    pub message_id: MessageId,
    pub date: u32,
    pub flags: MessageFlags,
    pub push_from_name: Option<String>,
    pub nonce: Nonce,
    pub ciphertext: Vec<u8>,
}

impl BoxedMessage {
    /// Serializes to the outgoing-message payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(self.to.as_bytes());
        out.extend_from_slice(self.message_id.as_bytes());
        out.extend_from_slice(&self.date.to_le_bytes());
        out.push(self.flags.bits());
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&encode_push_from_name(self.push_from_name.as_deref()));
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses an incoming-message payload.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() <= HEADER_LEN {
            return Err(DecodeError::drop(format!(
                "boxed message too short: {} bytes",
                data.len()
            )));
        }
        let short = || DecodeError::drop("boxed message truncated");

        let (from, rest) = data.split_at(IDENTITY_LEN);
        let (to, rest) = rest.split_at(IDENTITY_LEN);
        let (message_id, rest) = rest.split_at(MessageId::LEN);
        let (date, rest) = rest.split_at(4);
        let (flags, rest) = rest.split_at(1);
        let (_reserved, rest) = rest.split_at(3);
        let (name, rest) = rest.split_at(PUSH_FROM_NAME_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        Ok(BoxedMessage {
            from: IdentityId::from_slice(from).ok_or_else(short)?,
            to: IdentityId::from_slice(to).ok_or_else(short)?,
            message_id: MessageId::from_slice(message_id).ok_or_else(short)?,
            date: u32::from_le_bytes(date.try_into().map_err(|_| short())?),
            flags: MessageFlags::from_bits_retain(flags[0]),
            push_from_name: decode_push_from_name(name),
            nonce: Nonce::from_slice(nonce).map_err(|_| short())?,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn expects_ack(&self) -> bool {
        !self.flags.contains(MessageFlags::NO_ACK)
    }

    pub fn is_immediate(&self) -> bool {
        self.flags.contains(MessageFlags::IMMEDIATE)
    }
}

/// Truncates to 32 bytes at a character boundary and zero pads.
fn encode_push_from_name(name: Option<&str>) -> [u8; PUSH_FROM_NAME_LEN] {
    let mut out = [0u8; PUSH_FROM_NAME_LEN];
    if let Some(name) = name {
        let mut end = name.len().min(PUSH_FROM_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        out[..end].copy_from_slice(&name.as_bytes()[..end]);
    }
    out
}

fn decode_push_from_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&field[..end]).into_owned())
}
