//! Message header flags and type bytes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Flag bits carried in the boxed message header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MessageFlags: u8 {
        /// Recipient should receive a push notification.
        const PUSH = 0x01;
        /// Do not queue on the server if the recipient is offline.
        const IMMEDIATE = 0x02;
        /// Server will not acknowledge this message.
        const NO_ACK = 0x04;
        /// Group-scoped message.
        const GROUP = 0x10;
        /// VoIP signaling message.
        const VOIP = 0x20;
        /// Recipient must not send delivery receipts.
        const NO_DELIVERY_RECEIPTS = 0x80;
    }
}

impl Default for MessageFlags {
    fn default() -> Self {
        MessageFlags::empty()
    }
}

/// Message type byte, the first byte of every decrypted body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Text = 0x01,
    Image = 0x02,
    Location = 0x10,
    Video = 0x13,
    Audio = 0x14,
    BallotCreate = 0x15,
    BallotVote = 0x16,
    File = 0x17,
    ContactSetPhoto = 0x18,
    ContactDeletePhoto = 0x19,
    ContactRequestPhoto = 0x1a,
    GroupText = 0x41,
    GroupLocation = 0x42,
    GroupImage = 0x43,
    GroupVideo = 0x44,
    GroupAudio = 0x45,
    GroupFile = 0x46,
    GroupCreate = 0x4a,
    GroupRename = 0x4b,
    GroupLeave = 0x4c,
    GroupSetPhoto = 0x50,
    GroupRequestSync = 0x51,
    GroupBallotCreate = 0x52,
    GroupBallotVote = 0x53,
    GroupDeletePhoto = 0x54,
    VoipCallOffer = 0x60,
    VoipCallAnswer = 0x61,
    VoipIceCandidates = 0x62,
    VoipCallHangup = 0x63,
    VoipCallRinging = 0x64,
    DeliveryReceipt = 0x80,
    TypingIndicator = 0x90,
}

impl MessageType {
    pub const ALL: [MessageType; 32] = [
        MessageType::Text,
        MessageType::Image,
        MessageType::Location,
        MessageType::Video,
        MessageType::Audio,
        MessageType::BallotCreate,
        MessageType::BallotVote,
        MessageType::File,
        MessageType::ContactSetPhoto,
        MessageType::ContactDeletePhoto,
        MessageType::ContactRequestPhoto,
        MessageType::GroupText,
        MessageType::GroupLocation,
        MessageType::GroupImage,
        MessageType::GroupVideo,
        MessageType::GroupAudio,
        MessageType::GroupFile,
        MessageType::GroupCreate,
        MessageType::GroupRename,
        MessageType::GroupLeave,
        MessageType::GroupSetPhoto,
        MessageType::GroupRequestSync,
        MessageType::GroupBallotCreate,
        MessageType::GroupBallotVote,
        MessageType::GroupDeletePhoto,
        MessageType::VoipCallOffer,
        MessageType::VoipCallAnswer,
        MessageType::VoipIceCandidates,
        MessageType::VoipCallHangup,
        MessageType::VoipCallRinging,
        MessageType::DeliveryReceipt,
        MessageType::TypingIndicator,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_byte() == byte)
            .ok_or(byte)
    }
}
