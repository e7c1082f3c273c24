// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message kinds and the decoded message type.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::flags::{MessageFlags, MessageType};
use super::ids::{BallotId, BlobId, GroupId, MessageId};
use super::json::{BallotData, BallotVote, FileData, VoipData};
use super::location::Location;
use crate::crypto::{Nonce, SymmetricKey};
use crate::identity::IdentityId;

/// Image stored as a blob encrypted with the message's box key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub blob_id: BlobId,
    pub size: u32,
    pub nonce: Nonce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMessage {
    pub duration: u16,
    pub video_blob_id: BlobId,
    pub video_size: u32,
    pub thumbnail_blob_id: BlobId,
    pub thumbnail_size: u32,
    pub key: SymmetricKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMessage {
    pub duration: u16,
    pub blob_id: BlobId,
    pub size: u32,
    pub key: SymmetricKey,
}

/// Blob with its own symmetric key (photos, group images).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub blob_id: BlobId,
    pub size: u32,
    pub key: SymmetricKey,
}

/// Group addressing prefix: creator identity and creator-chosen id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub creator: IdentityId,
    pub group_id: GroupId,
}

/// Delivery receipt status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptType {
    Received,
    Read,
    UserAck,
    UserDecline,
    Other(u8),
}

impl From<u8> for ReceiptType {
    fn from(value: u8) -> Self {
        match value {
            1 => ReceiptType::Received,
            2 => ReceiptType::Read,
            3 => ReceiptType::UserAck,
            4 => ReceiptType::UserDecline,
            other => ReceiptType::Other(other),
        }
    }
}

impl From<ReceiptType> for u8 {
    fn from(value: ReceiptType) -> Self {
        match value {
            ReceiptType::Received => 1,
            ReceiptType::Read => 2,
            ReceiptType::UserAck => 3,
            ReceiptType::UserDecline => 4,
            ReceiptType::Other(other) => other,
        }
    }
}

/// Message content, one variant per message kind.
///
/// Creator fields that are implied by the envelope (the sender for group
/// create, rename, set/delete photo and ballot create; the recipient for
/// group sync requests) are not stored here. See
/// [`AbstractMessage::group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    Text(String),
    Image(ImageMessage),
    Video(VideoMessage),
    Audio(AudioMessage),
    Location(Location),
    File(FileData),
    BallotCreate {
        ballot_id: BallotId,
        data: BallotData,
    },
    BallotVote {
        ballot_creator: IdentityId,
        ballot_id: BallotId,
        votes: Vec<BallotVote>,
    },
    ContactSetPhoto(BlobRef),
    ContactDeletePhoto,
    ContactRequestPhoto,
    GroupCreate {
        group_id: GroupId,
        members: Vec<IdentityId>,
    },
    GroupRename {
        group_id: GroupId,
        name: String,
    },
    GroupLeave(GroupRef),
    GroupSetPhoto {
        group_id: GroupId,
        photo: BlobRef,
    },
    GroupDeletePhoto {
        group_id: GroupId,
    },
    GroupRequestSync {
        group_id: GroupId,
    },
    GroupText {
        group: GroupRef,
        text: String,
    },
    GroupLocation {
        group: GroupRef,
        location: Location,
    },
    GroupImage {
        group: GroupRef,
        image: BlobRef,
    },
    GroupVideo {
        group: GroupRef,
        video: VideoMessage,
    },
    GroupAudio {
        group: GroupRef,
        audio: AudioMessage,
    },
    GroupFile {
        group: GroupRef,
        data: FileData,
    },
    GroupBallotCreate {
        group: GroupRef,
        ballot_id: BallotId,
        data: BallotData,
    },
    GroupBallotVote {
        group: GroupRef,
        ballot_creator: IdentityId,
        ballot_id: BallotId,
        votes: Vec<BallotVote>,
    },
    VoipCallOffer(VoipData),
    VoipCallAnswer(VoipData),
    VoipIceCandidates(VoipData),
    VoipCallHangup(VoipData),
    VoipCallRinging(VoipData),
    DeliveryReceipt {
        receipt: ReceiptType,
        message_ids: Vec<MessageId>,
    },
    TypingIndicator {
        typing: bool,
    },
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Text(_) => MessageType::Text,
            MessageBody::Image(_) => MessageType::Image,
            MessageBody::Video(_) => MessageType::Video,
            MessageBody::Audio(_) => MessageType::Audio,
            MessageBody::Location(_) => MessageType::Location,
            MessageBody::File(_) => MessageType::File,
            MessageBody::BallotCreate { .. } => MessageType::BallotCreate,
            MessageBody::BallotVote { .. } => MessageType::BallotVote,
            MessageBody::ContactSetPhoto(_) => MessageType::ContactSetPhoto,
            MessageBody::ContactDeletePhoto => MessageType::ContactDeletePhoto,
            MessageBody::ContactRequestPhoto => MessageType::ContactRequestPhoto,
            MessageBody::GroupCreate { .. } => MessageType::GroupCreate,
            MessageBody::GroupRename { .. } => MessageType::GroupRename,
            MessageBody::GroupLeave(_) => MessageType::GroupLeave,
            MessageBody::GroupSetPhoto { .. } => MessageType::GroupSetPhoto,
            MessageBody::GroupDeletePhoto { .. } => MessageType::GroupDeletePhoto,
            MessageBody::GroupRequestSync { .. } => MessageType::GroupRequestSync,
            MessageBody::GroupText { .. } => MessageType::GroupText,
            MessageBody::GroupLocation { .. } => MessageType::GroupLocation,
            MessageBody::GroupImage { .. } => MessageType::GroupImage,
            MessageBody::GroupVideo { .. } => MessageType::GroupVideo,
            MessageBody::GroupAudio { .. } => MessageType::GroupAudio,
            MessageBody::GroupFile { .. } => MessageType::GroupFile,
            MessageBody::GroupBallotCreate { .. } => MessageType::GroupBallotCreate,
            MessageBody::GroupBallotVote { .. } => MessageType::GroupBallotVote,
            MessageBody::VoipCallOffer(_) => MessageType::VoipCallOffer,
            MessageBody::VoipCallAnswer(_) => MessageType::VoipCallAnswer,
            MessageBody::VoipIceCandidates(_) => MessageType::VoipIceCandidates,
            MessageBody::VoipCallHangup(_) => MessageType::VoipCallHangup,
            MessageBody::VoipCallRinging(_) => MessageType::VoipCallRinging,
            MessageBody::DeliveryReceipt { .. } => MessageType::DeliveryReceipt,
            MessageBody::TypingIndicator { .. } => MessageType::TypingIndicator,
        }
    }

    /// Flags a freshly created message of this kind carries.
    pub fn default_flags(&self) -> MessageFlags {
        use MessageType as T;
        let kind = self.message_type();
        let mut flags = MessageFlags::empty();

        if matches!(
            kind,
            T::Text
                | T::Image
                | T::Video
                | T::Audio
                | T::Location
                | T::File
                | T::BallotCreate
                | T::GroupText
                | T::GroupLocation
                | T::GroupImage
                | T::GroupVideo
                | T::GroupAudio
                | T::GroupFile
                | T::GroupBallotCreate
                | T::VoipCallOffer
        ) {
            flags |= MessageFlags::PUSH;
        }
        if self.is_group() {
            flags |= MessageFlags::GROUP;
        }
        if matches!(
            kind,
            T::VoipCallOffer
                | T::VoipCallAnswer
                | T::VoipIceCandidates
                | T::VoipCallHangup
                | T::VoipCallRinging
        ) {
            flags |= MessageFlags::VOIP;
        }
        if kind == T::TypingIndicator {
            flags |= MessageFlags::IMMEDIATE | MessageFlags::NO_ACK;
        }
        flags
    }

    /// True for group-scoped kinds.
    pub fn is_group(&self) -> bool {
        matches!(self.message_type().as_byte(), 0x41..=0x4c | 0x50..=0x54)
    }
}

/// A decoded application message with its envelope attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractMessage {
    pub from: IdentityId,
    pub to: IdentityId,
    pub id: MessageId,
    /// Sender's public nickname, if sent.
    pub push_from_name: Option<String>,
    /// Seconds since the Unix epoch.
    pub date: u32,
    pub flags: MessageFlags,
    pub body: MessageBody,
}

impl AbstractMessage {
    /// Creates an outgoing message with a random id, the current time and
    /// the kind's default flags. The sender is filled in on enqueue.
    pub fn new(to: IdentityId, body: MessageBody) -> Self {
        let date = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        AbstractMessage {
            from: IdentityId::from_bytes([0u8; 8]),
            to,
            id: MessageId::random(),
            push_from_name: None,
            date,
            flags: body.default_flags(),
            body,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Group this message belongs to, resolving implied creators.
    pub fn group(&self) -> Option<GroupRef> {
        let implied = |group_id: &GroupId| GroupRef {
            creator: self.from,
            group_id: *group_id,
        };
        match &self.body {
            MessageBody::GroupCreate { group_id, .. }
            | MessageBody::GroupRename { group_id, .. }
            | MessageBody::GroupSetPhoto { group_id, .. }
            | MessageBody::GroupDeletePhoto { group_id } => Some(implied(group_id)),
            MessageBody::GroupRequestSync { group_id } => Some(GroupRef {
                creator: self.to,
                group_id: *group_id,
            }),
            MessageBody::GroupLeave(group)
            | MessageBody::GroupText { group, .. }
            | MessageBody::GroupLocation { group, .. }
            | MessageBody::GroupImage { group, .. }
            | MessageBody::GroupVideo { group, .. }
            | MessageBody::GroupAudio { group, .. }
            | MessageBody::GroupFile { group, .. }
            | MessageBody::GroupBallotCreate { group, .. }
            | MessageBody::GroupBallotVote { group, .. } => Some(*group),
            _ => None,
        }
    }

    /// Creator of the ballot this message refers to.
    pub fn ballot_creator(&self) -> Option<IdentityId> {
        match &self.body {
            MessageBody::BallotCreate { .. } | MessageBody::GroupBallotCreate { .. } => {
                Some(self.from)
            }
            MessageBody::BallotVote { ballot_creator, .. }
            | MessageBody::GroupBallotVote { ballot_creator, .. } => Some(*ballot_creator),
            _ => None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.flags.contains(MessageFlags::IMMEDIATE)
    }

    pub fn expects_ack(&self) -> bool {
        !self.flags.contains(MessageFlags::NO_ACK)
    }
}
