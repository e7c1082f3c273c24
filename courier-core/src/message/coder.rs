// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Codec
//!
//! Plaintext layout inside the box: `type (1) || body || padding`, where the
//! padding is 1..=255 bytes that all hold the padding length. Padded
//! plaintexts are never shorter than [`MIN_PADDED_LEN`].

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use super::body::{
    AbstractMessage, AudioMessage, BlobRef, GroupRef, ImageMessage, MessageBody, ReceiptType,
    VideoMessage,
};
use super::boxed::BoxedMessage;
use super::error::{DecodeError, EncodeError};
use super::flags::MessageType;
use super::ids::{BallotId, BlobId, GroupId, MessageId};
use super::json::{parse_votes, BallotData, BallotVote, FileData, VoipData};
use super::location::Location;
use crate::contacts::ContactStore;
use crate::crypto::{Nonce, SymmetricKey, KEY_LEN, NONCE_LEN};
use crate::identity::{IdentityId, IdentityStore, IDENTITY_LEN};
use crate::nonce::NonceFactory;

/// Minimum length of a padded plaintext.
pub const MIN_PADDED_LEN: usize = 32;

/// Maximum encoded text length in bytes.
pub const MAX_TEXT_LEN: usize = 3500;

const GROUP_REF_LEN: usize = IDENTITY_LEN + GroupId::LEN;
const BLOB_REF_LEN: usize = BlobId::LEN + 4 + KEY_LEN;
const IMAGE_LEN: usize = BlobId::LEN + 4 + NONCE_LEN;
const VIDEO_LEN: usize = 2 + BlobId::LEN + 4 + BlobId::LEN + 4 + KEY_LEN;
const AUDIO_LEN: usize = 2 + BlobId::LEN + 4 + KEY_LEN;

/// Appends self-describing padding.
pub fn pad(mut data: Vec<u8>) -> Vec<u8> {
    let mut count: usize = rand::thread_rng().gen_range(1..=254);
    if data.len() + count < MIN_PADDED_LEN {
        count = MIN_PADDED_LEN - data.len();
    }
    data.resize(data.len() + count, count as u8);
    data
}

/// Strips padding, returning `type || body`.
pub fn unpad(data: &[u8]) -> Result<&[u8], DecodeError> {
    if data.len() <= 1 {
        return Err(DecodeError::drop("empty message"));
    }
    let count = data[data.len() - 1] as usize;
    if count >= data.len() {
        return Err(DecodeError::drop("bad message padding"));
    }
    Ok(&data[..data.len() - count])
}

/// Encodes `type || body` without padding.
pub fn encode_body(body: &MessageBody) -> Result<Vec<u8>, EncodeError> {
    let mut out = vec![body.message_type().as_byte()];
    match body {
        MessageBody::Text(text) => {
            check_text(text)?;
            out.extend_from_slice(text.as_bytes());
        }
        MessageBody::Image(image) => put_image(&mut out, image),
        MessageBody::Video(video) => put_video(&mut out, video),
        MessageBody::Audio(audio) => put_audio(&mut out, audio),
        MessageBody::Location(location) => out.extend_from_slice(location.to_text().as_bytes()),
        MessageBody::File(data) => out.extend_from_slice(serde_json::to_string(data)?.as_bytes()),
        MessageBody::BallotCreate { ballot_id, data } => {
            out.extend_from_slice(ballot_id.as_bytes());
            out.extend_from_slice(serde_json::to_string(data)?.as_bytes());
        }
        MessageBody::BallotVote {
            ballot_creator,
            ballot_id,
            votes,
        } => put_vote(&mut out, ballot_creator, ballot_id, votes)?,
        MessageBody::ContactSetPhoto(photo) => put_blob_ref(&mut out, photo),
        MessageBody::ContactDeletePhoto | MessageBody::ContactRequestPhoto => {}
        MessageBody::GroupCreate { group_id, members } => {
            if members.is_empty() {
                return Err(EncodeError::Invalid("group create without members".into()));
            }
            out.extend_from_slice(group_id.as_bytes());
            for member in members {
                out.extend_from_slice(member.as_bytes());
            }
        }
        MessageBody::GroupRename { group_id, name } => {
            out.extend_from_slice(group_id.as_bytes());
            out.extend_from_slice(name.as_bytes());
        }
        MessageBody::GroupLeave(group) => put_group(&mut out, group),
        MessageBody::GroupSetPhoto { group_id, photo } => {
            out.extend_from_slice(group_id.as_bytes());
            put_blob_ref(&mut out, photo);
        }
        MessageBody::GroupDeletePhoto { group_id } | MessageBody::GroupRequestSync { group_id } => {
            out.extend_from_slice(group_id.as_bytes());
        }
        MessageBody::GroupText { group, text } => {
            if text.len() > MAX_TEXT_LEN {
                return Err(EncodeError::TextTooLong(text.len()));
            }
            put_group(&mut out, group);
            out.extend_from_slice(text.as_bytes());
        }
        MessageBody::GroupLocation { group, location } => {
            put_group(&mut out, group);
            out.extend_from_slice(location.to_text().as_bytes());
        }
        MessageBody::GroupImage { group, image } => {
            put_group(&mut out, group);
            put_blob_ref(&mut out, image);
        }
        MessageBody::GroupVideo { group, video } => {
            put_group(&mut out, group);
            put_video(&mut out, video);
        }
        MessageBody::GroupAudio { group, audio } => {
            put_group(&mut out, group);
            put_audio(&mut out, audio);
        }
        MessageBody::GroupFile { group, data } => {
            put_group(&mut out, group);
            out.extend_from_slice(serde_json::to_string(data)?.as_bytes());
        }
        MessageBody::GroupBallotCreate {
            group,
            ballot_id,
            data,
        } => {
            put_group(&mut out, group);
            out.extend_from_slice(ballot_id.as_bytes());
            out.extend_from_slice(serde_json::to_string(data)?.as_bytes());
        }
        MessageBody::GroupBallotVote {
            group,
            ballot_creator,
            ballot_id,
            votes,
        } => {
            put_group(&mut out, group);
            put_vote(&mut out, ballot_creator, ballot_id, votes)?;
        }
        MessageBody::VoipCallOffer(data)
        | MessageBody::VoipCallAnswer(data)
        | MessageBody::VoipIceCandidates(data)
        | MessageBody::VoipCallHangup(data)
        | MessageBody::VoipCallRinging(data) => {
            out.extend_from_slice(serde_json::to_string(data)?.as_bytes());
        }
        MessageBody::DeliveryReceipt {
            receipt,
            message_ids,
        } => {
            if message_ids.is_empty() {
                return Err(EncodeError::Invalid("delivery receipt without ids".into()));
            }
            out.push(u8::from(*receipt));
            for id in message_ids {
                out.extend_from_slice(id.as_bytes());
            }
        }
        MessageBody::TypingIndicator { typing } => out.push(u8::from(*typing)),
    }
    Ok(out)
}

fn check_text(text: &str) -> Result<(), EncodeError> {
    if text.is_empty() {
        return Err(EncodeError::Invalid("empty text".into()));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(EncodeError::TextTooLong(text.len()));
    }
    Ok(())
}

fn put_group(out: &mut Vec<u8>, group: &GroupRef) {
    out.extend_from_slice(group.creator.as_bytes());
    out.extend_from_slice(group.group_id.as_bytes());
}

fn put_blob_ref(out: &mut Vec<u8>, blob: &BlobRef) {
    out.extend_from_slice(blob.blob_id.as_bytes());
    out.extend_from_slice(&blob.size.to_le_bytes());
    out.extend_from_slice(blob.key.as_bytes());
}

fn put_image(out: &mut Vec<u8>, image: &ImageMessage) {
    out.extend_from_slice(image.blob_id.as_bytes());
    out.extend_from_slice(&image.size.to_le_bytes());
    out.extend_from_slice(image.nonce.as_bytes());
}

fn put_video(out: &mut Vec<u8>, video: &VideoMessage) {
    out.extend_from_slice(&video.duration.to_le_bytes());
    out.extend_from_slice(video.video_blob_id.as_bytes());
    out.extend_from_slice(&video.video_size.to_le_bytes());
    out.extend_from_slice(video.thumbnail_blob_id.as_bytes());
    out.extend_from_slice(&video.thumbnail_size.to_le_bytes());
    out.extend_from_slice(video.key.as_bytes());
}

fn put_audio(out: &mut Vec<u8>, audio: &AudioMessage) {
    out.extend_from_slice(&audio.duration.to_le_bytes());
    out.extend_from_slice(audio.blob_id.as_bytes());
    out.extend_from_slice(&audio.size.to_le_bytes());
    out.extend_from_slice(audio.key.as_bytes());
}

fn put_vote(
    out: &mut Vec<u8>,
    ballot_creator: &IdentityId,
    ballot_id: &BallotId,
    votes: &[BallotVote],
) -> Result<(), EncodeError> {
    out.extend_from_slice(ballot_creator.as_bytes());
    out.extend_from_slice(ballot_id.as_bytes());
    out.extend_from_slice(serde_json::to_string(votes)?.as_bytes());
    Ok(())
}

/// Cursor over a message body with length-checked reads.
struct Reader<'a> {
    data: &'a [u8],
    kind: MessageType,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], kind: MessageType) -> Self {
        Reader { data, kind }
    }

    fn bad_length(&self) -> DecodeError {
        DecodeError::drop(format!("bad length for {:?} message", self.kind))
    }

    fn exact(&self, len: usize) -> Result<(), DecodeError> {
        if self.data.len() != len {
            return Err(self.bad_length());
        }
        Ok(())
    }

    fn at_least(&self, len: usize) -> Result<(), DecodeError> {
        if self.data.len() < len {
            return Err(self.bad_length());
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < n {
            return Err(self.bad_length());
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn identity(&mut self) -> Result<IdentityId, DecodeError> {
        let bytes = self.take(IDENTITY_LEN)?;
        IdentityId::from_slice(bytes).ok_or_else(|| self.bad_length())
    }

    fn group_id(&mut self) -> Result<GroupId, DecodeError> {
        let bytes = self.take(GroupId::LEN)?;
        GroupId::from_slice(bytes).ok_or_else(|| self.bad_length())
    }

    fn ballot_id(&mut self) -> Result<BallotId, DecodeError> {
        let bytes = self.take(BallotId::LEN)?;
        BallotId::from_slice(bytes).ok_or_else(|| self.bad_length())
    }

    fn message_id(&mut self) -> Result<MessageId, DecodeError> {
        let bytes = self.take(MessageId::LEN)?;
        MessageId::from_slice(bytes).ok_or_else(|| self.bad_length())
    }

    fn blob_id(&mut self) -> Result<BlobId, DecodeError> {
        let bytes = self.take(BlobId::LEN)?;
        BlobId::from_slice(bytes).ok_or_else(|| self.bad_length())
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn key(&mut self) -> Result<SymmetricKey, DecodeError> {
        let bytes = self.take(KEY_LEN)?;
        SymmetricKey::from_slice(bytes).map_err(|_| self.bad_length())
    }

    fn nonce(&mut self) -> Result<Nonce, DecodeError> {
        let bytes = self.take(NONCE_LEN)?;
        Nonce::from_slice(bytes).map_err(|_| self.bad_length())
    }

    fn group(&mut self) -> Result<GroupRef, DecodeError> {
        Ok(GroupRef {
            creator: self.identity()?,
            group_id: self.group_id()?,
        })
    }

    fn blob_ref(&mut self) -> Result<BlobRef, DecodeError> {
        Ok(BlobRef {
            blob_id: self.blob_id()?,
            size: self.u32()?,
            key: self.key()?,
        })
    }

    fn video(&mut self) -> Result<VideoMessage, DecodeError> {
        Ok(VideoMessage {
            duration: self.u16()?,
            video_blob_id: self.blob_id()?,
            video_size: self.u32()?,
            thumbnail_blob_id: self.blob_id()?,
            thumbnail_size: self.u32()?,
            key: self.key()?,
        })
    }

    fn audio(&mut self) -> Result<AudioMessage, DecodeError> {
        Ok(AudioMessage {
            duration: self.u16()?,
            blob_id: self.blob_id()?,
            size: self.u32()?,
            key: self.key()?,
        })
    }

    /// Remaining bytes as text. Invalid UTF-8 is replaced.
    fn rest_text(&mut self) -> String {
        let text = String::from_utf8_lossy(self.data).into_owned();
        self.data = &[];
        text
    }
}

/// Decodes `type || body` (padding already removed).
pub fn decode_body(data: &[u8]) -> Result<MessageBody, DecodeError> {
    let (&type_byte, body) = data
        .split_first()
        .ok_or_else(|| DecodeError::drop("empty message"))?;
    let kind = MessageType::try_from(type_byte)
        .map_err(|b| DecodeError::drop(format!("unsupported message type 0x{:02x}", b)))?;
    let mut r = Reader::new(body, kind);

    let decoded = match kind {
        MessageType::Text => {
            r.at_least(1)?;
            MessageBody::Text(r.rest_text())
        }
        MessageType::Image => {
            r.exact(IMAGE_LEN)?;
            MessageBody::Image(ImageMessage {
                blob_id: r.blob_id()?,
                size: r.u32()?,
                nonce: r.nonce()?,
            })
        }
        MessageType::Video => {
            r.exact(VIDEO_LEN)?;
            MessageBody::Video(r.video()?)
        }
        MessageType::Audio => {
            r.exact(AUDIO_LEN)?;
            MessageBody::Audio(r.audio()?)
        }
        MessageType::Location => {
            r.at_least(3)?;
            MessageBody::Location(Location::parse(&r.rest_text(), false)?)
        }
        MessageType::File => MessageBody::File(FileData::parse(&r.rest_text())?),
        MessageType::BallotCreate => {
            let ballot_id = r.ballot_id()?;
            MessageBody::BallotCreate {
                ballot_id,
                data: BallotData::parse(&r.rest_text())?,
            }
        }
        MessageType::BallotVote => {
            let ballot_creator = r.identity()?;
            let ballot_id = r.ballot_id()?;
            MessageBody::BallotVote {
                ballot_creator,
                ballot_id,
                votes: parse_votes(&r.rest_text())?,
            }
        }
        MessageType::ContactSetPhoto => {
            r.exact(BLOB_REF_LEN)?;
            MessageBody::ContactSetPhoto(r.blob_ref()?)
        }
        MessageType::ContactDeletePhoto => {
            r.exact(0)?;
            MessageBody::ContactDeletePhoto
        }
        MessageType::ContactRequestPhoto => {
            r.exact(0)?;
            MessageBody::ContactRequestPhoto
        }
        MessageType::GroupCreate => {
            r.at_least(GroupId::LEN + IDENTITY_LEN)?;
            if (body.len() - GroupId::LEN) % IDENTITY_LEN != 0 {
                return Err(r.bad_length());
            }
            let group_id = r.group_id()?;
            let mut members = Vec::with_capacity((body.len() - GroupId::LEN) / IDENTITY_LEN);
            while !r.data.is_empty() {
                members.push(r.identity()?);
            }
            MessageBody::GroupCreate { group_id, members }
        }
        MessageType::GroupRename => {
            let group_id = r.group_id()?;
            MessageBody::GroupRename {
                group_id,
                name: r.rest_text(),
            }
        }
        MessageType::GroupLeave => {
            r.exact(GROUP_REF_LEN)?;
            MessageBody::GroupLeave(r.group()?)
        }
        MessageType::GroupSetPhoto => {
            r.exact(GroupId::LEN + BLOB_REF_LEN)?;
            MessageBody::GroupSetPhoto {
                group_id: r.group_id()?,
                photo: r.blob_ref()?,
            }
        }
        MessageType::GroupDeletePhoto => {
            r.exact(GroupId::LEN)?;
            MessageBody::GroupDeletePhoto {
                group_id: r.group_id()?,
            }
        }
        MessageType::GroupRequestSync => {
            r.exact(GroupId::LEN)?;
            MessageBody::GroupRequestSync {
                group_id: r.group_id()?,
            }
        }
        MessageType::GroupText => {
            let group = r.group()?;
            MessageBody::GroupText {
                group,
                text: r.rest_text(),
            }
        }
        MessageType::GroupLocation => {
            r.at_least(GROUP_REF_LEN + 3)?;
            let group = r.group()?;
            MessageBody::GroupLocation {
                group,
                location: Location::parse(&r.rest_text(), true)?,
            }
        }
        MessageType::GroupImage => {
            r.exact(GROUP_REF_LEN + BLOB_REF_LEN)?;
            MessageBody::GroupImage {
                group: r.group()?,
                image: r.blob_ref()?,
            }
        }
        MessageType::GroupVideo => {
            r.exact(GROUP_REF_LEN + VIDEO_LEN)?;
            MessageBody::GroupVideo {
                group: r.group()?,
                video: r.video()?,
            }
        }
        MessageType::GroupAudio => {
            r.exact(GROUP_REF_LEN + AUDIO_LEN)?;
            MessageBody::GroupAudio {
                group: r.group()?,
                audio: r.audio()?,
            }
        }
        MessageType::GroupFile => {
            let group = r.group()?;
            MessageBody::GroupFile {
                group,
                data: FileData::parse(&r.rest_text())?,
            }
        }
        MessageType::GroupBallotCreate => {
            let group = r.group()?;
            let ballot_id = r.ballot_id()?;
            MessageBody::GroupBallotCreate {
                group,
                ballot_id,
                data: BallotData::parse(&r.rest_text())?,
            }
        }
        MessageType::GroupBallotVote => {
            let group = r.group()?;
            let ballot_creator = r.identity()?;
            let ballot_id = r.ballot_id()?;
            MessageBody::GroupBallotVote {
                group,
                ballot_creator,
                ballot_id,
                votes: parse_votes(&r.rest_text())?,
            }
        }
        MessageType::VoipCallOffer => MessageBody::VoipCallOffer(VoipData::parse(&r.rest_text())?),
        MessageType::VoipCallAnswer => {
            MessageBody::VoipCallAnswer(VoipData::parse(&r.rest_text())?)
        }
        MessageType::VoipIceCandidates => {
            MessageBody::VoipIceCandidates(VoipData::parse(&r.rest_text())?)
        }
        MessageType::VoipCallHangup => {
            MessageBody::VoipCallHangup(VoipData::parse(&r.rest_text())?)
        }
        MessageType::VoipCallRinging => {
            MessageBody::VoipCallRinging(VoipData::parse(&r.rest_text())?)
        }
        MessageType::DeliveryReceipt => {
            r.at_least(1 + MessageId::LEN)?;
            if (body.len() - 1) % MessageId::LEN != 0 {
                return Err(r.bad_length());
            }
            let receipt = ReceiptType::from(r.take(1)?[0]);
            let mut message_ids = Vec::with_capacity((body.len() - 1) / MessageId::LEN);
            while !r.data.is_empty() {
                message_ids.push(r.message_id()?);
            }
            MessageBody::DeliveryReceipt {
                receipt,
                message_ids,
            }
        }
        MessageType::TypingIndicator => {
            r.exact(1)?;
            MessageBody::TypingIndicator {
                typing: r.take(1)?[0] != 0,
            }
        }
    };
    Ok(decoded)
}

/// Encrypts and decrypts application messages with the local identity.
pub struct MessageCoder {
    identities: Arc<dyn IdentityStore>,
    contacts: Arc<dyn ContactStore>,
}

impl MessageCoder {
    pub fn new(identities: Arc<dyn IdentityStore>, contacts: Arc<dyn ContactStore>) -> Self {
        MessageCoder {
            identities,
            contacts,
        }
    }

    pub fn identity_store(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    /// Pads, encrypts and wraps `message` for its recipient.
    ///
    /// Immediate messages do not persist their nonce.
    pub fn encode(
        &self,
        message: &AbstractMessage,
        nonces: &NonceFactory,
    ) -> Result<BoxedMessage, EncodeError> {
        let identity = self.identities.identity().ok_or(EncodeError::NoIdentity)?;
        let peer = self
            .contacts
            .public_key(&message.to, false)
            .ok_or_else(|| EncodeError::MissingPublicKey(message.to.to_string()))?;

        let plaintext = pad(encode_body(&message.body)?);
        let nonce = nonces.next(!message.is_immediate())?;
        let ciphertext = identity.encrypt_for(&plaintext, &nonce, &peer)?;

        Ok(BoxedMessage {
            from: message.from,
            to: message.to,
            message_id: message.id,
            date: message.date,
            flags: message.flags,
            push_from_name: message.push_from_name.clone(),
            nonce,
            ciphertext,
        })
    }

    /// Decrypts and parses an incoming boxed message.
    ///
    /// With `fetch` the contact store may look up unknown senders remotely.
    pub fn decode(&self, boxed: &BoxedMessage, fetch: bool) -> Result<AbstractMessage, DecodeError> {
        let identity = self
            .identities
            .identity()
            .ok_or_else(|| DecodeError::retry("no identity configured"))?;
        if boxed.to != identity.id() {
            return Err(DecodeError::drop("message is not for own identity"));
        }

        let peer = self
            .contacts
            .public_key(&boxed.from, fetch)
            .ok_or_else(|| DecodeError::retry(format!("missing public key for {}", boxed.from)))?;

        let plaintext = identity
            .decrypt_from(&boxed.ciphertext, &boxed.nonce, &peer)
            .map_err(|_| DecodeError::drop(format!("decryption of message from {} failed", boxed.from)))?;

        let data = unpad(&plaintext)?;
        debug!(len = data.len(), "Effective message length");
        let body = decode_body(data)?;

        Ok(AbstractMessage {
            from: boxed.from,
            to: boxed.to,
            id: boxed.message_id,
            push_from_name: boxed.push_from_name.clone(),
            date: boxed.date,
            flags: boxed.flags,
            body,
        })
    }
}
