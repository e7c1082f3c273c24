//! Message Codec Tests
//!
//! End-to-end encode/decode of every message kind between two identities,
//! padding invariants and decode failure classification.

mod common;

use common::fixtures::{peer_pair, Peer};
use common::strategies::body_strategy;
use proptest::prelude::*;

use courier_core::crypto::{Nonce, SymmetricKey};
use courier_core::message::{
    encode_body, pad, unpad, AudioMessage, BallotChoice, BallotData, BallotId, BlobId, BlobRef,
    FileData, GroupId, GroupRef, ImageMessage, Location, ReceiptType, RenderingType,
    VideoMessage, VoipData, MAX_TEXT_LEN, MIN_PADDED_LEN,
};
use courier_core::{AbstractMessage, MessageBody, MessageFlags, MessageId, MessageType};

fn blob_ref() -> BlobRef {
    BlobRef {
        blob_id: BlobId::random(),
        size: 48_213,
        key: SymmetricKey::generate(),
    }
}

fn video() -> VideoMessage {
    VideoMessage {
        duration: 93,
        video_blob_id: BlobId::random(),
        video_size: 5_000_000,
        thumbnail_blob_id: BlobId::random(),
        thumbnail_size: 12_000,
        key: SymmetricKey::generate(),
    }
}

fn audio() -> AudioMessage {
    AudioMessage {
        duration: 12,
        blob_id: BlobId::random(),
        size: 40_000,
        key: SymmetricKey::generate(),
    }
}

fn file() -> FileData {
    FileData {
        blob_id: BlobId::random(),
        thumbnail_blob_id: Some(BlobId::random()),
        key: SymmetricKey::generate(),
        mime_type: "application/pdf".into(),
        thumbnail_mime_type: Some("image/jpeg".into()),
        file_name: Some("report.pdf".into()),
        size: 123_456,
        rendering: RenderingType::File,
        caption: Some("Q3 numbers".into()),
        correlation_id: None,
        metadata: None,
    }
}

fn ballot() -> BallotData {
    BallotData {
        description: "Lunch?".into(),
        state: 0,
        assessment: 0,
        kind: 1,
        choice_type: 0,
        choices: vec![
            BallotChoice {
                id: 1,
                name: "Pizza".into(),
                order: 0,
                results: vec![],
            },
            BallotChoice {
                id: 2,
                name: "Sushi".into(),
                order: 1,
                results: vec![],
            },
        ],
        participants: vec![],
    }
}

fn voip() -> VoipData {
    VoipData::parse(r#"{"callId":42,"offer":{"sdpType":"offer","sdp":"v=0"}}"#).unwrap()
}

fn location() -> Location {
    Location {
        latitude: 47.3769,
        longitude: 8.5417,
        accuracy: Some(25.0),
        poi_name: Some("Bahnhof".into()),
        poi_address: Some("Bahnhofplatz 1\n8001 Zurich".into()),
    }
}

/// One sample body for every message kind.
fn sample_bodies(creator: &Peer) -> Vec<MessageBody> {
    let group = GroupRef {
        creator: creator.id(),
        group_id: GroupId::random(),
    };
    vec![
        MessageBody::Text("Hello, Bob".into()),
        MessageBody::Image(ImageMessage {
            blob_id: BlobId::random(),
            size: 1_024,
            nonce: Nonce::random(),
        }),
        MessageBody::Video(video()),
        MessageBody::Audio(audio()),
        MessageBody::Location(location()),
        MessageBody::File(file()),
        MessageBody::BallotCreate {
            ballot_id: BallotId::random(),
            data: ballot(),
        },
        MessageBody::BallotVote {
            ballot_creator: creator.id(),
            ballot_id: BallotId::random(),
            votes: vec![(1, 1), (2, 0)],
        },
        MessageBody::ContactSetPhoto(blob_ref()),
        MessageBody::ContactDeletePhoto,
        MessageBody::ContactRequestPhoto,
        MessageBody::GroupCreate {
            group_id: group.group_id,
            members: vec![creator.id(), "BOBBY002".parse().unwrap()],
        },
        MessageBody::GroupRename {
            group_id: group.group_id,
            name: "Climbing".into(),
        },
        MessageBody::GroupLeave(group),
        MessageBody::GroupSetPhoto {
            group_id: group.group_id,
            photo: blob_ref(),
        },
        MessageBody::GroupDeletePhoto {
            group_id: group.group_id,
        },
        MessageBody::GroupRequestSync {
            group_id: group.group_id,
        },
        MessageBody::GroupText {
            group,
            text: "See you at eight".into(),
        },
        MessageBody::GroupLocation {
            group,
            location: location(),
        },
        MessageBody::GroupImage {
            group,
            image: blob_ref(),
        },
        MessageBody::GroupVideo {
            group,
            video: video(),
        },
        MessageBody::GroupAudio {
            group,
            audio: audio(),
        },
        MessageBody::GroupFile {
            group,
            data: file(),
        },
        MessageBody::GroupBallotCreate {
            group,
            ballot_id: BallotId::random(),
            data: ballot(),
        },
        MessageBody::GroupBallotVote {
            group,
            ballot_creator: creator.id(),
            ballot_id: BallotId::random(),
            votes: vec![(2, 1)],
        },
        MessageBody::VoipCallOffer(voip()),
        MessageBody::VoipCallAnswer(voip()),
        MessageBody::VoipIceCandidates(voip()),
        MessageBody::VoipCallHangup(voip()),
        MessageBody::VoipCallRinging(voip()),
        MessageBody::DeliveryReceipt {
            receipt: ReceiptType::Read,
            message_ids: vec![MessageId::random(), MessageId::random()],
        },
        MessageBody::TypingIndicator { typing: true },
    ]
}

fn outgoing(from: &Peer, to: &Peer, body: MessageBody) -> AbstractMessage {
    let mut message = AbstractMessage::new(to.id(), body);
    message.from = from.id();
    message
}

// =============================================================================
// Round Trips
// =============================================================================

/// Scenario: Every message kind survives encryption and decoding
#[test]
fn test_every_kind_round_trips() {
    let (alice, bob) = peer_pair();
    let bodies = sample_bodies(&alice);

    let kinds: Vec<MessageType> = bodies.iter().map(MessageBody::message_type).collect();
    for kind in MessageType::ALL {
        assert!(kinds.contains(&kind), "no sample for {kind:?}");
    }

    for body in bodies {
        let mut message = outgoing(&alice, &bob, body);
        message.push_from_name = Some("Alice".into());
        let boxed = alice.coder.encode(&message, &alice.nonces).unwrap();
        let decoded = bob.coder.decode(&boxed, false).unwrap();
        assert_eq!(decoded, message, "{:?}", message.message_type());
    }
}

/// Scenario: The boxed wire form preserves every header field
#[test]
fn test_boxed_wire_form_round_trips() {
    let (alice, bob) = peer_pair();
    let mut message = outgoing(&alice, &bob, MessageBody::Text("wire".into()));
    message.push_from_name = Some("Alice".into());
    let boxed = alice.coder.encode(&message, &alice.nonces).unwrap();

    let parsed = courier_core::BoxedMessage::parse(&boxed.to_bytes()).unwrap();
    assert_eq!(parsed, boxed);
    assert_eq!(bob.coder.decode(&parsed, false).unwrap().body, message.body);
}

/// Scenario: Group text may be empty while direct text may not
#[test]
fn test_empty_texts() {
    let (alice, _) = peer_pair();
    assert!(encode_body(&MessageBody::Text(String::new())).is_err());
    let group = GroupRef {
        creator: alice.id(),
        group_id: GroupId::random(),
    };
    assert!(encode_body(&MessageBody::GroupText {
        group,
        text: String::new(),
    })
    .is_ok());
}

/// Scenario: Text at the limit encodes, one byte more does not
#[test]
fn test_text_length_limit() {
    assert!(encode_body(&MessageBody::Text("a".repeat(MAX_TEXT_LEN))).is_ok());
    assert!(encode_body(&MessageBody::Text("a".repeat(MAX_TEXT_LEN + 1))).is_err());
}

// =============================================================================
// Flags
// =============================================================================

/// Scenario: Typing indicators are immediate and never acknowledged
#[test]
fn test_typing_indicator_flags() {
    let flags = MessageBody::TypingIndicator { typing: false }.default_flags();
    assert!(flags.contains(MessageFlags::IMMEDIATE | MessageFlags::NO_ACK));
    assert!(!flags.contains(MessageFlags::PUSH));
}

/// Scenario: Group kinds carry the group flag, direct text only push
#[test]
fn test_group_and_push_flags() {
    let (alice, _) = peer_pair();
    for body in sample_bodies(&alice) {
        let flags = body.default_flags();
        assert_eq!(
            flags.contains(MessageFlags::GROUP),
            body.is_group(),
            "{:?}",
            body.message_type()
        );
    }
    assert_eq!(
        MessageBody::Text("x".into()).default_flags(),
        MessageFlags::PUSH
    );
}

// =============================================================================
// Decode Failures
// =============================================================================

/// Scenario: A message for another identity is dropped
#[test]
fn test_message_for_other_identity_is_dropped() {
    let (alice, bob) = peer_pair();
    let carol = Peer::new("CAROL003");
    carol.knows(&alice);

    let boxed = alice
        .coder
        .encode(&outgoing(&alice, &bob, MessageBody::Text("hi".into())), &alice.nonces)
        .unwrap();
    assert!(carol.coder.decode(&boxed, false).unwrap_err().is_drop());
}

/// Scenario: An unknown sender is retried later
#[test]
fn test_unknown_sender_is_retried() {
    let (alice, bob) = peer_pair();
    bob.contacts.remove(&alice.id());

    let boxed = alice
        .coder
        .encode(&outgoing(&alice, &bob, MessageBody::Text("hi".into())), &alice.nonces)
        .unwrap();
    assert!(!bob.coder.decode(&boxed, false).unwrap_err().is_drop());
}

/// Scenario: A tampered box is dropped
#[test]
fn test_tampered_box_is_dropped() {
    let (alice, bob) = peer_pair();
    let mut boxed = alice
        .coder
        .encode(&outgoing(&alice, &bob, MessageBody::Text("hi".into())), &alice.nonces)
        .unwrap();
    boxed.ciphertext[20] ^= 0x01;
    assert!(bob.coder.decode(&boxed, false).unwrap_err().is_drop());
}

/// Scenario: Encoding to a recipient without a known key fails
#[test]
fn test_encode_without_recipient_key_fails() {
    let alice = Peer::new("ALICE001");
    let bob = Peer::new("BOBBY002");
    let result = alice
        .coder
        .encode(&outgoing(&alice, &bob, MessageBody::Text("hi".into())), &alice.nonces);
    assert!(result.is_err());
}

// =============================================================================
// Padding Properties
// =============================================================================

proptest! {
    /// Padded plaintexts reach the minimum length and unpad to the input.
    #[test]
    fn prop_padding_invariant(data in prop::collection::vec(any::<u8>(), 1..300)) {
        let padded = pad(data.clone());
        prop_assert!(padded.len() >= MIN_PADDED_LEN);
        let count = *padded.last().unwrap() as usize;
        prop_assert!(count >= 1);
        prop_assert!(padded[padded.len() - count..].iter().all(|b| *b as usize == count));
        prop_assert_eq!(unpad(&padded).unwrap(), &data[..]);
    }

    /// Any generated body survives the full encrypt/decrypt path.
    #[test]
    fn prop_body_round_trips(body in body_strategy()) {
        let (alice, bob) = peer_pair();
        let message = outgoing(&alice, &bob, body);
        let boxed = alice.coder.encode(&message, &alice.nonces).unwrap();
        let decoded = bob.coder.decode(&boxed, false).unwrap();
        prop_assert_eq!(decoded.body, message.body);
    }
}
