//! Proptest Strategies
//!
//! Reusable strategies for property-based tests.

use proptest::prelude::*;

use courier_core::message::{GroupId, Location, MessageBody};
use courier_core::IdentityId;

// ============================================================
// Identifier Strategies
// ============================================================

/// Strategy for generating valid identity ids.
pub fn identity_id_strategy() -> impl Strategy<Value = IdentityId> {
    "[A-Z0-9]{8}".prop_map(|s| s.parse().expect("valid identity id"))
}

pub fn group_id_strategy() -> impl Strategy<Value = GroupId> {
    any::<[u8; 8]>().prop_map(GroupId::from_bytes)
}

// ============================================================
// Content Strategies
// ============================================================

/// Strategy for non-empty message texts within the text limit.
pub fn text_strategy() -> impl Strategy<Value = String> {
    "\\PC{1,200}"
}

/// Strategy for backup passwords that satisfy the minimum length.
pub fn password_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9!?]{8,32}"
}

/// Strategy for locations with in-range coordinates.
pub fn location_strategy() -> impl Strategy<Value = Location> {
    (
        -90.0f64..=90.0,
        -180.0f64..=180.0,
        proptest::option::of(0.0f64..1000.0),
        proptest::option::of("[a-zA-Z ]{1,20}".prop_map(|s| (s.clone(), s))),
    )
        .prop_map(|(latitude, longitude, accuracy, poi)| Location {
            latitude,
            longitude,
            accuracy,
            poi_name: poi.as_ref().map(|(name, _)| name.clone()),
            poi_address: poi.map(|(_, address)| format!("{address}\nCity")),
        })
}

/// Strategy over a mix of message bodies with variable sizes.
pub fn body_strategy() -> impl Strategy<Value = MessageBody> {
    prop_oneof![
        text_strategy().prop_map(MessageBody::Text),
        location_strategy().prop_map(MessageBody::Location),
        (group_id_strategy(), "[a-zA-Z ]{0,40}")
            .prop_map(|(group_id, name)| MessageBody::GroupRename { group_id, name }),
        (group_id_strategy(), prop::collection::vec(identity_id_strategy(), 1..20))
            .prop_map(|(group_id, members)| MessageBody::GroupCreate { group_id, members }),
        any::<bool>().prop_map(|typing| MessageBody::TypingIndicator { typing }),
    ]
}
