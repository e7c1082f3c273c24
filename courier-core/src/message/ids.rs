//! Fixed-length opaque identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::random_bytes;

macro_rules! byte_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            /// Reads the id from the first `LEN` bytes of `bytes`.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; $len] = bytes.get(..$len)?.try_into().ok()?;
                Some($name(arr))
            }

            /// Generates a random id.
            pub fn random() -> Self {
                $name(random_bytes())
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Option<Self> {
                let bytes = hex::decode(s.trim()).ok()?;
                if bytes.len() != $len {
                    return None;
                }
                Self::from_slice(&bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = Vec<u8>;

            fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
                <[u8; $len]>::try_from(bytes).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }
    };
}

byte_id!(
    /// Message id. Unique per (sender, id).
    MessageId,
    8
);
byte_id!(
    /// Group id. Unique per (creator, id).
    GroupId,
    8
);
byte_id!(
    /// Ballot id. Unique per (ballot creator, id).
    BallotId,
    8
);
byte_id!(
    /// Blob id assigned by the blob server.
    BlobId,
    16
);
