//! Application messages: kinds, wire forms and the codec.

pub mod body;
pub mod boxed;
pub mod coder;
mod error;
pub mod flags;
pub mod ids;
pub mod json;
pub mod location;

pub use body::{
    AbstractMessage, AudioMessage, BlobRef, GroupRef, ImageMessage, MessageBody, ReceiptType,
    VideoMessage,
};
pub use boxed::BoxedMessage;
pub use coder::{decode_body, encode_body, pad, unpad, MessageCoder, MAX_TEXT_LEN, MIN_PADDED_LEN};
pub use error::{DecodeError, EncodeError};
pub use flags::{MessageFlags, MessageType};
pub use ids::{BallotId, BlobId, GroupId, MessageId};
pub use json::{BallotChoice, BallotData, BallotVote, FileData, RenderingType, VoipData};
pub use location::Location;
