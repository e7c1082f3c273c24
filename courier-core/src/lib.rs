//! Courier Core Library
//!
//! Transport and message codec core of the Courier end-to-end encrypted
//! messenger: relay connection, message formats, replay protection and the
//! outgoing delivery queue.

#[cfg(feature = "blob")]
pub mod blob;
pub mod contacts;
pub mod crypto;
pub mod identity;
pub mod message;
pub mod network;
pub mod nonce;
pub mod queue;

#[cfg(feature = "blob")]
pub use blob::{BlobConfig, BlobError, BlobLoader, BlobUploader};
pub use contacts::{ContactStore, MemoryContactStore};
pub use crypto::{CryptoError, KeyPair, Nonce, PublicKey, SecretKey, SharedKey, SymmetricKey};
pub use identity::{
    BackupError, Identity, IdentityBackup, IdentityError, IdentityId, IdentityStore,
    MemoryIdentityStore,
};
pub use message::{
    AbstractMessage, BoxedMessage, DecodeError, EncodeError, MessageBody, MessageCoder,
    MessageFlags, MessageId, MessageType,
};
pub use network::{
    Connection, ConnectionConfig, ConnectionEvent, ConnectionListener, ConnectionState,
    DecodingProcessor, MessageAck, MessageHandler, MessageProcessor, NetworkError,
};
pub use nonce::{MemoryNonceStore, NonceError, NonceFactory, NonceStore, SqliteNonceStore};
pub use queue::{MessageQueue, MessageSink, QueueError};
