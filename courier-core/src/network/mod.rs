// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Module
//!
//! Authenticated, encrypted connection to the message relay: handshake,
//! framing, keepalive, reconnection and payload dispatch.

mod config;
mod connection;
mod error;
mod events;
mod framing;
mod handshake;
mod keepalive;
mod nonce_counter;
mod payload;
mod processor;
mod resolver;
mod sender;
mod signal;

pub use config::{ConnectionConfig, DEFAULT_ALT_PORT, DEFAULT_PORT};
pub use connection::Connection;
pub use error::NetworkError;
pub use events::{
    CallbackListener, ConnectionEvent, ConnectionListener, ConnectionState, ListenerRegistry,
};
pub use framing::{FrameReader, FrameWriter};
pub use handshake::{
    ClientHandshake, EphemeralKey, Session, LOGIN_ACK_LEN, LOGIN_LEN, SERVER_HELLO_LEN,
    VERSION_LEN,
};
pub use nonce_counter::{NonceCounter, COOKIE_LEN};
pub use payload::{
    parse_echo_reply, MessageAck, Payload, PayloadType, ServerError, MAX_PACKET_LEN,
    PAYLOAD_HEADER_LEN,
};
pub use processor::{DecodingProcessor, MessageHandler, MessageProcessor, ProcessIncomingResult};
pub use resolver::{candidate_addresses, AddressCache, Resolver, StaticResolver, SystemResolver};
