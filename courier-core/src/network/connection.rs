// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Connection
//!
//! Maintains a single authenticated connection to the relay on a dedicated
//! thread: resolve, connect, handshake, receive until failure, tear down,
//! back off, repeat. Outbound frames go through the sender worker; echo
//! keepalives through the keepalive worker.

use std::collections::HashSet;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::crypto::KeyPair;
use crate::identity::{Identity, IdentityStore};
use crate::message::{BoxedMessage, MessageType};
use crate::nonce::NonceFactory;

use super::config::ConnectionConfig;
use super::events::{ConnectionEvent, ConnectionListener, ConnectionState, ListenerRegistry};
use super::handshake::{ClientHandshake, EphemeralKey};
use super::keepalive::{EchoTracker, Keepalive};
use super::payload::{parse_echo_reply, MessageAck, Payload, PayloadType, ServerError};
use super::processor::MessageProcessor;
use super::resolver::{candidate_addresses, AddressCache, Resolver, SystemResolver};
use super::sender::Sender;
use super::signal::StopSignal;
use super::NetworkError;

/// Server error text that is ignored for its first occurrences.
const ANOTHER_CONNECTION: &str = "Another connection";
/// How many "another connection" errors are ignored per run.
const MAX_IGNORED_ANOTHER_CONNECTION: u32 = 5;

/// Client connection to the relay.
pub struct Connection {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: ConnectionConfig,
    identities: Arc<dyn IdentityStore>,
    nonces: NonceFactory,
    resolver: Arc<dyn Resolver>,
    processor: RwLock<Option<Arc<dyn MessageProcessor>>>,
    listeners: ListenerRegistry,
    running: AtomicBool,
    stop: StopSignal,
    state: RwLock<ConnectionState>,
    addresses: Mutex<AddressCache>,
    socket: Mutex<Option<TcpStream>>,
    sender: Mutex<Option<Sender>>,
    echo: Arc<EchoTracker>,
    ephemeral: Mutex<Option<EphemeralKey>>,
    reconnect_attempts: AtomicU32,
    connection_number: AtomicU32,
    another_connection_count: AtomicU32,
    alerts: Mutex<HashSet<String>>,
    push_token: Mutex<Option<(u8, String)>>,
}

/// Workers tied to one live socket.
#[derive(Default)]
struct LiveConnection {
    keepalive: Option<Keepalive>,
}

impl Connection {
    /// Creates a connection using the system resolver.
    pub fn new(
        config: ConnectionConfig,
        identities: Arc<dyn IdentityStore>,
        nonces: NonceFactory,
    ) -> Self {
        Self::with_resolver(config, identities, nonces, Arc::new(SystemResolver))
    }

    pub fn with_resolver(
        config: ConnectionConfig,
        identities: Arc<dyn IdentityStore>,
        nonces: NonceFactory,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Connection {
            inner: Arc::new(Inner {
                config,
                identities,
                nonces,
                resolver,
                processor: RwLock::new(None),
                listeners: ListenerRegistry::new(),
                running: AtomicBool::new(false),
                stop: StopSignal::new(),
                state: RwLock::new(ConnectionState::Disconnected),
                addresses: Mutex::new(AddressCache::new()),
                socket: Mutex::new(None),
                sender: Mutex::new(None),
                echo: Arc::new(EchoTracker::new()),
                ephemeral: Mutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                connection_number: AtomicU32::new(0),
                another_connection_count: AtomicU32::new(0),
                alerts: Mutex::new(HashSet::new()),
                push_token: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Sets the processor for incoming messages and server notices.
    ///
    /// Without a processor incoming messages are not acknowledged.
    pub fn set_message_processor(&self, processor: Arc<dyn MessageProcessor>) {
        *self.inner.processor.write() = Some(processor);
    }

    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Starts the connection thread. No-op if it is already running.
    pub fn start(&self) -> Result<(), NetworkError> {
        let mut thread = self.thread.lock();
        if let Some(handle) = thread.as_ref() {
            if !handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(handle) = thread.take() {
            let _ = handle.join();
        }

        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.stop.reset();
        let inner = self.inner.clone();
        let handle = thread::Builder::new()
            .name("courier-connection".into())
            .spawn(move || inner.run())?;
        *thread = Some(handle);
        Ok(())
    }

    /// Stops the connection and waits for the thread to exit.
    ///
    /// Safe to call from any thread; closing the socket unblocks a pending
    /// read.
    pub fn stop(&self) {
        info!("Stopping connection");
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.stop.trigger();
        if let Some(socket) = self.inner.socket.lock().as_ref() {
            let _ = socket.shutdown(Shutdown::Both);
        }

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Number of connection attempts made so far.
    pub fn connection_number(&self) -> u32 {
        self.inner.connection_number.load(Ordering::SeqCst)
    }

    /// Failed attempts since the last successful login.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Address of the current connect candidate.
    pub fn current_address(&self) -> Option<SocketAddr> {
        self.inner.addresses.lock().current()
    }

    /// Queues a payload on the sender. Returns false when not logged in.
    pub fn send_payload(&self, payload: Payload) -> bool {
        self.inner.send_payload(payload)
    }

    /// Sends a boxed message as an outgoing-message payload.
    pub fn send_boxed_message(&self, message: &BoxedMessage) -> bool {
        debug!(to = %message.to, id = %message.message_id, "Sending message");
        self.send_payload(Payload::new(PayloadType::OutgoingMessage, message.to_bytes()))
    }

    /// Stores and registers a push token.
    ///
    /// Sends the token as push and VoIP push token and clears the server
    /// side push filter. A token too large for one frame is rejected and
    /// not stored.
    pub fn set_push_token(&self, token_type: u8, token: &str) -> Result<(), NetworkError> {
        let push = Payload::push_token(PayloadType::PushToken, token_type, token);
        push.check_len()?;
        *self.inner.push_token.lock() = Some((token_type, token.to_string()));
        if self.state() != ConnectionState::LoggedIn {
            return Err(NetworkError::NotConnected);
        }

        let sent = self.send_payload(push)
            && self.send_payload(Payload::push_token(
                PayloadType::VoipPushToken,
                token_type,
                token,
            ))
            && self.send_payload(Payload::new(PayloadType::PushAllowedIdentities, vec![0u8]));
        if !sent {
            return Err(NetworkError::NotConnected);
        }
        info!(token_type, "Push token sent");
        Ok(())
    }

    /// Last push token passed to [`Connection::set_push_token`].
    pub fn push_token(&self) -> Option<(u8, String)> {
        self.inner.push_token.lock().clone()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        let address = self.addresses.lock().current();
        info!(%state, ?address, "Connection state changed");
        self.listeners.dispatch(&ConnectionEvent::StateChanged { state, address });
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send_payload(&self, payload: Payload) -> bool {
        if self.state() != ConnectionState::LoggedIn {
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(payload),
            None => false,
        }
    }

    fn run(&self) {
        info!("Connection thread started");
        self.another_connection_count.store(0, Ordering::SeqCst);

        while self.is_running() {
            let ephemeral = self.ephemeral_key();
            let mut live = LiveConnection::default();
            if let Err(e) = self.connect_and_serve(&ephemeral, &mut live) {
                if self.is_running() {
                    warn!(error = %e, "Connection failed");
                    if self.state() != ConnectionState::LoggedIn {
                        self.addresses.lock().advance();
                    }
                }
            }
            self.teardown(live);

            if !self.is_running() {
                break;
            }

            let attempts = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
            let delay = self.config.reconnect_delay(attempts);
            info!(?delay, attempt = attempts + 1, "Waiting before reconnect");
            if self.stop.wait(delay) {
                break;
            }
        }
        info!("Connection thread ended");
    }

    /// Returns the cached ephemeral key pair, regenerating it when expired.
    fn ephemeral_key(&self) -> KeyPair {
        let mut cached = self.ephemeral.lock();
        let max_age = self.config.ephemeral_key_max_age();
        if let Some(key) = cached.as_ref().filter(|k| k.is_fresh(max_age)) {
            return key.key_pair().clone();
        }
        debug!("Generating new ephemeral key pair");
        let key = EphemeralKey::generate();
        let pair = key.key_pair().clone();
        *cached = Some(key);
        pair
    }

    fn refresh_addresses(&self, identity: &Identity) -> Result<(), NetworkError> {
        let host = self.config.server_host(identity.server_group());
        match self.resolver.resolve(&host) {
            Ok(ips) => {
                let candidates =
                    candidate_addresses(ips, self.config.server_port, self.config.server_port_alt);
                if !candidates.is_empty() {
                    self.addresses.lock().update(candidates);
                }
            }
            Err(e) => warn!(%host, error = %e, "Address resolution failed"),
        }
        if self.addresses.lock().is_empty() {
            return Err(NetworkError::Resolution(format!("no addresses for {host}")));
        }
        Ok(())
    }

    fn connect_and_serve(
        &self,
        ephemeral: &KeyPair,
        live: &mut LiveConnection,
    ) -> Result<(), NetworkError> {
        let identity = self.identities.identity().ok_or(NetworkError::NoIdentity)?;
        self.refresh_addresses(&identity)?;
        let number = self.connection_number.fetch_add(1, Ordering::SeqCst) + 1;
        let address = self
            .addresses
            .lock()
            .current()
            .ok_or_else(|| NetworkError::Resolution("empty address list".into()))?;

        self.set_state(ConnectionState::Connecting);
        info!(%address, number, "Connecting");
        let timeout = self.config.connect_timeout(address.is_ipv6());
        let mut stream = TcpStream::connect_timeout(&address, timeout)?;
        *self.socket.lock() = Some(stream.try_clone()?);
        if !self.is_running() {
            return Err(NetworkError::Stopped);
        }
        self.set_state(ConnectionState::Connected);

        let _ = stream.set_nodelay(true);
        stream.set_read_timeout(Some(self.config.read_timeout()))?;
        stream.set_write_timeout(Some(self.config.read_timeout()))?;
        let session =
            ClientHandshake::new(&identity, ephemeral, &self.config).perform(&mut stream)?;
        stream.set_read_timeout(None)?;
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let (mut reader, writer) = session.into_codec();
        let sender = Sender::spawn(stream.try_clone()?, writer)?;
        let queue = sender.queue();
        *self.sender.lock() = Some(sender);
        live.keepalive = Some(Keepalive::spawn(
            self.config.keepalive_interval(),
            self.config.read_timeout(),
            self.echo.clone(),
            queue,
            stream.try_clone()?,
        )?);
        self.set_state(ConnectionState::LoggedIn);

        while self.is_running() {
            let payload = reader.read_payload(&mut stream)?;
            self.process_payload(payload)?;
        }
        Ok(())
    }

    fn teardown(&self, mut live: LiveConnection) {
        if let Some(keepalive) = live.keepalive.take() {
            keepalive.stop();
        }
        let sender = self.sender.lock().take();
        if let Some(sender) = sender {
            sender.shutdown();
        }
        if let Some(socket) = self.socket.lock().take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn process_payload(&self, payload: Payload) -> Result<(), NetworkError> {
        let kind = match payload.kind() {
            Ok(kind) => kind,
            Err(byte) => {
                warn!(payload_type = byte, "Unknown payload type");
                return Ok(());
            }
        };
        debug!(?kind, len = payload.data.len(), "Received payload");

        match kind {
            PayloadType::EchoReply => {
                let seq = parse_echo_reply(&payload.data)?;
                self.echo.record_reply(seq);
            }
            PayloadType::Error => self.handle_server_error(ServerError::parse(&payload.data)?),
            PayloadType::Alert => {
                self.handle_server_alert(String::from_utf8_lossy(&payload.data).into_owned())
            }
            PayloadType::OutgoingMessageAck => {
                let ack = MessageAck::parse(&payload.data)?;
                debug!(to = %ack.identity, id = %ack.message_id, "Message ack");
                self.listeners.dispatch(&ConnectionEvent::MessageAck(ack));
            }
            PayloadType::IncomingMessage => self.handle_incoming_message(&payload.data)?,
            PayloadType::QueueSendComplete => {
                info!("Server queue drained");
                self.listeners.dispatch(&ConnectionEvent::QueueSendComplete);
            }
            other => warn!(?other, "Unexpected payload type from server"),
        }
        Ok(())
    }

    fn handle_server_error(&self, err: ServerError) {
        error!(message = %err.message, reconnect_allowed = err.reconnect_allowed, "Server error");

        if err.message.contains(ANOTHER_CONNECTION) {
            let ignored = self.another_connection_count.load(Ordering::SeqCst);
            if ignored < MAX_IGNORED_ANOTHER_CONNECTION {
                self.another_connection_count.store(ignored + 1, Ordering::SeqCst);
                return;
            }
        }

        if let Some(processor) = self.processor.read().clone() {
            processor.process_server_error(&err.message, err.reconnect_allowed);
        }
        self.listeners.dispatch(&ConnectionEvent::ServerError {
            message: err.message,
            reconnect_allowed: err.reconnect_allowed,
        });

        if !err.reconnect_allowed {
            warn!("Server does not allow reconnecting, stopping");
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn handle_server_alert(&self, message: String) {
        info!(%message, "Server alert");
        if !self.alerts.lock().insert(message.clone()) {
            return;
        }
        if let Some(processor) = self.processor.read().clone() {
            processor.process_server_alert(&message);
        }
        self.listeners.dispatch(&ConnectionEvent::ServerAlert { message });
    }

    fn handle_incoming_message(&self, data: &[u8]) -> Result<(), NetworkError> {
        if data.len() < crate::message::boxed::HEADER_LEN {
            return Err(NetworkError::Protocol(format!(
                "bad incoming message length {}",
                data.len()
            )));
        }

        let boxed = match BoxedMessage::parse(data) {
            Ok(boxed) => boxed,
            Err(e) => {
                warn!(error = %e, "Unparsable incoming message");
                return Ok(());
            }
        };
        info!(from = %boxed.from, id = %boxed.message_id, "Incoming message");

        let Some(processor) = self.processor.read().clone() else {
            return Ok(());
        };

        let ack = match self.nonces.exists(&boxed.nonce) {
            Ok(true) => {
                info!(id = %boxed.message_id, "Duplicate message, acknowledging again");
                true
            }
            Ok(false) => {
                let result = processor.process_incoming(&boxed);
                let remember = result.processed
                    && matches!(result.message_type, Some(t) if t != MessageType::TypingIndicator);
                if remember {
                    if let Err(e) = self.nonces.store(&boxed.nonce) {
                        warn!(error = %e, "Failed to store incoming nonce");
                    }
                }
                result.processed
            }
            Err(e) => {
                warn!(error = %e, "Nonce lookup failed");
                false
            }
        };

        if ack && boxed.expects_ack() {
            self.send_incoming_ack(&boxed);
        }
        Ok(())
    }

    fn send_incoming_ack(&self, boxed: &BoxedMessage) {
        let ack = MessageAck::new(boxed.from, boxed.message_id);
        if !self.send_payload(Payload::new(PayloadType::IncomingMessageAck, ack.to_bytes())) {
            warn!(id = %boxed.message_id, "Could not send message ack");
        }
    }
}
