//! Scripted relay server.
//!
//! Accepts client connections on a loopback port, performs the server side
//! of the handshake and then hands each session to a test-supplied script.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use courier_core::crypto::{random_bytes, KEY_LEN};
use courier_core::identity::IDENTITY_LEN;
use courier_core::network::{
    FrameReader, FrameWriter, NetworkError, NonceCounter, Payload, PayloadType, COOKIE_LEN,
    LOGIN_LEN, VERSION_LEN,
};
use courier_core::{
    BoxedMessage, ConnectionConfig, IdentityId, KeyPair, MessageAck, Nonce, PublicKey, SharedKey,
};

/// One logged-in client session as seen by the server.
pub struct ServerSession {
    pub stream: TcpStream,
    pub client_identity: IdentityId,
    pub client_cookie: [u8; COOKIE_LEN],
    pub client_ephemeral: PublicKey,
    pub version: String,
    reader: FrameReader,
    writer: FrameWriter,
}

impl ServerSession {
    pub fn read_payload(&mut self) -> Result<Payload, NetworkError> {
        self.reader.read_payload(&mut self.stream)
    }

    pub fn send(&mut self, payload: &Payload) -> Result<(), NetworkError> {
        self.writer.write_payload(&mut self.stream, payload)
    }

    pub fn send_incoming(&mut self, message: &BoxedMessage) -> Result<(), NetworkError> {
        self.send(&Payload::new(PayloadType::IncomingMessage, message.to_bytes()))
    }

    pub fn send_ack(&mut self, message: &BoxedMessage) -> Result<(), NetworkError> {
        let ack = MessageAck::new(message.to, message.message_id);
        self.send(&Payload::new(PayloadType::OutgoingMessageAck, ack.to_bytes()))
    }

    pub fn send_error(
        &mut self,
        message: &str,
        reconnect_allowed: bool,
    ) -> Result<(), NetworkError> {
        let mut data = vec![u8::from(reconnect_allowed)];
        data.extend_from_slice(message.as_bytes());
        self.send(&Payload::new(PayloadType::Error, data))
    }

    pub fn send_alert(&mut self, message: &str) -> Result<(), NetworkError> {
        self.send(&Payload::new(PayloadType::Alert, message.as_bytes().to_vec()))
    }

    /// Reads payloads until one of `kind` arrives.
    pub fn expect(&mut self, kind: PayloadType) -> Result<Payload, NetworkError> {
        loop {
            let payload = self.read_payload()?;
            if payload.kind() == Ok(kind) {
                return Ok(payload);
            }
        }
    }

    /// Answers echo requests and collects other payloads until the client
    /// goes away.
    pub fn serve_until_closed(&mut self, mut on_payload: impl FnMut(&mut Self, Payload)) {
        while let Ok(payload) = self.read_payload() {
            if payload.kind() == Ok(PayloadType::EchoRequest) {
                let reply = Payload::new(PayloadType::EchoReply, payload.data.clone());
                if self.send(&reply).is_err() {
                    break;
                }
                continue;
            }
            on_payload(self, payload);
        }
    }

    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Loopback relay that runs `script` for every session, numbered from zero.
pub struct ScriptedServer {
    addr: SocketAddr,
    keys: KeyPair,
    accepted: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub fn start<F>(script: F) -> Self
    where
        F: Fn(usize, ServerSession) + Send + Sync + 'static,
    {
        Self::start_with_keys(KeyPair::generate(), script)
    }

    pub fn start_with_keys<F>(keys: KeyPair, script: F) -> Self
    where
        F: Fn(usize, ServerSession) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);

        let server_keys = keys.clone();
        let counter = accepted.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let keys = server_keys.clone();
                let script = script.clone();
                thread::spawn(move || {
                    if let Ok(session) = accept_login(&mut stream, &keys) {
                        (*script)(index, session);
                    }
                });
            }
        });

        ScriptedServer {
            addr,
            keys,
            accepted,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn public_key(&self) -> PublicKey {
        *self.keys.public_key()
    }

    /// Number of TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Client configuration pointing at this server with short timings.
    pub fn client_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.public_key())
            .with_ports(self.port(), self.port())
            .with_timing(Duration::from_secs(5), Duration::from_secs(60))
            .with_reconnect(2, Duration::from_millis(200))
    }
}

/// Server side of the handshake. The vouch box is not opened.
pub fn accept_login(stream: &mut TcpStream, keys: &KeyPair) -> Result<ServerSession, NetworkError> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    let mut client_hello = [0u8; KEY_LEN + COOKIE_LEN];
    stream.read_exact(&mut client_hello)?;
    let client_ephemeral = PublicKey::from_slice(&client_hello[..KEY_LEN])?;
    let mut client_cookie = [0u8; COOKIE_LEN];
    client_cookie.copy_from_slice(&client_hello[KEY_LEN..]);

    let server_cookie: [u8; COOKIE_LEN] = random_bytes();
    let mut server_nonces = NonceCounter::new(server_cookie);
    let mut client_nonces = NonceCounter::new(client_cookie);
    let server_ephemeral = KeyPair::generate();

    let mut hello_plain = Vec::with_capacity(KEY_LEN + COOKIE_LEN);
    hello_plain.extend_from_slice(server_ephemeral.public_key().as_bytes());
    hello_plain.extend_from_slice(&client_cookie);
    let hello_box = SharedKey::derive(keys.secret_key(), &client_ephemeral)
        .seal(&hello_plain, &server_nonces.next_nonce())?;

    stream.write_all(&server_cookie)?;
    stream.write_all(&hello_box)?;
    stream.flush()?;

    let session_key = SharedKey::derive(server_ephemeral.secret_key(), &client_ephemeral);
    let mut login_box = [0u8; LOGIN_LEN + 16];
    stream.read_exact(&mut login_box)?;
    let login = session_key.open(&login_box, &client_nonces.next_nonce())?;

    let client_identity = IdentityId::from_slice(&login[..IDENTITY_LEN])
        .ok_or_else(|| NetworkError::Protocol("bad login identity".into()))?;
    let version_raw = &login[IDENTITY_LEN..IDENTITY_LEN + VERSION_LEN];
    let version = String::from_utf8_lossy(version_raw)
        .trim_end_matches('\0')
        .to_string();
    let echoed = &login[IDENTITY_LEN + VERSION_LEN..IDENTITY_LEN + VERSION_LEN + COOKIE_LEN];
    if echoed != server_cookie {
        return Err(NetworkError::Handshake("server cookie not echoed".into()));
    }
    let vouch_start = IDENTITY_LEN + VERSION_LEN + COOKIE_LEN;
    Nonce::from_slice(&login[vouch_start..vouch_start + 24])?;

    let ack = session_key.seal(&[0u8; 16], &server_nonces.next_nonce())?;
    stream.write_all(&ack)?;
    stream.flush()?;
    stream.set_read_timeout(None)?;

    let key = Arc::new(session_key);
    Ok(ServerSession {
        stream: stream.try_clone()?,
        client_identity,
        client_cookie,
        client_ephemeral,
        version,
        reader: FrameReader::new(key.clone(), client_nonces),
        writer: FrameWriter::new(key, server_nonces),
    })
}
