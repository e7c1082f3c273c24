//! Listening for and sending messages.

use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use courier_core::message::ReceiptType;
use courier_core::network::CallbackListener;
use courier_core::{
    AbstractMessage, Connection, ConnectionEvent, DecodingProcessor, IdentityId, IdentityStore,
    MemoryContactStore, MemoryIdentityStore, MessageBody, MessageCoder, MessageQueue,
    MessageSink, NonceFactory, PublicKey, SqliteNonceStore,
};
use tracing::info;

use crate::config::CliConfig;

struct Session {
    connection: Arc<Connection>,
    queue: Arc<MessageQueue>,
    coder: Arc<MessageCoder>,
}

impl Session {
    fn open(config: &CliConfig, contacts: MemoryContactStore) -> Result<Self> {
        let identity = config.load_identity()?;
        let connection_config = config.connection_config()?;
        fs::create_dir_all(&config.data_dir)?;

        let identities: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new(identity));
        let nonces = NonceFactory::new(Arc::new(SqliteNonceStore::open(config.nonce_db_path())?));
        let coder = Arc::new(MessageCoder::new(identities.clone(), Arc::new(contacts)));
        let connection = Arc::new(Connection::new(connection_config, identities, nonces.clone()));

        let sink: Arc<dyn MessageSink> = connection.clone();
        let queue = Arc::new(MessageQueue::new(coder.clone(), nonces, &sink));
        let queue_path = config.queue_path();
        if queue_path.exists() {
            let restored = queue.load(File::open(&queue_path)?)?;
            info!(restored, "Loaded pending messages");
        }

        connection.add_listener(queue.clone());
        connection.add_listener(Arc::new(CallbackListener::new(print_event)));
        Ok(Session {
            connection,
            queue,
            coder,
        })
    }

    fn close(self, config: &CliConfig) -> Result<()> {
        self.connection.stop();
        let file = File::create(config.queue_path())?;
        self.queue.save(BufWriter::new(file))?;
        if !self.queue.is_empty() {
            println!("{} message(s) still pending", self.queue.len());
        }
        Ok(())
    }
}

fn print_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::StateChanged { state, address } => match address {
            Some(address) => eprintln!("[{state}] {address}"),
            None => eprintln!("[{state}]"),
        },
        ConnectionEvent::ServerError {
            message,
            reconnect_allowed,
        } => eprintln!("Server error: {message} (reconnect allowed: {reconnect_allowed})"),
        ConnectionEvent::ServerAlert { message } => eprintln!("Server alert: {message}"),
        ConnectionEvent::MessageAck(_) | ConnectionEvent::QueueSendComplete => {}
    }
}

fn print_message(message: &AbstractMessage) -> bool {
    let sender = message
        .push_from_name
        .as_deref()
        .map(|name| format!("{} ({name})", message.from))
        .unwrap_or_else(|| message.from.to_string());
    match &message.body {
        MessageBody::Text(text) => println!("{sender}: {text}"),
        MessageBody::GroupText { group, text } => {
            println!("{sender} in {}: {text}", group.group_id)
        }
        MessageBody::DeliveryReceipt {
            receipt,
            message_ids,
        } => {
            let status = match receipt {
                ReceiptType::Received => "received",
                ReceiptType::Read => "read",
                ReceiptType::UserAck => "acknowledged",
                ReceiptType::UserDecline => "declined",
                ReceiptType::Other(_) => "unknown status",
            };
            println!("{sender}: {} message(s) {status}", message_ids.len());
        }
        MessageBody::TypingIndicator { .. } => {}
        other => println!("{sender}: {other:?}"),
    }
    true
}

/// Connects and prints incoming messages.
pub fn listen(config: &CliConfig, seconds: Option<u64>) -> Result<()> {
    let session = Session::open(config, config.load_contacts()?)?;
    session
        .connection
        .set_message_processor(Arc::new(DecodingProcessor::new(
            session.coder.clone(),
            Arc::new(print_message),
        )));
    session.connection.start()?;

    match seconds {
        Some(seconds) => thread::sleep(Duration::from_secs(seconds)),
        None => loop {
            thread::park();
        },
    }

    session.close(config)
}

/// Sends a text message and waits for the server acknowledgment.
pub fn send_text(
    config: &CliConfig,
    to: &str,
    text: &str,
    peer_key: Option<&str>,
    timeout: u64,
) -> Result<()> {
    let recipient: IdentityId = to.parse().context("Invalid recipient identity")?;
    let contacts = config.load_contacts()?;
    if let Some(key) = peer_key {
        contacts.add(recipient, PublicKey::from_hex(key).context("Invalid peer key")?);
    }

    let session = Session::open(config, contacts)?;
    let boxed = session
        .queue
        .enqueue(AbstractMessage::new(recipient, MessageBody::Text(text.to_string())))?;
    session.connection.start()?;

    let deadline = Instant::now() + Duration::from_secs(timeout);
    while session.queue.is_queued(&boxed.message_id) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
    }

    if session.queue.is_queued(&boxed.message_id) {
        println!("Message {} queued, not yet acknowledged", boxed.message_id);
    } else {
        println!("Message {} delivered to server", boxed.message_id);
    }
    session.close(config)
}
