//! Identities, coders and recording helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use courier_core::network::{ConnectionEvent, ConnectionListener, ConnectionState};
use courier_core::{
    BoxedMessage, Identity, IdentityId, IdentityStore, MemoryContactStore, MemoryIdentityStore,
    MemoryNonceStore, MessageCoder, MessageSink, NonceFactory, SecretKey,
};

/// One side of a conversation with its own stores.
pub struct Peer {
    pub identity: Identity,
    pub identities: Arc<MemoryIdentityStore>,
    pub contacts: Arc<MemoryContactStore>,
    pub nonces: NonceFactory,
    pub coder: Arc<MessageCoder>,
}

impl Peer {
    pub fn new(id: &str) -> Self {
        let identity = identity(id);
        let identities = Arc::new(MemoryIdentityStore::new(identity.clone()));
        let contacts = Arc::new(MemoryContactStore::new());
        let coder = Arc::new(MessageCoder::new(identities.clone(), contacts.clone()));
        Peer {
            identity,
            identities,
            contacts,
            nonces: memory_nonces(),
            coder,
        }
    }

    pub fn id(&self) -> IdentityId {
        self.identity.id()
    }

    /// Makes `other`'s key known to this peer.
    pub fn knows(&self, other: &Peer) {
        self.contacts.add(other.id(), *other.identity.public_key());
    }

    pub fn identity_store(&self) -> Arc<dyn IdentityStore> {
        self.identities.clone()
    }
}

/// Two peers that know each other.
pub fn peer_pair() -> (Peer, Peer) {
    let alice = Peer::new("ALICE001");
    let bob = Peer::new("BOBBY002");
    alice.knows(&bob);
    bob.knows(&alice);
    (alice, bob)
}

pub fn identity(id: &str) -> Identity {
    let id: IdentityId = id.parse().expect("valid identity id");
    Identity::new(id, SecretKey::generate(), "0a")
}

pub fn memory_nonces() -> NonceFactory {
    NonceFactory::new(Arc::new(MemoryNonceStore::new()))
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// =============================================================================
// Message sink
// =============================================================================

/// Sink that records sent messages instead of writing to a socket.
#[derive(Default)]
pub struct MockSink {
    logged_in: AtomicBool,
    failing: AtomicBool,
    sent: Mutex<Vec<BoxedMessage>>,
}

impl MockSink {
    pub fn new(logged_in: bool) -> Arc<Self> {
        let sink = MockSink::default();
        sink.logged_in.store(logged_in, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Makes every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<BoxedMessage> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl MessageSink for MockSink {
    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn send_boxed_message(&self, message: &BoxedMessage) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(message.clone());
        true
    }
}

// =============================================================================
// Event recording
// =============================================================================

/// Listener that keeps every event it sees.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(EventLog::default())
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().clone()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ConnectionEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Number of times `state` was entered.
    pub fn count_state(&self, state: ConnectionState) -> usize {
        self.states().iter().filter(|s| **s == state).count()
    }

    pub fn count(&self, predicate: impl Fn(&ConnectionEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl ConnectionListener for EventLog {
    fn on_event(&self, event: &ConnectionEvent) {
        self.events.lock().push(event.clone());
    }
}
