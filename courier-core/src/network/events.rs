//! Connection Events
//!
//! State changes, acknowledgments and server notices, delivered to
//! registered listeners.

use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::payload::MessageAck;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// Socket connect in progress.
    Connecting,
    /// Socket open, handshake in progress.
    Connected,
    /// Handshake complete; payloads may be sent.
    LoggedIn,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::LoggedIn => "logged in",
        };
        f.write_str(name)
    }
}

/// Events emitted by a [`super::Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection state changed.
    StateChanged {
        state: ConnectionState,
        /// Address of the current candidate, if any.
        address: Option<SocketAddr>,
    },

    /// The server acknowledged an outgoing message.
    MessageAck(MessageAck),

    /// The server reported an error.
    ServerError {
        message: String,
        reconnect_allowed: bool,
    },

    /// The server sent an alert. Each text is delivered once per connection.
    ServerAlert { message: String },

    /// The server finished delivering queued messages.
    QueueSendComplete,
}

/// Connection listener trait.
pub trait ConnectionListener: Send + Sync {
    fn on_event(&self, event: &ConnectionEvent);
}

/// Closure-based listener.
pub struct CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        CallbackListener { callback }
    }
}

impl<F> ConnectionListener for CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectionEvent) {
        (self.callback)(event);
    }
}

/// Registry of listeners.
///
/// Dispatch runs on a snapshot, so listeners may add or remove listeners
/// from within a callback. A panicking listener is logged and skipped.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ConnectionListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ConnectionListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Returns true if the listener was registered.
    pub fn remove(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn dispatch(&self, event: &ConnectionEvent) {
        let snapshot = self.listeners.read().clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                warn!(?event, "Connection listener panicked");
            }
        }
    }
}
