//! Periodic echo requests and echo-timeout detection.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::payload::Payload;
use super::sender::SendQueue;
use super::signal::StopSignal;

/// Echo sequence bookkeeping for one connection.
#[derive(Debug, Default)]
pub(crate) struct EchoTracker {
    last_sent: AtomicU32,
    last_received: AtomicU32,
}

impl EchoTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequence number.
    pub(crate) fn next_seq(&self) -> u32 {
        self.last_sent.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_reply(&self, seq: u32) {
        self.last_received.store(seq, Ordering::SeqCst);
    }

    /// True if a reply for `seq` (or later) has arrived.
    pub(crate) fn is_answered(&self, seq: u32) -> bool {
        self.last_received.load(Ordering::SeqCst) >= seq
    }
}

/// Keepalive worker of one connection.
pub(crate) struct Keepalive {
    stop: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Keepalive {
    /// Sends an echo every `interval`; closes `socket` if no reply arrives
    /// within `timeout`.
    pub(crate) fn spawn(
        interval: Duration,
        timeout: Duration,
        echo: Arc<EchoTracker>,
        queue: SendQueue,
        socket: TcpStream,
    ) -> io::Result<Self> {
        let stop = Arc::new(StopSignal::new());
        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("courier-keepalive".into())
            .spawn(move || loop {
                if worker_stop.wait(interval) {
                    break;
                }
                let seq = echo.next_seq();
                debug!(seq, "Sending echo request");
                if !queue.send(Payload::echo_request(seq)) {
                    break;
                }
                if worker_stop.wait(timeout) {
                    break;
                }
                if !echo.is_answered(seq) {
                    warn!(seq, "No echo reply, closing socket");
                    let _ = socket.shutdown(Shutdown::Both);
                    break;
                }
            })?;

        Ok(Keepalive {
            stop,
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(mut self) {
        self.stop.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
