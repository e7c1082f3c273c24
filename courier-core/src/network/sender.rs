//! Outbound worker: encrypts and writes frames one at a time.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::framing::FrameWriter;
use super::payload::Payload;
use super::NetworkError;

enum Outgoing {
    Payload(Payload),
    Shutdown,
}

/// Cloneable handle for queueing payloads on the sender.
#[derive(Clone)]
pub(crate) struct SendQueue {
    tx: mpsc::Sender<Outgoing>,
}

impl SendQueue {
    /// Queues `payload`. Returns false if the worker has exited.
    pub(crate) fn send(&self, payload: Payload) -> bool {
        self.tx.send(Outgoing::Payload(payload)).is_ok()
    }
}

/// Owns the sender thread of one connection.
pub(crate) struct Sender {
    queue: SendQueue,
    handle: Option<JoinHandle<()>>,
}

impl Sender {
    /// Starts the worker writing to `stream`.
    ///
    /// A write failure shuts the socket down so that the receive loop
    /// observes the broken connection.
    pub(crate) fn spawn(mut stream: TcpStream, mut writer: FrameWriter) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("courier-sender".into())
            .spawn(move || {
                for outgoing in rx {
                    let payload = match outgoing {
                        Outgoing::Payload(payload) => payload,
                        Outgoing::Shutdown => break,
                    };
                    match writer.write_payload(&mut stream, &payload) {
                        Ok(()) => debug!(payload_type = payload.payload_type, "Sent payload"),
                        Err(NetworkError::PayloadTooLarge(len)) => {
                            warn!(len, "Dropping oversized payload");
                        }
                        Err(e) => {
                            warn!(error = %e, "Send failed, closing socket");
                            let _ = stream.shutdown(Shutdown::Both);
                            break;
                        }
                    }
                }
                debug!("Sender stopped");
            })?;

        Ok(Sender {
            queue: SendQueue { tx },
            handle: Some(handle),
        })
    }

    pub(crate) fn queue(&self) -> SendQueue {
        self.queue.clone()
    }

    pub(crate) fn send(&self, payload: Payload) -> bool {
        self.queue.send(payload)
    }

    /// Stops the worker after already queued payloads are written.
    pub(crate) fn shutdown(mut self) {
        let _ = self.queue.tx.send(Outgoing::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
