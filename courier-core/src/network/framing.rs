//! Length-prefixed encrypted frames.
//!
//! Wire form: `length(u16 LE) || box(length)`, where the box decrypts to a
//! [`Payload`] plaintext. Each direction owns its own [`NonceCounter`].

use std::io::{Read, Write};
use std::sync::Arc;

use crate::crypto::SharedKey;

use super::nonce_counter::NonceCounter;
use super::payload::{Payload, PAYLOAD_HEADER_LEN};
use super::NetworkError;

/// Encrypts and writes frames.
pub struct FrameWriter {
    key: Arc<SharedKey>,
    nonces: NonceCounter,
}

impl FrameWriter {
    pub fn new(key: Arc<SharedKey>, nonces: NonceCounter) -> Self {
        FrameWriter { key, nonces }
    }

    /// Encrypts `payload` and writes it as one frame.
    ///
    /// Oversized payloads are rejected before a nonce is consumed, so the
    /// stream stays in sync with the peer.
    pub fn write_payload<W: Write>(
        &mut self,
        writer: &mut W,
        payload: &Payload,
    ) -> Result<(), NetworkError> {
        payload.check_len()?;
        let plaintext = payload.to_plaintext();
        let ciphertext = self.key.seal(&plaintext, &self.nonces.next_nonce())?;
        let mut frame = Vec::with_capacity(2 + ciphertext.len());
        frame.extend_from_slice(&(ciphertext.len() as u16).to_le_bytes());
        frame.extend_from_slice(&ciphertext);
        writer.write_all(&frame)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads and decrypts frames.
pub struct FrameReader {
    key: Arc<SharedKey>,
    nonces: NonceCounter,
}

impl FrameReader {
    pub fn new(key: Arc<SharedKey>, nonces: NonceCounter) -> Self {
        FrameReader { key, nonces }
    }

    /// Blocks until one complete frame has been read and decrypted.
    pub fn read_payload<R: Read>(&mut self, reader: &mut R) -> Result<Payload, NetworkError> {
        let mut len_bytes = [0u8; 2];
        reader.read_exact(&mut len_bytes)?;
        let len = u16::from_le_bytes(len_bytes) as usize;
        if len < PAYLOAD_HEADER_LEN {
            return Err(NetworkError::Protocol(format!("frame too short: {len} bytes")));
        }

        let mut ciphertext = vec![0u8; len];
        reader.read_exact(&mut ciphertext)?;
        let plaintext = self.key.open(&ciphertext, &self.nonces.next_nonce())?;
        Payload::from_plaintext(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::crypto::KeyPair;
    use crate::network::payload::{PayloadType, MAX_PACKET_LEN};

    fn key_pair() -> (Arc<SharedKey>, Arc<SharedKey>) {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        (
            Arc::new(SharedKey::derive(a.secret_key(), b.public_key())),
            Arc::new(SharedKey::derive(b.secret_key(), a.public_key())),
        )
    }

    #[test]
    fn test_frames_in_sequence() {
        let (ka, kb) = key_pair();
        let mut writer = FrameWriter::new(ka, NonceCounter::new([3; 16]));
        let mut reader = FrameReader::new(kb, NonceCounter::new([3; 16]));

        let mut wire = Vec::new();
        for seq in 0..3 {
            writer.write_payload(&mut wire, &Payload::echo_request(seq)).unwrap();
        }

        let mut cursor = Cursor::new(wire);
        for seq in 0..3 {
            let payload = reader.read_payload(&mut cursor).unwrap();
            assert_eq!(payload, Payload::echo_request(seq));
        }
    }

    #[test]
    fn test_out_of_sync_counter_fails() {
        let (ka, kb) = key_pair();
        let mut writer = FrameWriter::new(ka, NonceCounter::new([3; 16]));
        let mut reader = FrameReader::new(kb, NonceCounter::new([4; 16]));

        let mut wire = Vec::new();
        writer.write_payload(&mut wire, &Payload::echo_request(1)).unwrap();
        assert!(matches!(
            reader.read_payload(&mut Cursor::new(wire)),
            Err(NetworkError::Decryption)
        ));
    }

    #[test]
    fn test_oversized_payload_rejected_without_consuming_nonce() {
        let (ka, kb) = key_pair();
        let mut writer = FrameWriter::new(ka, NonceCounter::new([0; 16]));
        let mut reader = FrameReader::new(kb, NonceCounter::new([0; 16]));

        let mut wire = Vec::new();
        let big = Payload::new(PayloadType::OutgoingMessage, vec![0u8; MAX_PACKET_LEN]);
        assert!(matches!(
            writer.write_payload(&mut wire, &big),
            Err(NetworkError::PayloadTooLarge(_))
        ));
        assert!(wire.is_empty());

        writer.write_payload(&mut wire, &Payload::echo_request(7)).unwrap();
        let payload = reader.read_payload(&mut Cursor::new(wire)).unwrap();
        assert_eq!(payload, Payload::echo_request(7));
    }

    #[test]
    fn test_short_frame_is_protocol_error() {
        let (_, kb) = key_pair();
        let mut reader = FrameReader::new(kb, NonceCounter::new([0; 16]));
        let wire = vec![3u8, 0, 1, 2, 3];
        assert!(matches!(
            reader.read_payload(&mut Cursor::new(wire)),
            Err(NetworkError::Protocol(_))
        ));
    }
}
