//! Frame struct and outbound frame builder.
//!
//! A [`Frame`] holds the still-obfuscated payload of one inbound message
//! with the length prefix stripped. Decoding is left to the caller so the
//! reader never needs to know about the cipher.
//!
//! # Example
//!
//! ```
//! use kasa_transport::protocol::{build_frame, PREFIX_SIZE};
//!
//! let bytes = build_frame(br#"{"system":{"get_sysinfo":{}}}"#).unwrap();
//! assert_eq!(bytes.len(), PREFIX_SIZE + 29);
//! assert_eq!(&bytes[..PREFIX_SIZE], &[0, 0, 0, 29]);
//! ```

use bytes::Bytes;

use super::cipher::AutokeyCipher;
use super::wire_format::{encode_length_prefix, ABSOLUTE_MAX_PAYLOAD_SIZE, PREFIX_SIZE};
use crate::error::{KasaError, Result};

/// A complete inbound frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Payload length announced by the prefix.
    pub payload_length: u32,
    /// Obfuscated payload bytes (prefix excluded).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from its obfuscated payload.
    pub fn new(payload_length: u32, payload: Bytes) -> Self {
        debug_assert_eq!(payload.len(), payload_length as usize);
        Self {
            payload_length,
            payload,
        }
    }

    /// Get a reference to the obfuscated payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload into plaintext.
    pub fn decode(&self) -> Vec<u8> {
        AutokeyCipher::decode(&self.payload)
    }

    /// Consume the frame and decode its payload without a second buffer
    /// when the payload is uniquely owned.
    pub fn into_plaintext(self) -> Vec<u8> {
        let mut plaintext = Vec::from(self.payload);
        AutokeyCipher::decode_in_place(&mut plaintext);
        plaintext
    }

    /// Decode the payload into a UTF-8 string.
    pub fn decode_to_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.decode())?)
    }
}

/// Build a complete outbound frame: length prefix then obfuscated payload.
///
/// # Errors
///
/// Returns `MalformedLength` if the plaintext is longer than a `u32` can describe.
pub fn build_frame(plaintext: &[u8]) -> Result<Vec<u8>> {
    let payload_length =
        u32::try_from(plaintext.len()).map_err(|_| KasaError::MalformedLength {
            declared: plaintext.len() as u64,
            max: ABSOLUTE_MAX_PAYLOAD_SIZE as u64,
        })?;

    let mut buf = Vec::with_capacity(PREFIX_SIZE + plaintext.len());
    buf.extend_from_slice(&encode_length_prefix(payload_length));
    buf.extend_from_slice(plaintext);
    AutokeyCipher::encode_in_place(&mut buf[PREFIX_SIZE..]);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_length_prefix;

    #[test]
    fn test_build_frame_layout() {
        let bytes = build_frame(b"AB").unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 2, 0xEA, 0xA8]);
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let bytes = build_frame(b"").unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_build_frame_prefix_counts_payload_only() {
        let plaintext = vec![b'x'; 300];
        let bytes = build_frame(&plaintext).unwrap();

        assert_eq!(bytes.len(), PREFIX_SIZE + 300);
        assert_eq!(decode_length_prefix(&bytes), Some(300));
    }

    #[test]
    fn test_frame_decode() {
        let bytes = build_frame(br#"{"system":{"error":0}}"#).unwrap();
        let frame = Frame::new(
            (bytes.len() - PREFIX_SIZE) as u32,
            Bytes::copy_from_slice(&bytes[PREFIX_SIZE..]),
        );

        assert_eq!(frame.payload().len(), frame.payload_length as usize);
        assert_eq!(frame.decode(), br#"{"system":{"error":0}}"#);
        assert_eq!(frame.decode_to_string().unwrap(), r#"{"system":{"error":0}}"#);
        assert_eq!(frame.into_plaintext(), br#"{"system":{"error":0}}"#);
    }

    #[test]
    fn test_frame_decode_invalid_utf8() {
        let mut payload = vec![0xFF, 0xFE];
        AutokeyCipher::encode_in_place(&mut payload);
        let frame = Frame::new(2, Bytes::from(payload));

        assert!(matches!(
            frame.decode_to_string(),
            Err(KasaError::InvalidUtf8(_))
        ));
    }
}
