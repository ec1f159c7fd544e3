//! Wire format encoding and decoding.
//!
//! Every message in either direction is:
//! ```text
//! ┌────────────────┬──────────────────────────────┐
//! │ Payload length │ Payload (autokey obfuscated) │
//! │ 4 bytes        │ N bytes                      │
//! │ uint32 BE      │                              │
//! └────────────────┴──────────────────────────────┘
//! ```
//!
//! The length counts payload bytes only, never the prefix itself.

use crate::error::{KasaError, Result};

/// Length prefix size in bytes.
pub const PREFIX_SIZE: usize = 4;

/// Default maximum payload size (4 MB).
///
/// Device responses are a few kilobytes at most; anything near this bound
/// means a corrupted or hostile length field.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;

/// Largest length the prefix can express.
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = u32::MAX;

/// Encode a payload length as the 4-byte big-endian prefix.
///
/// # Example
///
/// ```
/// use kasa_transport::protocol::encode_length_prefix;
///
/// assert_eq!(encode_length_prefix(0x0102_0304), [1, 2, 3, 4]);
/// ```
#[inline]
pub fn encode_length_prefix(payload_length: u32) -> [u8; PREFIX_SIZE] {
    payload_length.to_be_bytes()
}

/// Decode the length prefix from the start of `buf`.
///
/// Returns `None` if fewer than 4 bytes are available.
#[inline]
pub fn decode_length_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; PREFIX_SIZE] = buf.get(..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Reject a declared payload length above `max_payload_size`.
pub fn validate_payload_length(declared: u32, max_payload_size: u32) -> Result<()> {
    if declared > max_payload_size {
        return Err(KasaError::MalformedLength {
            declared: declared as u64,
            max: max_payload_size as u64,
        });
    }
    Ok(())
}
