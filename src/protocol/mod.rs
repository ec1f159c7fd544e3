//! Protocol module - wire format, cipher, and framing.
//!
//! This module implements the binary device protocol:
//! - 4-byte big-endian length prefix
//! - Autokey XOR obfuscation of the payload
//! - Growable accumulator and incremental reader for partial reads

mod cipher;
mod frame;
mod frame_reader;
mod sink;
mod wire_format;

pub use cipher::{AutokeyCipher, INITIAL_KEY};
pub use frame::{build_frame, Frame};
pub use frame_reader::{read_frame, FrameReader, ReadStatus, MIN_READ};
pub use sink::GrowableByteSink;
pub use wire_format::{
    decode_length_prefix, encode_length_prefix, validate_payload_length,
    ABSOLUTE_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE,
};
