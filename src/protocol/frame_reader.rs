//! Incremental length-prefixed frame reader.
//!
//! A single `read` may return any number of bytes, and the frame length is
//! itself inside the stream, so the reader loops over small reads into a
//! [`GrowableByteSink`] until the announced length is satisfied:
//!
//! - `WaitingForPrefix`: fewer than 4 bytes buffered
//! - `WaitingForPayload`: prefix parsed, waiting for `total` bytes
//!
//! The prefix stays in the sink and counts toward `total`.
//!
//! # Example
//!
//! ```no_run
//! use kasa_transport::protocol::{build_frame, read_frame, DEFAULT_MAX_PAYLOAD_SIZE};
//!
//! # async fn run() -> kasa_transport::Result<()> {
//! let wire = build_frame(b"hello")?;
//! let frame = read_frame(&mut &wire[..], DEFAULT_MAX_PAYLOAD_SIZE).await?;
//! assert_eq!(frame.decode(), b"hello");
//! # Ok(())
//! # }
//! ```

use bytes::{BufMut, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame::Frame;
use super::sink::GrowableByteSink;
use super::wire_format::{
    decode_length_prefix, validate_payload_length, DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE,
};
use crate::error::{KasaError, Result};

/// Minimum spare room offered to each read.
pub const MIN_READ: usize = 512;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Need at least 4 bytes.
    WaitingForPrefix,
    /// Prefix parsed; `total` includes the prefix.
    WaitingForPayload { payload_length: u32, total: usize },
}

/// Outcome of [`FrameReader::read_from`].
#[derive(Debug)]
pub enum ReadStatus {
    /// A whole frame was assembled.
    Complete(Frame),
    /// The stream hit end-of-input first. Not an I/O error, but not a frame either.
    Closed {
        /// Bytes received before the close, prefix included.
        buffered: Bytes,
        /// Total frame length, if the prefix had arrived.
        expected: Option<usize>,
    },
}

/// Reader that assembles one frame from a stream of partial reads.
#[derive(Debug)]
pub struct FrameReader {
    sink: GrowableByteSink,
    state: State,
    max_payload_size: u32,
}

impl FrameReader {
    /// Create a reader with the default payload bound.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a reader with a custom payload bound.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            sink: GrowableByteSink::new(),
            state: State::WaitingForPrefix,
            max_payload_size,
        }
    }

    /// Read until one frame is complete or the stream closes.
    ///
    /// # Errors
    ///
    /// - `Io` if a read fails
    /// - `MalformedLength` if the prefix exceeds the payload bound
    /// - `AllocationTooLarge` if the accumulator cannot grow
    pub async fn read_from<R>(&mut self, reader: &mut R) -> Result<ReadStatus>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut reads = 0usize;

        loop {
            self.sink.ensure_capacity(MIN_READ)?;
            let mut window = self.sink.spare_buf();
            let offered = window.remaining_mut();
            let n = reader.read_buf(&mut window).await?;
            debug_assert!(n <= offered, "reader reported more bytes than offered");
            reads += 1;

            self.try_parse_prefix()?;

            if let State::WaitingForPayload {
                payload_length,
                total,
            } = self.state
            {
                if self.sink.len() >= total {
                    tracing::debug!(payload_length, reads, "frame complete");
                    return Ok(ReadStatus::Complete(self.take_frame(payload_length, total)));
                }
            }

            if n == 0 {
                let expected = match self.state {
                    State::WaitingForPayload { total, .. } => Some(total),
                    State::WaitingForPrefix => None,
                };
                let sink = std::mem::take(&mut self.sink);
                self.state = State::WaitingForPrefix;
                return Ok(ReadStatus::Closed {
                    buffered: sink.freeze(),
                    expected,
                });
            }
        }
    }

    /// Discard any partial frame.
    pub fn clear(&mut self) {
        self.sink.reset();
        self.state = State::WaitingForPrefix;
    }

    /// Number of buffered bytes, prefix included.
    pub fn buffered(&self) -> usize {
        self.sink.len()
    }

    fn try_parse_prefix(&mut self) -> Result<()> {
        if let State::WaitingForPrefix = self.state {
            if let Some(payload_length) = decode_length_prefix(self.sink.as_slice()) {
                validate_payload_length(payload_length, self.max_payload_size)?;
                let total = (payload_length as usize).checked_add(PREFIX_SIZE).ok_or(
                    KasaError::MalformedLength {
                        declared: payload_length as u64,
                        max: self.max_payload_size as u64,
                    },
                )?;
                self.state = State::WaitingForPayload {
                    payload_length,
                    total,
                };
            }
        }
        Ok(())
    }

    fn take_frame(&mut self, payload_length: u32, total: usize) -> Frame {
        let mut sink = std::mem::take(&mut self.sink);
        self.state = State::WaitingForPrefix;

        if sink.len() > total {
            tracing::warn!(
                extra = sink.len() - total,
                "discarding bytes past the end of the frame"
            );
            sink.truncate(total);
        }

        Frame::new(payload_length, sink.freeze().slice(PREFIX_SIZE..))
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one complete frame, treating an early close as an error.
///
/// # Errors
///
/// Returns `ConnectionClosed` if the stream ends before the frame is
/// complete, plus everything [`FrameReader::read_from`] can return.
pub async fn read_frame<R>(reader: &mut R, max_payload_size: u32) -> Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match FrameReader::with_max_payload(max_payload_size)
        .read_from(reader)
        .await?
    {
        ReadStatus::Complete(frame) => Ok(frame),
        ReadStatus::Closed { buffered, expected } => Err(KasaError::ConnectionClosed {
            expected: expected.unwrap_or(0),
            received: buffered.len(),
        }),
    }
}
