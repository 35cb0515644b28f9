//! Packet Framing
//!
//! ```text
//! Frame   := Length(i32 LE) Payload(Length bytes)
//! Payload := Tag(i32 LE) Body(bincode)
//! ```
//!
//! [`FrameDecoder`] tolerates partial, exact and concatenated reads: a
//! length header is only consumed once four bytes are buffered, and it is
//! rolled back when the body has not fully arrived yet.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix and of the type tag.
pub const HEADER_LEN: usize = 4;

/// Largest accepted payload (1 MiB).
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Framing and body (de)serialization failures. Always fatal for the
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("non-positive frame length {0}")]
    InvalidLength(i32),

    #[error("frame length {len} exceeds max {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("payload shorter than its type tag")]
    MissingTag,

    #[error("malformed body for message {tag}: {source}")]
    Body {
        tag: i32,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),
}

// =============================================================================
// PACKET BUFFER
// =============================================================================

/// Growable byte buffer with a read cursor that can be rolled back.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    data: BytesMut,
    pos: usize,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    /// Storage to read socket data into. Appending never moves the cursor.
    pub fn spare_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    /// Read a little-endian i32, `None` when fewer than four bytes remain.
    pub fn read_i32(&mut self) -> Option<i32> {
        if self.remaining() < HEADER_LEN {
            return None;
        }
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&self.data[self.pos..self.pos + HEADER_LEN]);
        self.pos += HEADER_LEN;
        Some(i32::from_le_bytes(raw))
    }

    /// Read `len` bytes, `None` when not all of them are buffered.
    pub fn read_bytes(&mut self, len: usize) -> Option<Bytes> {
        if self.remaining() < len {
            return None;
        }
        let bytes = Bytes::copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Some(bytes)
    }

    /// Move the cursor back over `len` consumed bytes.
    pub fn unread(&mut self, len: usize) {
        self.pos = self.pos.saturating_sub(len);
    }

    /// Drop consumed bytes.
    pub fn compact(&mut self) {
        self.data.advance(self.pos);
        self.pos = 0;
    }

    /// Take everything written so far.
    pub fn freeze(self) -> Bytes {
        let mut data = self.data;
        data.advance(self.pos);
        data.freeze()
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// One reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: i32,
    pub body: Bytes,
}

/// Per-connection reassembler.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: PacketBuffer,
    max_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: PacketBuffer::with_capacity(4096),
            max_len,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.write_bytes(bytes);
    }

    /// Socket read target.
    pub fn read_target(&mut self) -> &mut BytesMut {
        self.buffer.spare_mut()
    }

    /// Bytes received but not yet framed.
    pub fn buffered(&self) -> usize {
        self.buffer.remaining()
    }

    /// Next complete frame, `None` until one has fully arrived.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let len = match self.buffer.read_i32() {
            Some(len) => len,
            None => return Ok(None),
        };
        if len <= 0 {
            return Err(ProtocolError::InvalidLength(len));
        }
        let len = len as usize;
        if len > self.max_len {
            return Err(ProtocolError::FrameTooLarge { len, max: self.max_len });
        }

        let mut payload = match self.buffer.read_bytes(len) {
            Some(payload) => payload,
            None => {
                self.buffer.unread(HEADER_LEN);
                return Ok(None);
            }
        };
        if payload.len() < HEADER_LEN {
            return Err(ProtocolError::MissingTag);
        }
        let tag = payload.get_i32_le();
        Ok(Some(Frame { tag, body: payload }))
    }

    /// Every complete frame currently buffered, in arrival order. Consumed
    /// bytes are released.
    ///
    /// A framing failure stops the scan. Frames decoded before it are still
    /// returned alongside the error.
    pub fn drain_frames(&mut self) -> (Vec<Frame>, Option<ProtocolError>) {
        let mut frames = Vec::new();
        let error = loop {
            match self.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break None,
                Err(err) => break Some(err),
            }
        };
        self.buffer.compact();
        (frames, error)
    }
}

/// Prepend tag and total length to a serialized body.
pub fn encode_frame(tag: i32, body: &[u8]) -> Bytes {
    let mut buffer = PacketBuffer::with_capacity(HEADER_LEN * 2 + body.len());
    buffer.write_i32((HEADER_LEN + body.len()) as i32);
    buffer.write_i32(tag);
    buffer.write_bytes(body);
    buffer.freeze()
}
