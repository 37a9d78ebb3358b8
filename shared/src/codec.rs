//! Binary codec for the game's message format
//!
//! Everything on the wire is little-endian. Integers that are usually small
//! (client ids, handles, prefab ids, string lengths) use a base-128 "packed"
//! encoding where each byte carries 7 bits and the high bit marks that more
//! bytes follow. Messages are framed as `[u16 length][u8 tag][body]` and nest
//! freely: a reader over one message yields child readers bounded to exactly
//! their declared length.
//!
//! Readers never read past the end of the slice they were handed. Every read
//! either consumes exactly the bytes it needs or fails with
//! [`CodecError::TruncatedInput`] without moving the cursor.

use thiserror::Error;

/// Maximum number of bytes a packed 32-bit integer may occupy.
pub const MAX_PACKED_U32_LEN: usize = 5;

/// Size of the `[u16 length][u8 tag]` header in front of every message.
pub const MESSAGE_HEADER_LEN: usize = 3;

/// Tag reported by readers that were not produced by [`MessageReader::read_message`].
pub const ROOT_TAG: u8 = u8::MAX;

/// Errors raised while decoding or encoding wire data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes remain than the read requires
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    /// String bytes are not valid UTF-8
    #[error("invalid UTF-8 in string field")]
    InvalidEncoding,

    /// Packed integer kept its continuation bit past the width of a u32
    #[error("packed integer exceeds {MAX_PACKED_U32_LEN} bytes")]
    PackedIntOverflow,

    /// Message body does not fit the 16-bit length prefix
    #[error("message body of {0} bytes exceeds the u16 length prefix")]
    MessageTooLong(usize),
}

/// Cursor over a borrowed byte slice
///
/// Child readers returned by [`read_message`](Self::read_message) borrow from
/// the same underlying buffer, so decoding never copies payload bytes.
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    tag: u8,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    /// Creates a root reader over the whole buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            tag: ROOT_TAG,
            buf,
            pos: 0,
        }
    }

    fn with_tag(tag: u8, buf: &'a [u8]) -> Self {
        Self { tag, buf, pos: 0 }
    }

    /// Tag of the message this reader is bounded to.
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Total length of the bounded body.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when the bounded body has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// Unread bytes, without advancing the cursor.
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CodecError::TruncatedInput {
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a base-128 packed integer, low-order group first.
    ///
    /// Consumes at most [`MAX_PACKED_U32_LEN`] bytes; a fifth byte that still
    /// has its continuation bit set is rejected. On error the cursor is left
    /// where it was.
    pub fn read_packed_u32(&mut self) -> Result<u32, CodecError> {
        let start = self.pos;
        let mut value: u32 = 0;

        for i in 0..MAX_PACKED_U32_LEN {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };

            value |= u32::from(byte & 0x7F) << (7 * i);

            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        self.pos = start;
        Err(CodecError::PackedIntOverflow)
    }

    /// Signed view of [`read_packed_u32`](Self::read_packed_u32); negative
    /// values travel as their two's-complement bit pattern.
    pub fn read_packed_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_packed_u32()? as i32)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.take(len)
    }

    /// Reads a packed length followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let len = self.read_packed_u32()? as usize;

        let bytes = match self.take(len) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };

        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(_) => {
                self.pos = start;
                Err(CodecError::InvalidEncoding)
            }
        }
    }

    /// Reads one framed child message.
    ///
    /// The returned reader is bounded to the declared body length and the
    /// outer cursor moves past the whole message no matter how much of the
    /// child the caller ends up consuming.
    pub fn read_message(&mut self) -> Result<MessageReader<'a>, CodecError> {
        let start = self.pos;
        let header = self.take_array::<MESSAGE_HEADER_LEN>()?;
        let len = u16::from_le_bytes([header[0], header[1]]) as usize;

        match self.take(len) {
            Ok(body) => Ok(MessageReader::with_tag(header[2], body)),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }
}

/// Growable output buffer with nested message framing
///
/// `start_message` reserves the `[u16 length][u8 tag]` header and
/// `end_message` back-patches the length once the body is known.
#[derive(Debug, Default, Clone)]
pub struct MessageWriter {
    buf: Vec<u8>,
    open: Vec<usize>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            open: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer. Messages still open keep a zero length prefix.
    pub fn into_bytes(self) -> Vec<u8> {
        debug_assert!(self.open.is_empty(), "writer finished with open messages");
        self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.open.clear();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes the minimal packed encoding of `value`.
    pub fn write_packed_u32(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_packed_i32(&mut self, value: i32) {
        self.write_packed_u32(value as u32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_packed_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Opens a framed message with the given tag.
    pub fn start_message(&mut self, tag: u8) {
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0, 0, tag]);
    }

    /// Closes the innermost open message and patches its length prefix.
    pub fn end_message(&mut self) -> Result<(), CodecError> {
        let Some(start) = self.open.pop() else {
            debug_assert!(false, "end_message without start_message");
            return Ok(());
        };

        let body_len = self.buf.len() - start - MESSAGE_HEADER_LEN;
        let len = u16::try_from(body_len).map_err(|_| CodecError::MessageTooLong(body_len))?;
        self.buf[start..start + 2].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

/// Number of bytes the packed encoding of `value` occupies.
pub fn packed_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}
