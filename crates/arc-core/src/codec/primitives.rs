//! Primitive encoding/decoding for the Arc binary formats.
//!
//! Fixed-width integers are big-endian throughout. Payload values use
//! LEB128 varints and zigzag for signed integers.

use std::io::{self, Read};

use crate::error::DecodeError;
use crate::limits::{EID_LEN, MAX_VARINT_BYTES};
use crate::model::Eid;

// =============================================================================
// BYTE SOURCES
// =============================================================================

/// A source of bytes that can be drained one fixed-size section at a time.
///
/// The transaction decoder is written against this trait so the same code
/// reads from a fully buffered slice ([`Reader`]) or from any
/// [`std::io::Read`] ([`IoSource`]).
pub trait ByteSource {
    /// Fills `buf` completely or fails with [`DecodeError::UnexpectedEnd`].
    fn read_exact_into(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), DecodeError>;

    /// Returns the number of bytes consumed so far.
    fn position(&self) -> usize;

    /// Reads `n` bytes into a new vector.
    ///
    /// Callers must bound `n` before calling; this allocates up front.
    fn read_vec(&mut self, n: usize, context: &'static str) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; n];
        self.read_exact_into(&mut buf, context)?;
        Ok(buf)
    }

    #[inline]
    fn read_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let mut b = [0u8; 1];
        self.read_exact_into(&mut b, context)?;
        Ok(b[0])
    }

    #[inline]
    fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b, context)?;
        Ok(u32::from_be_bytes(b))
    }

    #[inline]
    fn read_u64(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b, context)?;
        Ok(u64::from_be_bytes(b))
    }

    /// Reads a 24-byte big-endian EID.
    #[inline]
    fn read_eid(&mut self, context: &'static str) -> Result<Eid, DecodeError> {
        let mut b = [0u8; EID_LEN];
        self.read_exact_into(&mut b, context)?;
        Ok(Eid::from_be_bytes(&b))
    }
}

/// Adapts any [`std::io::Read`] into a [`ByteSource`].
///
/// A read returning zero bytes mid-section is reported as
/// [`DecodeError::UnexpectedEnd`]; any other I/O failure becomes
/// [`DecodeError::Io`].
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    consumed: usize,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns a mutable reference to the wrapped reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read_exact_into(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), DecodeError> {
        let mut read = 0usize;
        while read < buf.len() {
            match self.inner.read(&mut buf[read..]) {
                Ok(0) => {
                    self.consumed += read;
                    return Err(DecodeError::UnexpectedEnd { context });
                }
                Ok(n) => read += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    self.consumed += read;
                    return Err(DecodeError::UnexpectedEnd { context });
                }
                Err(err) => {
                    self.consumed += read;
                    return Err(DecodeError::Io {
                        context,
                        message: err.to_string(),
                    });
                }
            }
        }
        self.consumed += read;
        Ok(())
    }

    fn position(&self) -> usize {
        self.consumed
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEnd { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEnd { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            // Check for overflow
            if shift >= 64 || (shift == 63 && value > 1) {
                return Err(DecodeError::VarintOverflow);
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;

            if i == MAX_VARINT_BYTES - 1 {
                return Err(DecodeError::VarintTooLong);
            }
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads a signed varint (zigzag encoded).
    pub fn read_signed_varint(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let unsigned = self.read_varint(context)?;
        Ok(zigzag_decode(unsigned))
    }

    /// Reads a length-prefixed UTF-8 string without copying.
    #[inline]
    pub fn read_str(&mut self, max_len: usize, field: &'static str) -> Result<&'a str, DecodeError> {
        let bytes = self.read_bytes_prefixed(max_len, field)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self, max_len: usize, field: &'static str) -> Result<String, DecodeError> {
        self.read_str(max_len, field).map(str::to_string)
    }

    /// Reads a length-prefixed byte array without copying.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint(field)? as usize;
        if len > max_len {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: max_len,
            });
        }
        self.read_bytes(len, field)
    }

    /// Reads a big-endian f64.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b, context)?;
        Ok(f64::from_be_bytes(b))
    }

    /// Fails if any bytes remain unread.
    pub fn expect_end(&self, context: &'static str) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                context,
                remaining: self.remaining_len(),
            })
        }
    }
}

impl ByteSource for Reader<'_> {
    #[inline]
    fn read_exact_into(&mut self, buf: &mut [u8], context: &'static str) -> Result<(), DecodeError> {
        let bytes = self.read_bytes(buf.len(), context)?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read_vec(&mut self, n: usize, context: &'static str) -> Result<Vec<u8>, DecodeError> {
        // Bounds-checked before allocating.
        self.read_bytes(n, context).map(<[u8]>::to_vec)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Creates a writer that appends to an existing buffer.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a 24-byte big-endian EID.
    #[inline]
    pub fn write_eid(&mut self, id: &Eid) {
        self.buf.extend_from_slice(&id.to_be_bytes());
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        // Use stack buffer to batch writes (faster than multiple push calls)
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a signed varint (zigzag encoded).
    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_bytes_prefixed(s.as_bytes());
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a big-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Encodes a signed integer using zigzag encoding.
///
/// Maps negative numbers to odd positive numbers:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
#[inline]
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a zigzag-encoded unsigned integer back to signed.
#[inline]
pub const fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}
