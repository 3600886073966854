use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::BufConfig;
use crate::error::{BufError, Result};

/// Growable byte buffer with independent read and write cursors plus
/// sub-byte bit packing.
///
/// Booleans, enum ordinals and fixed-bit values share partially filled
/// bytes. Any whole-byte write closes the partially written byte, and any
/// whole-byte read drops the remaining bits of the cached read byte. Writer
/// and reader therefore agree on byte boundaries as long as both sides
/// issue the same sequence of operations.
///
/// A `NetBuf` is owned by one call chain at a time and is not thread-safe.
#[derive(Debug, Clone)]
pub struct NetBuf {
    pub(crate) data: BytesMut,
    pub(crate) read_pos: usize,
    pub(crate) config: BufConfig,
    pub(crate) write_bits: Option<PartialWrite>,
    pub(crate) read_bits: Option<PartialRead>,
}

/// The byte currently accumulating written bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartialWrite {
    pub(crate) index: usize,
    pub(crate) offset: u32,
    pub(crate) cache: u8,
}

/// The byte currently being consumed bit by bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartialRead {
    pub(crate) offset: u32,
    pub(crate) cache: u8,
}

/// A restorable snapshot of a buffer's read position, including bit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedReaderIndex {
    /// The saved byte-level reader index.
    pub reader_index: usize,
    read_bits: Option<PartialRead>,
}

impl NetBuf {
    /// Create an empty buffer with default configuration.
    pub fn new() -> Self {
        Self::with_config(BufConfig::default())
    }

    /// Create an empty passthrough buffer.
    pub fn passthrough() -> Self {
        Self::with_config(BufConfig::passthrough())
    }

    /// Create an empty buffer with explicit configuration.
    pub fn with_config(config: BufConfig) -> Self {
        Self {
            data: BytesMut::with_capacity(config.initial_capacity),
            read_pos: 0,
            config,
            write_bits: None,
            read_bits: None,
        }
    }

    /// Wrap received bytes for reading, using default configuration.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::from_bytes_with_config(bytes, BufConfig::default())
    }

    /// Wrap received bytes for reading with explicit configuration.
    pub fn from_bytes_with_config(bytes: impl AsRef<[u8]>, config: BufConfig) -> Self {
        Self {
            data: BytesMut::from(bytes.as_ref()),
            read_pos: 0,
            config,
            write_bits: None,
            read_bits: None,
        }
    }

    /// Whether this buffer runs in passthrough mode.
    pub fn is_passthrough(&self) -> bool {
        self.config.passthrough
    }

    /// Current buffer configuration.
    pub fn config(&self) -> &BufConfig {
        &self.config
    }

    /// Total bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte-level read cursor.
    pub fn reader_index(&self) -> usize {
        self.read_pos
    }

    /// Bytes not yet consumed by the reader.
    pub fn readable_bytes(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// The unread portion of the buffer.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// Everything written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of bits already placed in the open write byte, or `None` when
    /// the next bit write starts a new byte.
    pub fn bit_writer_offset(&self) -> Option<u32> {
        self.write_bits.map(|bits| bits.offset)
    }

    /// Number of bits already consumed from the cached read byte, or `None`
    /// when the next bit read fetches a new byte.
    pub fn bit_reader_offset(&self) -> Option<u32> {
        self.read_bits.map(|bits| bits.offset)
    }

    /// Reset both cursors, discard all content and bit state.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
        self.write_bits = None;
        self.read_bits = None;
    }

    /// Snapshot the read position so it can be restored later.
    pub fn save_reader_index(&self) -> SavedReaderIndex {
        SavedReaderIndex {
            reader_index: self.read_pos,
            read_bits: self.read_bits,
        }
    }

    /// Restore a read position captured by [`NetBuf::save_reader_index`].
    pub fn reset_reader_index(&mut self, saved: SavedReaderIndex) {
        self.read_pos = saved.reader_index.min(self.data.len());
        self.read_bits = saved.read_bits;
    }

    /// Consume the buffer, returning everything written.
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    /// Consume every unread byte.
    pub fn read_remaining(&mut self) -> Bytes {
        self.read_bits = None;
        let rest = Bytes::copy_from_slice(&self.data[self.read_pos..]);
        self.read_pos = self.data.len();
        rest
    }

    /// Claim the write side for a whole-byte write.
    pub(crate) fn put(&mut self) -> &mut BytesMut {
        self.write_bits = None;
        &mut self.data
    }

    /// Claim `n` unread bytes for a whole-byte read.
    pub(crate) fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.read_bits = None;
        self.take_raw(n)
    }

    /// Claim `n` unread bytes without touching bit state.
    pub(crate) fn take_raw(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.readable_bytes();
        if remaining < n {
            return Err(BufError::UnexpectedEof {
                needed: n,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..start + n])
    }

    pub fn write_u8(&mut self, value: u8) {
        self.put().put_u8(value);
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn write_i8(&mut self, value: i8) {
        self.put().put_i8(value);
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?.get_i8())
    }

    pub fn write_u16(&mut self, value: u16) {
        self.put().put_u16(value);
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16())
    }

    pub fn write_i16(&mut self, value: i16) {
        self.put().put_i16(value);
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.take(2)?.get_i16())
    }

    pub fn write_u32(&mut self, value: u32) {
        self.put().put_u32(value);
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32())
    }

    pub fn write_i32(&mut self, value: i32) {
        self.put().put_i32(value);
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.take(4)?.get_i32())
    }

    pub fn write_u64(&mut self, value: u64) {
        self.put().put_u64(value);
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.take(8)?.get_u64())
    }

    pub fn write_i64(&mut self, value: i64) {
        self.put().put_i64(value);
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.take(8)?.get_i64())
    }

    pub fn write_f32(&mut self, value: f32) {
        self.put().put_f32(value);
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.take(4)?.get_f32())
    }

    pub fn write_f64(&mut self, value: f64) {
        self.put().put_f64(value);
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(self.take(8)?.get_f64())
    }

    /// Append raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put().put_slice(bytes);
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.take(len).map(Bytes::copy_from_slice)
    }

    /// Write a var-uint length prefix followed by the bytes.
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_var_u32(length_prefix(bytes.len())?);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Read a var-uint length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<Bytes> {
        let len = self.read_var_u32()? as usize;
        self.read_bytes(len)
    }

    /// Write a var-uint length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let max = self.config.max_string_len;
        if value.len() > max {
            return Err(BufError::StringTooLong {
                len: value.len(),
                max,
            });
        }
        self.write_byte_array(value.as_bytes())
    }

    /// Read a var-uint length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_var_u32()? as usize;
        let max = self.config.max_string_len;
        if len > max {
            return Err(BufError::StringTooLong { len, max });
        }
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| BufError::InvalidUtf8)
    }
}

impl Default for NetBuf {
    fn default() -> Self {
        Self::new()
    }
}

fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| BufError::ArrayTooLong { len })
}
