//! Growable output buffer with one `write_*` method per wire construct.
//!
//! Unless a method is marked `forced`, it picks the most compact encoding the value
//! allows. After any write, [`Writer::position`] has advanced by exactly the number of
//! bytes the encoding occupies.
//!
//! Scalar writes cannot fail. Anything carrying a length (str, bin, array, map, ext)
//! returns [`MessagePackError::Encode`] when the length does not fit in a `u32`.
//!
//! # Example
//!
//! ```
//! use packwire::Writer;
//!
//! let mut writer = Writer::new();
//! writer.write_map_header(1).unwrap();
//! writer.write_str("id").unwrap();
//! writer.write_u64(300);
//! assert_eq!(writer.as_slice(), &[0x81, 0xa2, b'i', b'd', 0xcd, 0x01, 0x2c]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::code::*;
use crate::timestamp::Timestamp;
use crate::{MessagePackError, Result};

/// Append-only MessagePack writer over a [`BytesMut`].
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

#[inline]
fn length_u32(len: usize, what: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| MessagePackError::Encode(format!("{} length {} exceeds u32::MAX", what, len)))
}

impl Writer {
    /// Empty writer; the buffer is allocated on the first write.
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Freezes the written bytes without copying them.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    /// Makes room for at least `additional` more bytes.
    ///
    /// The buffer at least doubles when it has to grow, or grows to the required size if
    /// that is larger.
    #[inline]
    pub fn ensure_capacity(&mut self, additional: usize) {
        let spare = self.buf.capacity() - self.buf.len();
        if spare < additional {
            let grow = additional.max(self.buf.capacity());
            self.buf.reserve(grow);
        }
    }

    // --- nil / bool ---

    pub fn write_nil(&mut self) {
        self.ensure_capacity(1);
        self.buf.put_u8(NIL);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.ensure_capacity(1);
        self.buf.put_u8(if value { TRUE } else { FALSE });
    }

    // --- integers, compact ---

    pub fn write_u8(&mut self, value: u8) {
        self.write_u64(value as u64)
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_u64(value as u64)
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_u64(value as u64)
    }

    /// Writes an unsigned integer as positive fixint, uint8, uint16, uint32 or uint64,
    /// whichever is shortest.
    pub fn write_u64(&mut self, value: u64) {
        if value <= MAX_FIX_INT as u64 {
            self.ensure_capacity(1);
            self.buf.put_u8(value as u8);
        } else if value <= u8::MAX as u64 {
            self.ensure_capacity(2);
            self.buf.put_u8(UINT8);
            self.buf.put_u8(value as u8);
        } else if value <= u16::MAX as u64 {
            self.ensure_capacity(3);
            self.buf.put_u8(UINT16);
            self.buf.put_u16(value as u16);
        } else if value <= u32::MAX as u64 {
            self.ensure_capacity(5);
            self.buf.put_u8(UINT32);
            self.buf.put_u32(value as u32);
        } else {
            self.ensure_capacity(9);
            self.buf.put_u8(UINT64);
            self.buf.put_u64(value);
        }
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_i64(value as i64)
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_i64(value as i64)
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_i64(value as i64)
    }

    /// Writes a signed integer in its shortest form.
    ///
    /// Non-negative values use the unsigned encodings, so `200i32` becomes `uint8`.
    pub fn write_i64(&mut self, value: i64) {
        if value >= 0 {
            self.write_u64(value as u64);
        } else if value >= MIN_FIX_NEGATIVE_INT {
            self.ensure_capacity(1);
            self.buf.put_i8(value as i8);
        } else if value >= i8::MIN as i64 {
            self.ensure_capacity(2);
            self.buf.put_u8(INT8);
            self.buf.put_i8(value as i8);
        } else if value >= i16::MIN as i64 {
            self.ensure_capacity(3);
            self.buf.put_u8(INT16);
            self.buf.put_i16(value as i16);
        } else if value >= i32::MIN as i64 {
            self.ensure_capacity(5);
            self.buf.put_u8(INT32);
            self.buf.put_i32(value as i32);
        } else {
            self.ensure_capacity(9);
            self.buf.put_u8(INT64);
            self.buf.put_i64(value);
        }
    }

    // --- integers, fixed width ---

    /// Writes `value` as uint8 (`0xcc`) even when a fixint would do.
    ///
    /// The other `*_forced` methods do the same for their own width and signedness.
    /// Readers accept both forms, so these exist for peers that expect a fixed layout.
    pub fn write_u8_forced(&mut self, value: u8) {
        self.ensure_capacity(2);
        self.buf.put_u8(UINT8);
        self.buf.put_u8(value);
    }

    pub fn write_u16_forced(&mut self, value: u16) {
        self.ensure_capacity(3);
        self.buf.put_u8(UINT16);
        self.buf.put_u16(value);
    }

    pub fn write_u32_forced(&mut self, value: u32) {
        self.ensure_capacity(5);
        self.buf.put_u8(UINT32);
        self.buf.put_u32(value);
    }

    pub fn write_u64_forced(&mut self, value: u64) {
        self.ensure_capacity(9);
        self.buf.put_u8(UINT64);
        self.buf.put_u64(value);
    }

    pub fn write_i8_forced(&mut self, value: i8) {
        self.ensure_capacity(2);
        self.buf.put_u8(INT8);
        self.buf.put_i8(value);
    }

    pub fn write_i16_forced(&mut self, value: i16) {
        self.ensure_capacity(3);
        self.buf.put_u8(INT16);
        self.buf.put_i16(value);
    }

    pub fn write_i32_forced(&mut self, value: i32) {
        self.ensure_capacity(5);
        self.buf.put_u8(INT32);
        self.buf.put_i32(value);
    }

    pub fn write_i64_forced(&mut self, value: i64) {
        self.ensure_capacity(9);
        self.buf.put_u8(INT64);
        self.buf.put_i64(value);
    }

    /// Writes a positive fixint without range checks.
    ///
    /// `value` must be at most `0x7f`.
    #[inline]
    pub fn write_positive_fixint_unchecked(&mut self, value: u8) {
        debug_assert!(value <= MAX_FIX_INT);
        self.ensure_capacity(1);
        self.buf.put_u8(value);
    }

    // --- floats ---

    /// Always float32; floats are never narrowed or turned into integers.
    pub fn write_f32(&mut self, value: f32) {
        self.ensure_capacity(5);
        self.buf.put_u8(FLOAT32);
        self.buf.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.ensure_capacity(9);
        self.buf.put_u8(FLOAT64);
        self.buf.put_f64(value);
    }

    // --- str / bin ---

    /// Writes a fixstr, str8, str16 or str32 header for `len` payload bytes.
    ///
    /// The caller must follow it with exactly `len` bytes of UTF-8.
    pub fn write_str_header(&mut self, len: usize) -> Result<()> {
        let len = length_u32(len, "str")?;
        if len as usize <= MAX_FIX_STR_LEN {
            self.ensure_capacity(1);
            self.buf.put_u8(MIN_FIX_STR | len as u8);
        } else if len <= u8::MAX as u32 {
            self.ensure_capacity(2);
            self.buf.put_u8(STR8);
            self.buf.put_u8(len as u8);
        } else if len <= u16::MAX as u32 {
            self.ensure_capacity(3);
            self.buf.put_u8(STR16);
            self.buf.put_u16(len as u16);
        } else {
            self.ensure_capacity(5);
            self.buf.put_u8(STR32);
            self.buf.put_u32(len);
        }
        Ok(())
    }

    /// Writes a string with its shortest header.
    ///
    /// ```
    /// let mut writer = packwire::Writer::new();
    /// writer.write_str("hi").unwrap();
    /// assert_eq!(writer.as_slice(), &[0xa2, b'h', b'i']);
    /// ```
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_str_header(value.len())?;
        self.write_raw(value.as_bytes());
        Ok(())
    }

    /// Writes a string with a str32 header regardless of its length.
    pub fn write_str_forced32(&mut self, value: &str) -> Result<()> {
        let len = length_u32(value.len(), "str")?;
        self.ensure_capacity(5 + value.len());
        self.buf.put_u8(STR32);
        self.buf.put_u32(len);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_bin_header(&mut self, len: usize) -> Result<()> {
        let len = length_u32(len, "bin")?;
        if len <= u8::MAX as u32 {
            self.ensure_capacity(2);
            self.buf.put_u8(BIN8);
            self.buf.put_u8(len as u8);
        } else if len <= u16::MAX as u32 {
            self.ensure_capacity(3);
            self.buf.put_u8(BIN16);
            self.buf.put_u16(len as u16);
        } else {
            self.ensure_capacity(5);
            self.buf.put_u8(BIN32);
            self.buf.put_u32(len);
        }
        Ok(())
    }

    /// Writes a byte blob as bin8, bin16 or bin32. There is no fix form for bin.
    pub fn write_bin(&mut self, value: &[u8]) -> Result<()> {
        self.write_bin_header(value.len())?;
        self.write_raw(value);
        Ok(())
    }

    // --- array / map headers ---

    /// Writes a fixarray, array16 or array32 header.
    ///
    /// Exactly `count` values must follow; the writer does not track this.
    pub fn write_array_header(&mut self, count: usize) -> Result<()> {
        let count = length_u32(count, "array")?;
        if count as usize <= MAX_FIX_COLLECTION_LEN {
            self.ensure_capacity(1);
            self.buf.put_u8(MIN_FIX_ARRAY | count as u8);
        } else if count <= u16::MAX as u32 {
            self.ensure_capacity(3);
            self.buf.put_u8(ARRAY16);
            self.buf.put_u16(count as u16);
        } else {
            self.ensure_capacity(5);
            self.buf.put_u8(ARRAY32);
            self.buf.put_u32(count);
        }
        Ok(())
    }

    /// Writes an array32 header, e.g. to patch in the count once it is known.
    pub fn write_array_header_forced32(&mut self, count: u32) {
        self.ensure_capacity(5);
        self.buf.put_u8(ARRAY32);
        self.buf.put_u32(count);
    }

    /// Writes a fixarray header. `count` must be at most 15.
    #[inline]
    pub fn write_fixarray_header_unchecked(&mut self, count: u8) {
        debug_assert!(count as usize <= MAX_FIX_COLLECTION_LEN);
        self.ensure_capacity(1);
        self.buf.put_u8(MIN_FIX_ARRAY | count);
    }

    /// Writes a fixmap, map16 or map32 header. `count` key/value pairs must follow.
    pub fn write_map_header(&mut self, count: usize) -> Result<()> {
        let count = length_u32(count, "map")?;
        if count as usize <= MAX_FIX_COLLECTION_LEN {
            self.ensure_capacity(1);
            self.buf.put_u8(MIN_FIX_MAP | count as u8);
        } else if count <= u16::MAX as u32 {
            self.ensure_capacity(3);
            self.buf.put_u8(MAP16);
            self.buf.put_u16(count as u16);
        } else {
            self.ensure_capacity(5);
            self.buf.put_u8(MAP32);
            self.buf.put_u32(count);
        }
        Ok(())
    }

    pub fn write_map_header_forced32(&mut self, count: u32) {
        self.ensure_capacity(5);
        self.buf.put_u8(MAP32);
        self.buf.put_u32(count);
    }

    /// Writes a fixmap header. `count` must be at most 15.
    #[inline]
    pub fn write_fixmap_header_unchecked(&mut self, count: u8) {
        debug_assert!(count as usize <= MAX_FIX_COLLECTION_LEN);
        self.ensure_capacity(1);
        self.buf.put_u8(MIN_FIX_MAP | count);
    }

    // --- extensions ---

    /// Writes an extension header, using a fixext code when the length allows.
    pub fn write_ext_header(&mut self, type_code: i8, len: usize) -> Result<()> {
        let len = length_u32(len, "ext")?;
        let fixed = match len {
            1 => Some(FIX_EXT1),
            2 => Some(FIX_EXT2),
            4 => Some(FIX_EXT4),
            8 => Some(FIX_EXT8),
            16 => Some(FIX_EXT16),
            _ => None,
        };
        if let Some(code) = fixed {
            self.ensure_capacity(2);
            self.buf.put_u8(code);
        } else if len <= u8::MAX as u32 {
            self.ensure_capacity(3);
            self.buf.put_u8(EXT8);
            self.buf.put_u8(len as u8);
        } else if len <= u16::MAX as u32 {
            self.ensure_capacity(4);
            self.buf.put_u8(EXT16);
            self.buf.put_u16(len as u16);
        } else {
            self.ensure_capacity(6);
            self.buf.put_u8(EXT32);
            self.buf.put_u32(len);
        }
        self.buf.put_i8(type_code);
        Ok(())
    }

    /// Writes a whole extension: header, then `data` as the payload.
    ///
    /// ```
    /// let mut writer = packwire::Writer::new();
    /// writer.write_ext(42, &[1, 2, 3, 4]).unwrap();
    /// assert_eq!(writer.as_slice(), &[0xd6, 42, 1, 2, 3, 4]);
    /// ```
    pub fn write_ext(&mut self, type_code: i8, data: &[u8]) -> Result<()> {
        self.write_ext_header(type_code, data.len())?;
        self.write_raw(data);
        Ok(())
    }

    /// Writes a timestamp extension in its 32, 64 or 96-bit form.
    pub fn write_timestamp(&mut self, value: Timestamp) -> Result<()> {
        let len = value.payload_len();
        self.write_ext_header(ext::TIMESTAMP, len)?;
        self.ensure_capacity(len);
        value.put_payload(&mut self.buf);
        Ok(())
    }

    /// Writes a timestamp together with a UTC offset in minutes.
    pub fn write_datetime_offset(&mut self, value: Timestamp, offset_minutes: i16) -> Result<()> {
        let len = value.payload_len() + 2;
        self.write_ext_header(ext::DATE_TIME_OFFSET, len)?;
        self.ensure_capacity(len);
        value.put_payload(&mut self.buf);
        self.buf.put_i16(offset_minutes);
        Ok(())
    }

    // --- raw ---

    /// Appends bytes that are already MessagePack encoded (or part of a payload).
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.buf.put_slice(bytes);
    }

    /// Appends bytes without growing the buffer.
    ///
    /// # Safety
    /// [`Writer::ensure_capacity`] must have been called with at least `bytes.len()` since
    /// the last write.
    pub unsafe fn write_raw_unchecked(&mut self, bytes: &[u8]) {
        let len = self.buf.len();
        let spare = self.buf.spare_capacity_mut();
        debug_assert!(spare.len() >= bytes.len());
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), spare.as_mut_ptr() as *mut u8, bytes.len());
        self.buf.set_len(len + bytes.len());
    }
}
