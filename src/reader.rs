//! Typed reads over a [`Cursor`].
//!
//! Every `read_*` method peeks the leading byte, looks it up in the table for the
//! requested category and either decodes the value or fails with
//! [`MessagePackError::InvalidCode`] naming the byte. Nothing is consumed on failure
//! caused by an invalid code.
//!
//! # Example
//!
//! ```
//! use packwire::Reader;
//!
//! // ["id", 300]
//! let mut reader = Reader::new(&[0x92, 0xa2, b'i', b'd', 0xcd, 0x01, 0x2c]);
//! assert_eq!(reader.read_array_header().unwrap(), 2);
//! assert_eq!(reader.read_str().unwrap(), "id");
//! assert_eq!(reader.read_u16().unwrap(), 300);
//! assert!(reader.is_end());
//! ```
//!
//! The same reads work over segmented input, e.g. frames received separately:
//!
//! ```
//! use packwire::Reader;
//!
//! let segments: [&[u8]; 2] = [&[0xcd, 0x01], &[0x2c]];
//! let mut reader = Reader::from_segments(&segments);
//! assert_eq!(reader.read_u16().unwrap(), 300);
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;

use crate::code::{self, ext, MessagePackType, NIL};
use crate::cursor::{ensure_remaining, ByteCursor, Cursor};
use crate::decoders::{self, invalid_code, BooleanDecode, FloatDecode};
use crate::timestamp::Timestamp;
use crate::{MessagePackError, Result};

/// Limits applied while reading untrusted input.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Maximum nesting of arrays, maps and typeless values.
    pub max_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { max_depth: 512 }
    }
}

/// Type code and payload length of an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionHeader {
    pub type_code: i8,
    pub length: u32,
}

/// A whole extension: type code and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionResult<'a> {
    pub type_code: i8,
    pub data: Cow<'a, [u8]>,
}

/// MessagePack reader.
///
/// The default cursor handles both contiguous and segmented input. Use
/// `Reader<'a, SliceCursor<'a>>` when the input is always one slice.
#[derive(Debug, Clone)]
pub struct Reader<'a, C = ByteCursor<'a>> {
    cursor: C,
    options: ReaderOptions,
    depth: usize,
    _source: PhantomData<&'a [u8]>,
}

impl<'a> Reader<'a> {
    /// Reader over one contiguous buffer.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::from_cursor(ByteCursor::contiguous(bytes))
    }

    /// Reader over a logically contiguous sequence of segments.
    pub fn from_segments(segments: &'a [&'a [u8]]) -> Self {
        Self::from_cursor(ByteCursor::segmented(segments))
    }
}

impl<'a, C: Cursor<'a>> Reader<'a, C> {
    pub fn from_cursor(cursor: C) -> Self {
        Self::with_options(cursor, ReaderOptions::default())
    }

    pub fn with_options(cursor: C, options: ReaderOptions) -> Self {
        Self {
            cursor,
            options,
            depth: 0,
            _source: PhantomData,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn is_end(&self) -> bool {
        self.cursor.remaining() == 0
    }

    /// Current nesting level; zero between top-level values.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Marks the start of a nested structure, failing past `max_depth`.
    ///
    /// Every successful call must be matched by [`leave_nested`](Self::leave_nested),
    /// including on error paths. [`nested`](Self::nested) does that pairing for you.
    pub fn enter_nested(&mut self) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(MessagePackError::DepthExceeded(self.options.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Runs `f` one level deeper and restores the depth afterwards, whether or not
    /// `f` succeeded.
    ///
    /// ```
    /// use packwire::Reader;
    ///
    /// let mut reader = Reader::new(&[0x92, 0x01, 0xa1, b'x']);
    /// let count = reader.read_array_header().unwrap();
    /// let result = reader.nested(|r| {
    ///     for _ in 0..count {
    ///         r.read_u8()?;
    ///     }
    ///     Ok(())
    /// });
    /// assert!(result.is_err());
    /// assert_eq!(reader.depth(), 0);
    /// ```
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let depth = self.depth;
        self.enter_nested()?;
        let result = f(self);
        self.depth = depth;
        result
    }

    // --- inspection ---

    /// The next format byte, without consuming it.
    pub fn peek_code(&self) -> Result<u8> {
        self.cursor.peek_byte()
    }

    pub fn peek_type(&self) -> Result<MessagePackType> {
        Ok(code::type_of(self.peek_code()?))
    }

    /// Symbolic name of the next format byte, e.g. `"Str8"`.
    pub fn format_name(&self) -> Result<&'static str> {
        Ok(code::format_name(self.peek_code()?))
    }

    pub fn peek_is_nil(&self) -> Result<bool> {
        Ok(self.peek_code()? == NIL)
    }

    // --- nil / bool ---

    /// Consumes a nil, failing with [`MessagePackError::InvalidCode`] on any other byte.
    pub fn read_nil(&mut self) -> Result<()> {
        let code = self.peek_code()?;
        if code != NIL {
            return Err(invalid_code(code, "nil"));
        }
        self.cursor.advance_within_span(1);
        Ok(())
    }

    /// Consumes a nil if one is next; returns whether it did.
    pub fn try_read_nil(&mut self) -> Result<bool> {
        if self.peek_is_nil()? {
            self.cursor.advance_within_span(1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Reads `true` or `false`. Integers are not booleans.
    pub fn read_bool(&mut self) -> Result<bool> {
        let code = self.peek_code()?;
        let value = match decoders::BOOLEAN[code as usize] {
            BooleanDecode::Invalid => return Err(invalid_code(code, "bool")),
            BooleanDecode::False => false,
            BooleanDecode::True => true,
        };
        self.cursor.advance_within_span(1);
        Ok(value)
    }

    // --- integers ---

    /// Reads any integer without narrowing it.
    pub fn read_integer(&mut self) -> Result<decoders::Integer> {
        decoders::decode_integer(&mut self.cursor, "integer")
    }

    /// Reads any integer encoding that holds a value in range for `u8`.
    ///
    /// The encoded width does not matter, only the value: `uint64 5` reads fine, while
    /// `int8 -1` fails with [`MessagePackError::Overflow`]. The other fixed-width
    /// readers follow the same rule.
    ///
    /// ```
    /// use packwire::{MessagePackError, Reader};
    ///
    /// assert_eq!(Reader::new(&[0xcf, 0, 0, 0, 0, 0, 0, 0, 5]).read_u8().unwrap(), 5);
    /// let err = Reader::new(&[0xff]).read_u8().unwrap_err();
    /// assert!(matches!(err, MessagePackError::Overflow { .. }));
    /// ```
    pub fn read_u8(&mut self) -> Result<u8> {
        decoders::decode_integer(&mut self.cursor, "u8")?.convert("u8")
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        decoders::decode_integer(&mut self.cursor, "u16")?.convert("u16")
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        decoders::decode_integer(&mut self.cursor, "u32")?.convert("u32")
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        decoders::decode_integer(&mut self.cursor, "u64")?.convert("u64")
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        decoders::decode_integer(&mut self.cursor, "i8")?.convert("i8")
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        decoders::decode_integer(&mut self.cursor, "i16")?.convert("i16")
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        decoders::decode_integer(&mut self.cursor, "i32")?.convert("i32")
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        decoders::decode_integer(&mut self.cursor, "i64")?.convert("i64")
    }

    // --- floats ---

    /// Reads a float32, or a float64/integer converted to `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        let code = self.peek_code()?;
        match decoders::FLOAT[code as usize] {
            FloatDecode::Invalid => Err(invalid_code(code, "f32")),
            FloatDecode::Float32 => {
                let b = self.cursor.read_array::<5>()?;
                Ok(f32::from_be_bytes([b[1], b[2], b[3], b[4]]))
            }
            FloatDecode::Float64 => {
                self.cursor.advance_within_span(1);
                Ok(f64::from_be_bytes(self.cursor.read_array::<8>()?) as f32)
            }
            FloatDecode::Integer => Ok(self.read_integer_as_f64()? as f32),
        }
    }

    /// Reads a float64, or a float32/integer widened to `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        let code = self.peek_code()?;
        match decoders::FLOAT[code as usize] {
            FloatDecode::Invalid => Err(invalid_code(code, "f64")),
            FloatDecode::Float32 => {
                let b = self.cursor.read_array::<5>()?;
                Ok(f32::from_be_bytes([b[1], b[2], b[3], b[4]]) as f64)
            }
            FloatDecode::Float64 => {
                self.cursor.advance_within_span(1);
                Ok(f64::from_be_bytes(self.cursor.read_array::<8>()?))
            }
            FloatDecode::Integer => self.read_integer_as_f64(),
        }
    }

    fn read_integer_as_f64(&mut self) -> Result<f64> {
        Ok(match self.read_integer()? {
            decoders::Integer::Unsigned(v) => v as f64,
            decoders::Integer::Signed(v) => v as f64,
        })
    }

    // --- str / bin ---

    /// Reads a str header and returns the payload length.
    pub fn read_str_header(&mut self) -> Result<u32> {
        decoders::decode_length(&mut self.cursor, &decoders::STRING, "str")
    }

    /// Reads a string, borrowing from the input when it lies in one segment.
    pub fn read_str(&mut self) -> Result<Cow<'a, str>> {
        let len = self.read_str_header()? as usize;
        match self.cursor.read_slice(len)? {
            Cow::Borrowed(bytes) => Ok(Cow::Borrowed(std::str::from_utf8(bytes)?)),
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|e| MessagePackError::InvalidUtf8(e.utf8_error())),
        }
    }

    /// Reads a string into an owned `String`.
    pub fn read_string(&mut self) -> Result<String> {
        Ok(self.read_str()?.into_owned())
    }

    /// Reads a `char` written as its scalar value.
    pub fn read_char(&mut self) -> Result<char> {
        let scalar = self.read_u32()?;
        char::from_u32(scalar)
            .ok_or_else(|| MessagePackError::InvalidValue(format!("invalid char scalar value {:#x}", scalar)))
    }

    /// Reads a bin8, bin16 or bin32 header and returns the payload length.
    pub fn read_bin_header(&mut self) -> Result<u32> {
        decoders::decode_length(&mut self.cursor, &decoders::BINARY, "bin")
    }

    /// Reads a bin payload, borrowing from the input when it lies in one segment.
    pub fn read_bin(&mut self) -> Result<Cow<'a, [u8]>> {
        let len = self.read_bin_header()? as usize;
        self.cursor.read_slice(len)
    }

    // --- array / map headers ---

    /// Reads an array header. The caller must then read exactly that many values.
    ///
    /// Counts that could not possibly fit in the remaining input are rejected here, before
    /// anyone allocates for them.
    pub fn read_array_header(&mut self) -> Result<u32> {
        let count = decoders::decode_length(&mut self.cursor, &decoders::ARRAY, "array")?;
        ensure_remaining(count as usize, self.cursor.remaining())?;
        Ok(count)
    }

    /// Reads a map header. The caller must then read exactly that many key/value pairs.
    pub fn read_map_header(&mut self) -> Result<u32> {
        let count = decoders::decode_length(&mut self.cursor, &decoders::MAP, "map")?;
        ensure_remaining(count as usize * 2, self.cursor.remaining())?;
        Ok(count)
    }

    // --- extensions ---

    /// Reads a fixext or ext8/16/32 header. The payload is left for the caller.
    pub fn read_ext_header(&mut self) -> Result<ExtensionHeader> {
        let (type_code, length) = decoders::decode_extension_header(&mut self.cursor)?;
        Ok(ExtensionHeader { type_code, length })
    }

    /// Reads an extension header without consuming anything.
    pub fn peek_ext_header(&self) -> Result<ExtensionHeader>
    where
        C: Clone,
    {
        let mut probe = self.cursor.clone();
        let (type_code, length) = decoders::decode_extension_header(&mut probe)?;
        Ok(ExtensionHeader { type_code, length })
    }

    /// Reads a whole extension of any type code.
    pub fn read_ext(&mut self) -> Result<ExtensionResult<'a>> {
        let header = self.read_ext_header()?;
        let data = self.cursor.read_slice(header.length as usize)?;
        Ok(ExtensionResult {
            type_code: header.type_code,
            data,
        })
    }

    /// Reads an extension header and checks its type code.
    pub fn read_ext_header_of(&mut self, expected: i8) -> Result<ExtensionHeader> {
        let header = self.read_ext_header()?;
        if header.type_code != expected {
            return Err(MessagePackError::ExtensionTypeMismatch {
                expected,
                expected_name: ext::name(expected),
                actual: header.type_code,
            });
        }
        Ok(header)
    }

    /// Reads a timestamp extension (type code `-1`).
    pub fn read_timestamp(&mut self) -> Result<Timestamp> {
        let header = self.read_ext_header_of(ext::TIMESTAMP)?;
        match header.length {
            4 => Timestamp::from_payload(&self.cursor.read_array::<4>()?),
            8 => Timestamp::from_payload(&self.cursor.read_array::<8>()?),
            12 => Timestamp::from_payload(&self.cursor.read_array::<12>()?),
            other => Err(MessagePackError::InvalidValue(format!(
                "timestamp payload must be 4, 8 or 12 bytes, got {}",
                other
            ))),
        }
    }

    /// Reads a timestamp and its UTC offset in minutes.
    pub fn read_datetime_offset(&mut self) -> Result<(Timestamp, i16)> {
        let header = self.read_ext_header_of(ext::DATE_TIME_OFFSET)?;
        let payload = self.cursor.read_slice(header.length as usize)?;
        if !matches!(payload.len(), 6 | 10 | 14) {
            return Err(MessagePackError::InvalidValue(format!(
                "date-time offset payload must be 6, 10 or 14 bytes, got {}",
                payload.len()
            )));
        }
        let split = payload.len() - 2;
        let timestamp = Timestamp::from_payload(&payload[..split])?;
        let offset = i16::from_be_bytes([payload[split], payload[split + 1]]);
        Ok((timestamp, offset))
    }

    /// Reads exactly `N` payload bytes, e.g. after an extension header.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.cursor.read_array::<N>()
    }

    /// Reads `len` bytes as they are, e.g. an extension payload of variable length.
    pub fn read_raw_bytes(&mut self, len: usize) -> Result<Cow<'a, [u8]>> {
        self.cursor.read_slice(len)
    }

    // --- skipping ---

    /// Skips one token. For arrays and maps only the header is consumed.
    pub fn skip_token(&mut self) -> Result<()> {
        self.skip_inner(false)
    }

    /// Skips one complete value, including every child of an array or map.
    pub fn skip(&mut self) -> Result<()> {
        self.skip_inner(true)
    }

    fn skip_inner(&mut self, whole: bool) -> Result<()> {
        let code = self.peek_code()?;
        match code::type_of(code) {
            MessagePackType::Integer => {
                self.read_integer()?;
            }
            MessagePackType::Nil => self.read_nil()?,
            MessagePackType::Boolean => {
                self.read_bool()?;
            }
            MessagePackType::Float => {
                self.read_f64()?;
            }
            MessagePackType::String => {
                let len = self.read_str_header()?;
                self.cursor.advance(len as usize)?;
            }
            MessagePackType::Binary => {
                let len = self.read_bin_header()?;
                self.cursor.advance(len as usize)?;
            }
            MessagePackType::Extension => {
                let header = self.read_ext_header()?;
                self.cursor.advance(header.length as usize)?;
            }
            MessagePackType::Array => {
                let count = self.read_array_header()?;
                if whole {
                    self.nested(|r| (0..count).try_for_each(|_| r.skip_inner(true)))?;
                }
            }
            MessagePackType::Map => {
                let count = self.read_map_header()?;
                if whole {
                    self.nested(|r| (0..count as u64 * 2).try_for_each(|_| r.skip_inner(true)))?;
                }
            }
            MessagePackType::Unknown => return Err(invalid_code(code, "any value")),
        }
        Ok(())
    }

    /// Returns the encoded bytes of the next complete value and consumes them.
    pub fn read_raw(&mut self) -> Result<Cow<'a, [u8]>>
    where
        C: Clone,
    {
        let mut start = self.cursor.clone();
        let before = self.cursor.position();
        self.skip()?;
        let len = self.cursor.position() - before;
        start.read_slice(len)
    }
}
