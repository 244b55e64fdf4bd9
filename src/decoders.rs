//! Per-category dispatch tables indexed by the leading format byte.
//!
//! Each table has one entry for every possible byte. Construction starts from
//! `Invalid` everywhere and then overwrites the codes that are legal for the category,
//! so a byte that is not handled can only ever map to `Invalid`. The reader looks the
//! peeked byte up, then performs the action stored in the entry.
//!
//! All integer targets (`u8` through `i64`) share [`INTEGER`]; they differ only in the
//! checked conversion applied to the decoded value.

use crate::code::*;
use crate::cursor::Cursor;
use crate::{MessagePackError, Result};

/// How to decode an integer from its leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerDecode {
    Invalid,
    /// Value is the byte itself.
    PositiveFixInt,
    /// Value is the byte read as `i8`.
    NegativeFixInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
}

/// How to decode a float; integer codes widen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatDecode {
    Invalid,
    Float32,
    Float64,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanDecode {
    Invalid,
    False,
    True,
}

/// How to decode a length or count prefix (str, bin, array, map).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthDecode {
    Invalid,
    /// Length is `code & mask`.
    Fixed(u8),
    Size8,
    Size16,
    Size32,
}

/// How to decode an extension header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionDecode {
    Invalid,
    /// Fixed payload length; the type code follows the tag.
    Fixed(u32),
    Size8,
    Size16,
    Size32,
}

const fn build_integer_table() -> [IntegerDecode; 256] {
    let mut table = [IntegerDecode::Invalid; 256];
    let mut i = MIN_FIX_INT as usize;
    while i <= MAX_FIX_INT as usize {
        table[i] = IntegerDecode::PositiveFixInt;
        i += 1;
    }
    let mut i = MIN_NEGATIVE_FIX_INT as usize;
    while i <= MAX_NEGATIVE_FIX_INT as usize {
        table[i] = IntegerDecode::NegativeFixInt;
        i += 1;
    }
    table[UINT8 as usize] = IntegerDecode::UInt8;
    table[UINT16 as usize] = IntegerDecode::UInt16;
    table[UINT32 as usize] = IntegerDecode::UInt32;
    table[UINT64 as usize] = IntegerDecode::UInt64;
    table[INT8 as usize] = IntegerDecode::Int8;
    table[INT16 as usize] = IntegerDecode::Int16;
    table[INT32 as usize] = IntegerDecode::Int32;
    table[INT64 as usize] = IntegerDecode::Int64;
    table
}

const fn build_float_table() -> [FloatDecode; 256] {
    let ints = build_integer_table();
    let mut table = [FloatDecode::Invalid; 256];
    let mut i = 0usize;
    while i < 256 {
        if !matches!(ints[i], IntegerDecode::Invalid) {
            table[i] = FloatDecode::Integer;
        }
        i += 1;
    }
    table[FLOAT32 as usize] = FloatDecode::Float32;
    table[FLOAT64 as usize] = FloatDecode::Float64;
    table
}

const fn build_boolean_table() -> [BooleanDecode; 256] {
    let mut table = [BooleanDecode::Invalid; 256];
    table[FALSE as usize] = BooleanDecode::False;
    table[TRUE as usize] = BooleanDecode::True;
    table
}

const fn build_string_table() -> [LengthDecode; 256] {
    let mut table = [LengthDecode::Invalid; 256];
    let mut i = MIN_FIX_STR as usize;
    while i <= MAX_FIX_STR as usize {
        table[i] = LengthDecode::Fixed(0x1f);
        i += 1;
    }
    table[STR8 as usize] = LengthDecode::Size8;
    table[STR16 as usize] = LengthDecode::Size16;
    table[STR32 as usize] = LengthDecode::Size32;
    table
}

const fn build_binary_table() -> [LengthDecode; 256] {
    let mut table = [LengthDecode::Invalid; 256];
    table[BIN8 as usize] = LengthDecode::Size8;
    table[BIN16 as usize] = LengthDecode::Size16;
    table[BIN32 as usize] = LengthDecode::Size32;
    table
}

const fn build_array_table() -> [LengthDecode; 256] {
    let mut table = [LengthDecode::Invalid; 256];
    let mut i = MIN_FIX_ARRAY as usize;
    while i <= MAX_FIX_ARRAY as usize {
        table[i] = LengthDecode::Fixed(0x0f);
        i += 1;
    }
    table[ARRAY16 as usize] = LengthDecode::Size16;
    table[ARRAY32 as usize] = LengthDecode::Size32;
    table
}

const fn build_map_table() -> [LengthDecode; 256] {
    let mut table = [LengthDecode::Invalid; 256];
    let mut i = MIN_FIX_MAP as usize;
    while i <= MAX_FIX_MAP as usize {
        table[i] = LengthDecode::Fixed(0x0f);
        i += 1;
    }
    table[MAP16 as usize] = LengthDecode::Size16;
    table[MAP32 as usize] = LengthDecode::Size32;
    table
}

const fn build_extension_table() -> [ExtensionDecode; 256] {
    let mut table = [ExtensionDecode::Invalid; 256];
    table[FIX_EXT1 as usize] = ExtensionDecode::Fixed(1);
    table[FIX_EXT2 as usize] = ExtensionDecode::Fixed(2);
    table[FIX_EXT4 as usize] = ExtensionDecode::Fixed(4);
    table[FIX_EXT8 as usize] = ExtensionDecode::Fixed(8);
    table[FIX_EXT16 as usize] = ExtensionDecode::Fixed(16);
    table[EXT8 as usize] = ExtensionDecode::Size8;
    table[EXT16 as usize] = ExtensionDecode::Size16;
    table[EXT32 as usize] = ExtensionDecode::Size32;
    table
}

pub static INTEGER: [IntegerDecode; 256] = build_integer_table();
pub static FLOAT: [FloatDecode; 256] = build_float_table();
pub static BOOLEAN: [BooleanDecode; 256] = build_boolean_table();
pub static STRING: [LengthDecode; 256] = build_string_table();
pub static BINARY: [LengthDecode; 256] = build_binary_table();
pub static ARRAY: [LengthDecode; 256] = build_array_table();
pub static MAP: [LengthDecode; 256] = build_map_table();
pub static EXTENSION: [ExtensionDecode; 256] = build_extension_table();

/// A decoded integer before conversion to its target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integer {
    Unsigned(u64),
    Signed(i64),
}

impl Integer {
    pub fn as_i128(self) -> i128 {
        match self {
            Integer::Unsigned(v) => v as i128,
            Integer::Signed(v) => v as i128,
        }
    }

    /// Checked conversion; out-of-range values are an error, never wrapped.
    pub fn convert<T>(self, target: &'static str) -> Result<T>
    where
        T: TryFrom<u64> + TryFrom<i64>,
    {
        let converted = match self {
            Integer::Unsigned(v) => <T as TryFrom<u64>>::try_from(v).ok(),
            Integer::Signed(v) => <T as TryFrom<i64>>::try_from(v).ok(),
        };
        converted.ok_or(MessagePackError::Overflow {
            value: self.as_i128(),
            target,
        })
    }
}

pub(crate) fn invalid_code(code: u8, expected: &'static str) -> MessagePackError {
    MessagePackError::InvalidCode {
        code,
        format: format_name(code),
        expected,
    }
}

/// Reads one integer through [`INTEGER`].
pub(crate) fn decode_integer<'a, C: Cursor<'a>>(cursor: &mut C, expected: &'static str) -> Result<Integer> {
    let code = cursor.peek_byte()?;
    let value = match INTEGER[code as usize] {
        IntegerDecode::Invalid => return Err(invalid_code(code, expected)),
        IntegerDecode::PositiveFixInt => {
            cursor.advance_within_span(1);
            Integer::Unsigned(code as u64)
        }
        IntegerDecode::NegativeFixInt => {
            cursor.advance_within_span(1);
            Integer::Signed(code as i8 as i64)
        }
        IntegerDecode::UInt8 => {
            let [_, v] = cursor.read_array::<2>()?;
            Integer::Unsigned(v as u64)
        }
        IntegerDecode::UInt16 => {
            let b = cursor.read_array::<3>()?;
            Integer::Unsigned(u16::from_be_bytes([b[1], b[2]]) as u64)
        }
        IntegerDecode::UInt32 => {
            let b = cursor.read_array::<5>()?;
            Integer::Unsigned(u32::from_be_bytes([b[1], b[2], b[3], b[4]]) as u64)
        }
        IntegerDecode::UInt64 => {
            cursor.advance_within_span(1);
            Integer::Unsigned(u64::from_be_bytes(cursor.read_array::<8>()?))
        }
        IntegerDecode::Int8 => {
            let [_, v] = cursor.read_array::<2>()?;
            Integer::Signed(v as i8 as i64)
        }
        IntegerDecode::Int16 => {
            let b = cursor.read_array::<3>()?;
            Integer::Signed(i16::from_be_bytes([b[1], b[2]]) as i64)
        }
        IntegerDecode::Int32 => {
            let b = cursor.read_array::<5>()?;
            Integer::Signed(i32::from_be_bytes([b[1], b[2], b[3], b[4]]) as i64)
        }
        IntegerDecode::Int64 => {
            cursor.advance_within_span(1);
            Integer::Signed(i64::from_be_bytes(cursor.read_array::<8>()?))
        }
    };
    Ok(value)
}

/// Reads a length or count prefix through one of the length tables.
pub(crate) fn decode_length<'a, C: Cursor<'a>>(
    cursor: &mut C,
    table: &[LengthDecode; 256],
    expected: &'static str,
) -> Result<u32> {
    let code = cursor.peek_byte()?;
    let length = match table[code as usize] {
        LengthDecode::Invalid => return Err(invalid_code(code, expected)),
        LengthDecode::Fixed(mask) => {
            cursor.advance_within_span(1);
            (code & mask) as u32
        }
        LengthDecode::Size8 => {
            let [_, len] = cursor.read_array::<2>()?;
            len as u32
        }
        LengthDecode::Size16 => {
            let b = cursor.read_array::<3>()?;
            u16::from_be_bytes([b[1], b[2]]) as u32
        }
        LengthDecode::Size32 => {
            let b = cursor.read_array::<5>()?;
            u32::from_be_bytes([b[1], b[2], b[3], b[4]])
        }
    };
    Ok(length)
}

/// Reads an extension header, returning `(type_code, payload_length)`.
pub(crate) fn decode_extension_header<'a, C: Cursor<'a>>(cursor: &mut C) -> Result<(i8, u32)> {
    let code = cursor.peek_byte()?;
    let header = match EXTENSION[code as usize] {
        ExtensionDecode::Invalid => return Err(invalid_code(code, "extension")),
        ExtensionDecode::Fixed(length) => {
            let [_, type_code] = cursor.read_array::<2>()?;
            (type_code as i8, length)
        }
        ExtensionDecode::Size8 => {
            let [_, len, type_code] = cursor.read_array::<3>()?;
            (type_code as i8, len as u32)
        }
        ExtensionDecode::Size16 => {
            let b = cursor.read_array::<4>()?;
            (b[3] as i8, u16::from_be_bytes([b[1], b[2]]) as u32)
        }
        ExtensionDecode::Size32 => {
            let b = cursor.read_array::<6>()?;
            (b[5] as i8, u32::from_be_bytes([b[1], b[2], b[3], b[4]]))
        }
    };
    Ok(header)
}
