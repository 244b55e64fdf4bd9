//! Formatters for primitive types, strings and binary blobs.
//!
//! Every primitive is written in its most compact encoding. The `Force*` formatters
//! always use the full-width tag instead; they are not builtin and must be registered
//! explicitly when a fixed-size encoding is required.

use std::ops::{Deref, DerefMut};

use bytes::Bytes;

use crate::formatter::{builtin, Formatter};
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

macro_rules! scalar_formatter {
    ($(#[$doc:meta])* $formatter:ident, $ty:ty, $write:ident, $read:ident) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $formatter;

        impl Formatter<$ty> for $formatter {
            fn serialize(&self, writer: &mut Writer, value: &$ty, _: &dyn FormatterResolver) -> Result<()> {
                writer.$write(*value);
                Ok(())
            }

            fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<$ty> {
                reader.$read()
            }
        }
    };
}

scalar_formatter!(BoolFormatter, bool, write_bool, read_bool);
scalar_formatter!(U8Formatter, u8, write_u8, read_u8);
scalar_formatter!(U16Formatter, u16, write_u16, read_u16);
scalar_formatter!(U32Formatter, u32, write_u32, read_u32);
scalar_formatter!(U64Formatter, u64, write_u64, read_u64);
scalar_formatter!(I8Formatter, i8, write_i8, read_i8);
scalar_formatter!(I16Formatter, i16, write_i16, read_i16);
scalar_formatter!(I32Formatter, i32, write_i32, read_i32);
scalar_formatter!(I64Formatter, i64, write_i64, read_i64);
scalar_formatter!(F32Formatter, f32, write_f32, read_f32);
scalar_formatter!(F64Formatter, f64, write_f64, read_f64);

scalar_formatter!(
    /// Always writes `0xcc` plus one byte.
    ForceU8Formatter, u8, write_u8_forced, read_u8
);
scalar_formatter!(
    /// Always writes `0xcd` plus two bytes.
    ForceU16Formatter, u16, write_u16_forced, read_u16
);
scalar_formatter!(ForceU32Formatter, u32, write_u32_forced, read_u32);
scalar_formatter!(ForceU64Formatter, u64, write_u64_forced, read_u64);
scalar_formatter!(
    /// Always writes `0xd0` plus one byte.
    ForceI8Formatter, i8, write_i8_forced, read_i8
);
scalar_formatter!(ForceI16Formatter, i16, write_i16_forced, read_i16);
scalar_formatter!(ForceI32Formatter, i32, write_i32_forced, read_i32);
scalar_formatter!(ForceI64Formatter, i64, write_i64_forced, read_i64);

builtin!(bool => BoolFormatter);
builtin!(u8 => U8Formatter);
builtin!(u16 => U16Formatter);
builtin!(u32 => U32Formatter);
builtin!(u64 => U64Formatter);
builtin!(i8 => I8Formatter);
builtin!(i16 => I16Formatter);
builtin!(i32 => I32Formatter);
builtin!(i64 => I64Formatter);
builtin!(f32 => F32Formatter);
builtin!(f64 => F64Formatter);

/// `usize` travels as a 64-bit unsigned integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsizeFormatter;

impl Formatter<usize> for UsizeFormatter {
    fn serialize(&self, writer: &mut Writer, value: &usize, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_u64(*value as u64);
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<usize> {
        reader.read_integer()?.convert("usize")
    }
}

/// `isize` travels as a 64-bit signed integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsizeFormatter;

impl Formatter<isize> for IsizeFormatter {
    fn serialize(&self, writer: &mut Writer, value: &isize, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_i64(*value as i64);
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<isize> {
        reader.read_integer()?.convert("isize")
    }
}

builtin!(usize => UsizeFormatter);
builtin!(isize => IsizeFormatter);

/// A `char` is its Unicode scalar value as an unsigned integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharFormatter;

impl Formatter<char> for CharFormatter {
    fn serialize(&self, writer: &mut Writer, value: &char, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_u32(*value as u32);
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<char> {
        reader.read_char()
    }
}

builtin!(char => CharFormatter);

/// `()` is nil.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitFormatter;

impl Formatter<()> for UnitFormatter {
    fn serialize(&self, writer: &mut Writer, _: &(), _: &dyn FormatterResolver) -> Result<()> {
        writer.write_nil();
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<()> {
        reader.read_nil()
    }
}

builtin!(() => UnitFormatter);

#[derive(Debug, Default, Clone, Copy)]
pub struct StringFormatter;

impl Formatter<String> for StringFormatter {
    fn serialize(&self, writer: &mut Writer, value: &String, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_str(value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<String> {
        reader.read_string()
    }
}

builtin!(String => StringFormatter);

/// Writes strings with a `str32` header regardless of length.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForceStr32Formatter;

impl Formatter<String> for ForceStr32Formatter {
    fn serialize(&self, writer: &mut Writer, value: &String, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_str_forced32(value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<String> {
        reader.read_string()
    }
}

/// `bytes::Bytes` as MessagePack bin.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesFormatter;

impl Formatter<Bytes> for BytesFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Bytes, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_bin(value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Bytes> {
        Ok(Bytes::from(reader.read_bin()?.into_owned()))
    }
}

builtin!(Bytes => BytesFormatter);

/// An owned byte buffer encoded as MessagePack bin.
///
/// `Vec<u8>` is a sequence like any other `Vec` and is written as an array of integers;
/// wrap it in `ByteBuf` to get the bin encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteBuf(pub Vec<u8>);

impl ByteBuf {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ByteBuf {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for ByteBuf {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl Deref for ByteBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for ByteBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl AsRef<[u8]> for ByteBuf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ByteBufFormatter;

impl Formatter<ByteBuf> for ByteBufFormatter {
    fn serialize(&self, writer: &mut Writer, value: &ByteBuf, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_bin(&value.0)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<ByteBuf> {
        Ok(ByteBuf(reader.read_bin()?.into_owned()))
    }
}

builtin!(ByteBuf => ByteBufFormatter);

/// Reads a bin payload into a fixed-size array, failing on any other length.
pub(crate) fn read_fixed_bin<const N: usize>(reader: &mut Reader<'_>, type_name: &'static str) -> Result<[u8; N]> {
    let len = reader.read_bin_header()? as usize;
    if len != N {
        return Err(MessagePackError::InvalidValue(format!(
            "{} expects {} bytes of binary, got {}",
            type_name, N, len
        )));
    }
    reader.read_fixed::<N>()
}
