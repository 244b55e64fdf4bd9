//! A dynamically typed MessagePack value.
//!
//! [`Value`] can hold any payload without knowing its static type. It is what the typeless
//! path decodes to when a payload carries no type name, and what tests and tools use to
//! inspect unknown input.

use std::fmt;

use bytes::Bytes;

use crate::code::MessagePackType;
use crate::decoders::{invalid_code, Integer};
use crate::formatter::{builtin, Formatter};
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::writer::Writer;
use crate::Result;

/// Any MessagePack value.
///
/// Integers decode to `UInt` when non-negative and to `Int` otherwise, regardless of the
/// wire width, so equal numbers compare equal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    /// A negative integer.
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Bytes),
    Array(Vec<Value>),
    /// Key/value pairs in wire order. Keys may repeat.
    Map(Vec<(Value, Value)>),
    Extension(i8, Bytes),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// First value stored under a string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// The wire category this value encodes to.
    pub fn kind(&self) -> MessagePackType {
        match self {
            Value::Nil => MessagePackType::Nil,
            Value::Bool(_) => MessagePackType::Boolean,
            Value::Int(_) | Value::UInt(_) => MessagePackType::Integer,
            Value::F32(_) | Value::F64(_) => MessagePackType::Float,
            Value::String(_) => MessagePackType::String,
            Value::Binary(_) => MessagePackType::Binary,
            Value::Array(_) => MessagePackType::Array,
            Value::Map(_) => MessagePackType::Map,
            Value::Extension(..) => MessagePackType::Extension,
        }
    }

    /// Writes the value in its most compact encoding.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        match self {
            Value::Nil => writer.write_nil(),
            Value::Bool(b) => writer.write_bool(*b),
            Value::Int(v) => writer.write_i64(*v),
            Value::UInt(v) => writer.write_u64(*v),
            Value::F32(v) => writer.write_f32(*v),
            Value::F64(v) => writer.write_f64(*v),
            Value::String(s) => writer.write_str(s)?,
            Value::Binary(b) => writer.write_bin(b)?,
            Value::Array(items) => {
                writer.write_array_header(items.len())?;
                for item in items {
                    item.write(writer)?;
                }
            }
            Value::Map(entries) => {
                writer.write_map_header(entries.len())?;
                for (k, v) in entries {
                    k.write(writer)?;
                    v.write(writer)?;
                }
            }
            Value::Extension(type_code, data) => writer.write_ext(*type_code, data)?,
        }
        Ok(())
    }

    /// Reads one complete value, honoring the reader's depth limit.
    pub fn read(reader: &mut Reader<'_>) -> Result<Value> {
        let code = reader.peek_code()?;
        let value = match reader.peek_type()? {
            MessagePackType::Nil => {
                reader.read_nil()?;
                Value::Nil
            }
            MessagePackType::Boolean => Value::Bool(reader.read_bool()?),
            MessagePackType::Integer => match reader.read_integer()? {
                Integer::Unsigned(v) => Value::UInt(v),
                Integer::Signed(v) if v >= 0 => Value::UInt(v as u64),
                Integer::Signed(v) => Value::Int(v),
            },
            MessagePackType::Float => {
                if code == crate::code::FLOAT32 {
                    Value::F32(reader.read_f32()?)
                } else {
                    Value::F64(reader.read_f64()?)
                }
            }
            MessagePackType::String => Value::String(reader.read_string()?),
            MessagePackType::Binary => Value::Binary(Bytes::from(reader.read_bin()?.into_owned())),
            MessagePackType::Array => {
                let count = reader.read_array_header()? as usize;
                let items: Vec<Value> = reader.nested(|reader| (0..count).map(|_| Value::read(reader)).collect())?;
                Value::Array(items)
            }
            MessagePackType::Map => {
                let count = reader.read_map_header()? as usize;
                let entries = reader.nested(|reader| {
                    let mut entries = Vec::with_capacity(count);
                    for _ in 0..count {
                        let k = Value::read(reader)?;
                        let v = Value::read(reader)?;
                        entries.push((k, v));
                    }
                    Ok(entries)
                })?;
                Value::Map(entries)
            }
            MessagePackType::Extension => {
                let ext = reader.read_ext()?;
                Value::Extension(ext.type_code, Bytes::from(ext.data.into_owned()))
            }
            MessagePackType::Unknown => return Err(invalid_code(code, "any value")),
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Binary(b) => write!(f, "bin({} bytes)", b.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Extension(type_code, data) => write!(f, "ext({}, {} bytes)", type_code, data.len()),
        }
    }
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::UInt(v as u64)
            }
        }
    )*};
}

macro_rules! from_signed {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                if v < 0 {
                    Value::Int(v as i64)
                } else {
                    Value::UInt(v as u64)
                }
            }
        }
    )*};
}

from_unsigned!(u8, u16, u32, u64);
from_signed!(i8, i16, i32, i64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Formatter for [`Value`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueFormatter;

impl Formatter<Value> for ValueFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Value, _: &dyn FormatterResolver) -> Result<()> {
        value.write(writer)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Value> {
        Value::read(reader)
    }
}

builtin!(Value => ValueFormatter);
