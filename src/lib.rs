//! # packwire
//!
//! A MessagePack codec with table-driven decoding and pluggable formatters.
//!
//! - Bit-exact MessagePack wire format: nil, bool, integers, floats, str, bin, arrays,
//!   maps and extensions, always written in the most compact form
//! - Reads contiguous buffers and chunked (multi-segment) input through the same API
//! - Formatters for primitives, collections, tuples, `Option`, std value types and
//!   popular crates (chrono, uuid, rust_decimal, indexmap, smol_str)
//! - Resolvers that compose formatters recursively, plus a typeless path for values whose
//!   concrete type travels with the payload
//! - `#[derive(MessagePackObject)]` for structs and enums
//!
//! ## Attribute Macros
//!
//! - `#[msgpack(map)]` - On a struct: encode as a string-keyed map instead of an array.
//! - `#[msgpack(as_string)]` - On a unit-only enum: encode the variant name instead of its index.
//! - `#[msgpack(rename = "name")]` - Map key used for the field.
//! - `#[msgpack(skip)]` - The field is not written; on decode it is `Default::default()`.
//! - `#[msgpack(default)]` - A missing field decodes to `Default::default()` instead of failing.
//!
//! ## Feature Flags
//!
//! - `chrono` (default) - `DateTime<Utc>`, `DateTime<FixedOffset>`, `NaiveDateTime`, `NaiveDate`, `NaiveTime`.
//! - `uuid` (default) - `uuid::Uuid` as the Guid extension.
//! - `rust_decimal` (default) - `rust_decimal::Decimal` as the Decimal extension.
//! - `indexmap` - `IndexMap` and `IndexSet`.
//! - `smol_str` - `smol_str::SmolStr`.

pub mod code;
pub mod collections;
pub mod cursor;
pub mod decoders;
pub mod features;
pub mod formatter;
pub mod primitives;
pub mod reader;
pub mod resolver;
pub mod standard;
pub mod timestamp;
pub mod tuples;
pub mod typeless;
pub mod value;
pub mod writer;

use std::sync::Arc;

use bytes::Bytes;
pub use packwire_derive::MessagePackObject;

pub use crate::code::{ext, MessagePackType};
pub use crate::collections::{Array2, Stack};
pub use crate::cursor::{ByteCursor, Cursor, SegmentedCursor, SliceCursor};
#[cfg(feature = "rust_decimal")]
pub use crate::features::{DecimalFormatter, UnsafeDecimalFormatter};
#[cfg(feature = "uuid")]
pub use crate::features::{GuidFormatter, UnsafeGuidFormatter};
pub use crate::formatter::{ErasedFormatter, Formattable, Formatter};
pub use crate::primitives::ByteBuf;
pub use crate::reader::{ExtensionHeader, ExtensionResult, Reader, ReaderOptions};
pub use crate::resolver::{
    BuiltinResolver, CompositeResolver, FormatterResolver, RegistryResolver, StandardResolver,
    TypeKey,
};
pub use crate::timestamp::Timestamp;
pub use crate::typeless::{TypeHandle, TypeNameResolver, TypeRegistry, Typeless, TypelessFormatter};
pub use crate::value::Value;
pub use crate::writer::Writer;

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagePackError {
    /// The leading byte is not valid for the value being read.
    #[error("Invalid code 0x{code:02X} ({format}) while reading {expected}")]
    InvalidCode {
        code: u8,
        format: &'static str,
        expected: &'static str,
    },
    /// A fixed-arity structure holds a different number of elements than expected.
    #[error("Count mismatch for {type_name}: expected {expected}, got {actual}")]
    CountMismatch {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An extension carries a different type code than the one being read.
    #[error("Extension type mismatch: expected {expected} ({expected_name}), got {actual}")]
    ExtensionTypeMismatch {
        expected: i8,
        expected_name: &'static str,
        actual: i8,
    },
    /// The input ended before the value was complete.
    #[error("Insufficient data in buffer: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },
    /// No resolver in the chain has a formatter for the type.
    #[error("Formatter not registered for {type_name} (resolvers: {})", .chain.join(" -> "))]
    FormatterNotFound {
        type_name: &'static str,
        chain: Vec<String>,
    },
    /// An endian-dependent codec was used on a big-endian host.
    #[error("{0} requires a little-endian host")]
    PlatformNotSupported(&'static str),
    /// The decoded integer does not fit the requested type.
    #[error("Value {value} does not fit in {target}")]
    Overflow { value: i128, target: &'static str },
    #[error("Invalid UTF-8 in string payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// The bytes are well formed but do not describe a valid value of the target type.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Maximum nesting depth of {0} exceeded")]
    DepthExceeded(usize),
    /// A typeless payload names a type that is not registered.
    #[error("Unknown type name: {0}")]
    UnknownTypeName(String),
    /// A typeless value holds a type that has no registered name.
    #[error("Type {0:?} has no registered name")]
    UnregisteredType(std::any::TypeId),
    /// A derived formatter did not find a required field.
    #[error("Required field '{field}' not found for {type_name}")]
    MissingField {
        field: &'static str,
        type_name: &'static str,
    },
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, MessagePackError>;

/// Options for the convenience functions.
#[derive(Clone)]
pub struct SerializerOptions {
    pub resolver: Arc<dyn FormatterResolver>,
    pub reader: ReaderOptions,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            resolver: StandardResolver::shared(),
            reader: ReaderOptions::default(),
        }
    }
}

impl SerializerOptions {
    pub fn with_resolver(resolver: Arc<dyn FormatterResolver>) -> Self {
        Self {
            resolver,
            reader: ReaderOptions::default(),
        }
    }
}

/// Serializes a value with the standard resolver.
///
/// # Example
/// ```rust
/// use packwire::{serialize, deserialize, MessagePackObject};
///
/// #[derive(MessagePackObject, PartialEq, Debug)]
/// struct MyStruct {
///     id: u32,
///     name: String,
/// }
///
/// let value = MyStruct { id: 42, name: "hello".to_string() };
/// let bytes = serialize(&value).unwrap();
/// let decoded: MyStruct = deserialize(&bytes).unwrap();
/// assert_eq!(value, decoded);
/// ```
pub fn serialize<T: Formattable>(value: &T) -> Result<Bytes> {
    serialize_with(value, &SerializerOptions::default())
}

/// Serializes a value with the given options.
pub fn serialize_with<T: Formattable>(value: &T, options: &SerializerOptions) -> Result<Bytes> {
    let mut writer = Writer::new();
    serialize_into(&mut writer, value, options)?;
    Ok(writer.into_bytes())
}

/// Appends the encoding of `value` to an existing writer.
pub fn serialize_into<T: Formattable>(
    writer: &mut Writer,
    value: &T,
    options: &SerializerOptions,
) -> Result<()> {
    let resolver: &dyn FormatterResolver = options.resolver.as_ref();
    resolver.serialize_value(writer, value)
}

/// Deserializes one value from the start of `bytes` with the standard resolver.
pub fn deserialize<T: Formattable>(bytes: &[u8]) -> Result<T> {
    deserialize_with(bytes, &SerializerOptions::default())
}

pub fn deserialize_with<T: Formattable>(bytes: &[u8], options: &SerializerOptions) -> Result<T> {
    let mut reader = Reader::with_options(ByteCursor::contiguous(bytes), options.reader.clone());
    deserialize_from(&mut reader, options)
}

/// Deserializes one value from a sequence of segments.
///
/// The segments are read as one logical buffer; values may straddle segment boundaries.
pub fn deserialize_segments<T: Formattable>(segments: &[&[u8]]) -> Result<T> {
    let options = SerializerOptions::default();
    let mut reader = Reader::with_options(ByteCursor::segmented(segments), options.reader.clone());
    deserialize_from(&mut reader, &options)
}

/// Deserializes the next value from an existing reader.
pub fn deserialize_from<T: Formattable>(reader: &mut Reader<'_>, options: &SerializerOptions) -> Result<T> {
    let resolver: &dyn FormatterResolver = options.resolver.as_ref();
    resolver.deserialize_value(reader)
}
