//! Format codes of the MessagePack wire format.
//!
//! The first byte of every encoded value is one of these codes (or falls inside one of
//! the fixed ranges). They are part of the wire format and never change.
//!
//! - `MIN_*`/`MAX_*` pairs bound the ranges whose low bits carry a value or a length.
//! - Everything else is a single code followed by a big-endian suffix.

pub const MIN_FIX_INT: u8 = 0x00;
pub const MAX_FIX_INT: u8 = 0x7f;
pub const MIN_FIX_MAP: u8 = 0x80;
pub const MAX_FIX_MAP: u8 = 0x8f;
pub const MIN_FIX_ARRAY: u8 = 0x90;
pub const MAX_FIX_ARRAY: u8 = 0x9f;
pub const MIN_FIX_STR: u8 = 0xa0;
pub const MAX_FIX_STR: u8 = 0xbf;
pub const NIL: u8 = 0xc0;
/// Never used by the format; always an invalid code.
pub const NEVER_USED: u8 = 0xc1;
pub const FALSE: u8 = 0xc2;
pub const TRUE: u8 = 0xc3;
pub const BIN8: u8 = 0xc4;
pub const BIN16: u8 = 0xc5;
pub const BIN32: u8 = 0xc6;
pub const EXT8: u8 = 0xc7;
pub const EXT16: u8 = 0xc8;
pub const EXT32: u8 = 0xc9;
pub const FLOAT32: u8 = 0xca;
pub const FLOAT64: u8 = 0xcb;
pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;
pub const INT8: u8 = 0xd0;
pub const INT16: u8 = 0xd1;
pub const INT32: u8 = 0xd2;
pub const INT64: u8 = 0xd3;
pub const FIX_EXT1: u8 = 0xd4;
pub const FIX_EXT2: u8 = 0xd5;
pub const FIX_EXT4: u8 = 0xd6;
pub const FIX_EXT8: u8 = 0xd7;
pub const FIX_EXT16: u8 = 0xd8;
pub const STR8: u8 = 0xd9;
pub const STR16: u8 = 0xda;
pub const STR32: u8 = 0xdb;
pub const ARRAY16: u8 = 0xdc;
pub const ARRAY32: u8 = 0xdd;
pub const MAP16: u8 = 0xde;
pub const MAP32: u8 = 0xdf;
pub const MIN_NEGATIVE_FIX_INT: u8 = 0xe0;
pub const MAX_NEGATIVE_FIX_INT: u8 = 0xff;

/// Smallest value representable as a negative fixint.
pub const MIN_FIX_NEGATIVE_INT: i64 = -32;
/// Largest length/count that fits in the low bits of a fixstr tag.
pub const MAX_FIX_STR_LEN: usize = 31;
/// Largest count that fits in the low bits of a fixarray/fixmap tag.
pub const MAX_FIX_COLLECTION_LEN: usize = 15;

/// Extension type codes reserved by this library.
///
/// User extensions should use codes `0..=98`. Negative codes are reserved by the
/// MessagePack specification itself; only `-1` (timestamp) is defined there.
pub mod ext {
    /// Standard MessagePack timestamp.
    pub const TIMESTAMP: i8 = -1;
    /// LZ4-compressed block. The code is reserved; compression is not implemented.
    pub const LZ4: i8 = 99;
    /// Self-describing value carrying its type name.
    pub const TYPELESS: i8 = 100;
    /// Timestamp followed by a UTC offset in minutes.
    pub const DATE_TIME_OFFSET: i8 = 101;
    pub const GUID: i8 = 102;
    pub const DECIMAL: i8 = 103;

    /// Symbolic name of a reserved code, used in error messages.
    pub fn name(code: i8) -> &'static str {
        match code {
            TIMESTAMP => "Timestamp",
            LZ4 => "Lz4",
            TYPELESS => "Typeless",
            DATE_TIME_OFFSET => "DateTimeOffset",
            GUID => "Guid",
            DECIMAL => "Decimal",
            c if c >= 0 => "User",
            _ => "Reserved",
        }
    }
}

/// Broad category of a wire value, as determined by its leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessagePackType {
    Unknown,
    Integer,
    Nil,
    Boolean,
    Float,
    String,
    Binary,
    Array,
    Map,
    Extension,
}

impl std::fmt::Display for MessagePackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

const fn build_type_table() -> [MessagePackType; 256] {
    let mut table = [MessagePackType::Unknown; 256];
    let mut i = 0usize;
    while i < 256 {
        let code = i as u8;
        table[i] = match code {
            MIN_FIX_INT..=MAX_FIX_INT => MessagePackType::Integer,
            MIN_FIX_MAP..=MAX_FIX_MAP => MessagePackType::Map,
            MIN_FIX_ARRAY..=MAX_FIX_ARRAY => MessagePackType::Array,
            MIN_FIX_STR..=MAX_FIX_STR => MessagePackType::String,
            NIL => MessagePackType::Nil,
            NEVER_USED => MessagePackType::Unknown,
            FALSE | TRUE => MessagePackType::Boolean,
            BIN8 | BIN16 | BIN32 => MessagePackType::Binary,
            EXT8 | EXT16 | EXT32 => MessagePackType::Extension,
            FLOAT32 | FLOAT64 => MessagePackType::Float,
            UINT8 | UINT16 | UINT32 | UINT64 => MessagePackType::Integer,
            INT8 | INT16 | INT32 | INT64 => MessagePackType::Integer,
            FIX_EXT1..=FIX_EXT16 => MessagePackType::Extension,
            STR8 | STR16 | STR32 => MessagePackType::String,
            ARRAY16 | ARRAY32 => MessagePackType::Array,
            MAP16 | MAP32 => MessagePackType::Map,
            MIN_NEGATIVE_FIX_INT..=MAX_NEGATIVE_FIX_INT => MessagePackType::Integer,
        };
        i += 1;
    }
    table
}

static TYPE_TABLE: [MessagePackType; 256] = build_type_table();

/// Returns the value category for a leading byte.
#[inline]
pub fn type_of(code: u8) -> MessagePackType {
    TYPE_TABLE[code as usize]
}

const fn build_name_table() -> [&'static str; 256] {
    let mut table = ["NeverUsed"; 256];
    let mut i = 0usize;
    while i < 256 {
        let code = i as u8;
        table[i] = match code {
            MIN_FIX_INT..=MAX_FIX_INT => "PositiveFixInt",
            MIN_FIX_MAP..=MAX_FIX_MAP => "FixMap",
            MIN_FIX_ARRAY..=MAX_FIX_ARRAY => "FixArray",
            MIN_FIX_STR..=MAX_FIX_STR => "FixStr",
            NIL => "Nil",
            NEVER_USED => "NeverUsed",
            FALSE => "False",
            TRUE => "True",
            BIN8 => "Bin8",
            BIN16 => "Bin16",
            BIN32 => "Bin32",
            EXT8 => "Ext8",
            EXT16 => "Ext16",
            EXT32 => "Ext32",
            FLOAT32 => "Float32",
            FLOAT64 => "Float64",
            UINT8 => "UInt8",
            UINT16 => "UInt16",
            UINT32 => "UInt32",
            UINT64 => "UInt64",
            INT8 => "Int8",
            INT16 => "Int16",
            INT32 => "Int32",
            INT64 => "Int64",
            FIX_EXT1 => "FixExt1",
            FIX_EXT2 => "FixExt2",
            FIX_EXT4 => "FixExt4",
            FIX_EXT8 => "FixExt8",
            FIX_EXT16 => "FixExt16",
            STR8 => "Str8",
            STR16 => "Str16",
            STR32 => "Str32",
            ARRAY16 => "Array16",
            ARRAY32 => "Array32",
            MAP16 => "Map16",
            MAP32 => "Map32",
            MIN_NEGATIVE_FIX_INT..=MAX_NEGATIVE_FIX_INT => "NegativeFixInt",
        };
        i += 1;
    }
    table
}

static NAME_TABLE: [&str; 256] = build_name_table();

/// Human-readable name of a format code, e.g. `"Int32"` for `0xd2`.
#[inline]
pub fn format_name(code: u8) -> &'static str {
    NAME_TABLE[code as usize]
}
