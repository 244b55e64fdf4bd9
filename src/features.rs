//! Formatters for optional third-party types, each behind its Cargo feature.
//!
//! - `chrono`: `DateTime<Utc>` and `NaiveDateTime` as timestamps, `DateTime<FixedOffset>`
//!   as the DateTimeOffset extension, `NaiveDate` as days from the common era,
//!   `NaiveTime` as `[seconds_from_midnight, nanoseconds]`
//! - `uuid`: the Guid extension
//! - `rust_decimal`: the Decimal extension
//! - `indexmap`: `IndexMap` and `IndexSet`, order preserved
//! - `smol_str`: `SmolStr` as str

#[cfg(feature = "chrono")]
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
#[cfg(feature = "rust_decimal")]
use rust_decimal::Decimal;
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;
#[cfg(feature = "uuid")]
use uuid::Uuid;

#[cfg(any(feature = "uuid", feature = "rust_decimal"))]
use crate::code::ext;
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal", feature = "smol_str"))]
use crate::formatter::{builtin, Formatter};
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal", feature = "smol_str"))]
use crate::reader::Reader;
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal", feature = "smol_str"))]
use crate::resolver::FormatterResolver;
#[cfg(feature = "chrono")]
use crate::timestamp::Timestamp;
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal", feature = "smol_str"))]
use crate::writer::Writer;
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal"))]
use crate::MessagePackError;
#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal", feature = "smol_str"))]
use crate::Result;

/// Reads the header of a fixed-size extension and checks code and length.
#[cfg(any(feature = "uuid", feature = "rust_decimal"))]
fn read_fixed_ext<const N: usize>(reader: &mut Reader<'_>, type_code: i8) -> Result<[u8; N]> {
    let header = reader.read_ext_header_of(type_code)?;
    if header.length as usize != N {
        return Err(MessagePackError::InvalidValue(format!(
            "{} extension must be {} bytes, got {}",
            ext::name(type_code),
            N,
            header.length
        )));
    }
    reader.read_fixed::<N>()
}

/// Fails on big-endian hosts before any raw memory is touched.
#[cfg(any(feature = "uuid", feature = "rust_decimal"))]
fn require_little_endian(formatter: &'static str) -> Result<()> {
    if cfg!(target_endian = "little") {
        Ok(())
    } else {
        Err(MessagePackError::PlatformNotSupported(formatter))
    }
}

// --- DateTime<Utc> ---

#[cfg(feature = "chrono")]
fn timestamp_of(value: &DateTime<Utc>) -> Result<Timestamp> {
    Timestamp::new(value.timestamp(), value.timestamp_subsec_nanos())
}

#[cfg(feature = "chrono")]
fn datetime_of(ts: Timestamp) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts.seconds(), ts.nanoseconds()).ok_or_else(|| {
        MessagePackError::InvalidValue(format!(
            "timestamp out of range: {} seconds, {} nanos",
            ts.seconds(),
            ts.nanoseconds()
        ))
    })
}

/// `DateTime<Utc>` as the timestamp extension.
#[cfg(feature = "chrono")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTimeUtcFormatter;

#[cfg(feature = "chrono")]
impl Formatter<DateTime<Utc>> for DateTimeUtcFormatter {
    fn serialize(&self, writer: &mut Writer, value: &DateTime<Utc>, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_timestamp(timestamp_of(value)?)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<DateTime<Utc>> {
        datetime_of(reader.read_timestamp()?)
    }
}

#[cfg(feature = "chrono")]
builtin!(DateTime<Utc> => DateTimeUtcFormatter);

// --- NaiveDateTime ---

/// `NaiveDateTime` as the timestamp extension, read as UTC.
#[cfg(feature = "chrono")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveDateTimeFormatter;

#[cfg(feature = "chrono")]
impl Formatter<NaiveDateTime> for NaiveDateTimeFormatter {
    fn serialize(&self, writer: &mut Writer, value: &NaiveDateTime, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_timestamp(timestamp_of(&Utc.from_utc_datetime(value))?)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<NaiveDateTime> {
        Ok(datetime_of(reader.read_timestamp()?)?.naive_utc())
    }
}

#[cfg(feature = "chrono")]
builtin!(NaiveDateTime => NaiveDateTimeFormatter);

// --- DateTime<FixedOffset> ---

/// `DateTime<FixedOffset>` as the DateTimeOffset extension: the UTC instant followed by
/// the offset in whole minutes.
#[cfg(feature = "chrono")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTimeOffsetFormatter;

#[cfg(feature = "chrono")]
impl Formatter<DateTime<FixedOffset>> for DateTimeOffsetFormatter {
    fn serialize(&self, writer: &mut Writer, value: &DateTime<FixedOffset>, _: &dyn FormatterResolver) -> Result<()> {
        let offset_seconds = value.offset().local_minus_utc();
        if offset_seconds % 60 != 0 {
            return Err(MessagePackError::Encode(format!(
                "UTC offset of {} seconds is not a whole number of minutes",
                offset_seconds
            )));
        }
        let ts = timestamp_of(&value.with_timezone(&Utc))?;
        writer.write_datetime_offset(ts, (offset_seconds / 60) as i16)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<DateTime<FixedOffset>> {
        let (ts, offset_minutes) = reader.read_datetime_offset()?;
        let offset = FixedOffset::east_opt(offset_minutes as i32 * 60).ok_or_else(|| {
            MessagePackError::InvalidValue(format!("UTC offset out of range: {} minutes", offset_minutes))
        })?;
        Ok(datetime_of(ts)?.with_timezone(&offset))
    }
}

#[cfg(feature = "chrono")]
builtin!(DateTime<FixedOffset> => DateTimeOffsetFormatter);

// --- NaiveDate ---

/// `NaiveDate` as the number of days since 0001-01-01 (day 1).
#[cfg(feature = "chrono")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveDateFormatter;

#[cfg(feature = "chrono")]
impl Formatter<NaiveDate> for NaiveDateFormatter {
    fn serialize(&self, writer: &mut Writer, value: &NaiveDate, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_i32(value.num_days_from_ce());
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<NaiveDate> {
        let days = reader.read_i32()?;
        NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or_else(|| MessagePackError::InvalidValue(format!("date out of range: {} days from CE", days)))
    }
}

#[cfg(feature = "chrono")]
builtin!(NaiveDate => NaiveDateFormatter);

// --- NaiveTime ---

#[cfg(feature = "chrono")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveTimeFormatter;

#[cfg(feature = "chrono")]
impl Formatter<NaiveTime> for NaiveTimeFormatter {
    fn serialize(&self, writer: &mut Writer, value: &NaiveTime, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_fixarray_header_unchecked(2);
        writer.write_u32(value.num_seconds_from_midnight());
        writer.write_u32(value.nanosecond());
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<NaiveTime> {
        let count = reader.read_array_header()? as usize;
        if count != 2 {
            return Err(MessagePackError::CountMismatch {
                type_name: "NaiveTime",
                expected: 2,
                actual: count,
            });
        }
        let seconds = reader.read_u32()?;
        let nanoseconds = reader.read_u32()?;
        NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanoseconds).ok_or_else(|| {
            MessagePackError::InvalidValue(format!(
                "invalid time: {} seconds from midnight, {} nanos",
                seconds, nanoseconds
            ))
        })
    }
}

#[cfg(feature = "chrono")]
builtin!(NaiveTime => NaiveTimeFormatter);

// --- Guid ---

/// `Uuid` as the Guid extension, written field by field.
///
/// Payload: `d1` u32 LE, `d2` u16 LE, `d3` u16 LE, then the 8 bytes of `d4` as stored.
#[cfg(feature = "uuid")]
#[derive(Debug, Default, Clone, Copy)]
pub struct GuidFormatter;

#[cfg(feature = "uuid")]
impl Formatter<Uuid> for GuidFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Uuid, _: &dyn FormatterResolver) -> Result<()> {
        let (d1, d2, d3, d4) = value.as_fields();
        let mut payload = [0u8; 16];
        payload[0..4].copy_from_slice(&d1.to_le_bytes());
        payload[4..6].copy_from_slice(&d2.to_le_bytes());
        payload[6..8].copy_from_slice(&d3.to_le_bytes());
        payload[8..16].copy_from_slice(d4);
        writer.write_ext(ext::GUID, &payload)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Uuid> {
        let p = read_fixed_ext::<16>(reader, ext::GUID)?;
        let d1 = u32::from_le_bytes([p[0], p[1], p[2], p[3]]);
        let d2 = u16::from_le_bytes([p[4], p[5]]);
        let d3 = u16::from_le_bytes([p[6], p[7]]);
        let mut d4 = [0u8; 8];
        d4.copy_from_slice(&p[8..16]);
        Ok(Uuid::from_fields(d1, d2, d3, &d4))
    }
}

#[cfg(feature = "uuid")]
builtin!(Uuid => GuidFormatter);

#[cfg(feature = "uuid")]
#[repr(C)]
#[derive(Clone, Copy)]
struct GuidLayout {
    d1: u32,
    d2: u16,
    d3: u16,
    d4: [u8; 8],
}

/// Same bytes as [`GuidFormatter`], produced by copying the in-memory field layout.
///
/// Only valid on little-endian hosts; elsewhere both directions fail with
/// [`MessagePackError::PlatformNotSupported`]. Not builtin: register it to use it.
#[cfg(feature = "uuid")]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsafeGuidFormatter;

#[cfg(feature = "uuid")]
impl Formatter<Uuid> for UnsafeGuidFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Uuid, _: &dyn FormatterResolver) -> Result<()> {
        require_little_endian("UnsafeGuidFormatter")?;
        let (d1, d2, d3, d4) = value.as_fields();
        let layout = GuidLayout { d1, d2, d3, d4: *d4 };
        // SAFETY: GuidLayout is repr(C) with no padding and exactly 16 bytes.
        let payload: [u8; 16] = unsafe { std::mem::transmute::<GuidLayout, [u8; 16]>(layout) };
        writer.write_ext_header(ext::GUID, 16)?;
        writer.ensure_capacity(16);
        // SAFETY: capacity for 16 bytes was reserved on the line above.
        unsafe { writer.write_raw_unchecked(&payload) };
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Uuid> {
        require_little_endian("UnsafeGuidFormatter")?;
        let payload = read_fixed_ext::<16>(reader, ext::GUID)?;
        // SAFETY: any 16 bytes form a valid GuidLayout; the read is unaligned.
        let layout = unsafe { std::ptr::read_unaligned(payload.as_ptr() as *const GuidLayout) };
        Ok(Uuid::from_fields(layout.d1, layout.d2, layout.d3, &layout.d4))
    }
}

// --- Decimal ---

#[cfg(feature = "rust_decimal")]
const MAX_DECIMAL_SCALE: u32 = 28;
#[cfg(feature = "rust_decimal")]
const SIGN_MASK: u32 = 0x8000_0000;
#[cfg(feature = "rust_decimal")]
const SCALE_SHIFT: u32 = 16;

/// `[flags, lo, mid, hi]` of a decimal.
#[cfg(feature = "rust_decimal")]
fn decimal_words(value: &Decimal) -> [u32; 4] {
    let magnitude = value.mantissa().unsigned_abs();
    let mut flags = value.scale() << SCALE_SHIFT;
    if value.is_sign_negative() {
        flags |= SIGN_MASK;
    }
    [
        flags,
        magnitude as u32,
        (magnitude >> 32) as u32,
        (magnitude >> 64) as u32,
    ]
}

#[cfg(feature = "rust_decimal")]
fn decimal_from_words([flags, lo, mid, hi]: [u32; 4]) -> Result<Decimal> {
    let scale = (flags >> SCALE_SHIFT) & 0xff;
    if scale > MAX_DECIMAL_SCALE || flags & !(SIGN_MASK | (0xff << SCALE_SHIFT)) != 0 {
        return Err(MessagePackError::InvalidValue(format!("invalid decimal flags {:#010x}", flags)));
    }
    Ok(Decimal::from_parts(lo, mid, hi, flags & SIGN_MASK != 0, scale))
}

/// `Decimal` as the Decimal extension: flags, lo, mid and hi as little-endian u32 words.
#[cfg(feature = "rust_decimal")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DecimalFormatter;

#[cfg(feature = "rust_decimal")]
impl Formatter<Decimal> for DecimalFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Decimal, _: &dyn FormatterResolver) -> Result<()> {
        let mut payload = [0u8; 16];
        for (chunk, word) in payload.chunks_exact_mut(4).zip(decimal_words(value)) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        writer.write_ext(ext::DECIMAL, &payload)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Decimal> {
        let payload = read_fixed_ext::<16>(reader, ext::DECIMAL)?;
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(payload.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        decimal_from_words(words)
    }
}

#[cfg(feature = "rust_decimal")]
builtin!(Decimal => DecimalFormatter);

/// Same bytes as [`DecimalFormatter`], produced by copying the four words as they sit
/// in memory. Little-endian hosts only. Not builtin: register it to use it.
#[cfg(feature = "rust_decimal")]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsafeDecimalFormatter;

#[cfg(feature = "rust_decimal")]
impl Formatter<Decimal> for UnsafeDecimalFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Decimal, _: &dyn FormatterResolver) -> Result<()> {
        require_little_endian("UnsafeDecimalFormatter")?;
        let words = decimal_words(value);
        // SAFETY: [u32; 4] and [u8; 16] have the same size and no invalid bit patterns.
        let payload: [u8; 16] = unsafe { std::mem::transmute::<[u32; 4], [u8; 16]>(words) };
        writer.write_ext_header(ext::DECIMAL, 16)?;
        writer.ensure_capacity(16);
        // SAFETY: capacity for 16 bytes was reserved on the line above.
        unsafe { writer.write_raw_unchecked(&payload) };
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Decimal> {
        require_little_endian("UnsafeDecimalFormatter")?;
        let payload = read_fixed_ext::<16>(reader, ext::DECIMAL)?;
        // SAFETY: any 16 bytes form a valid [u32; 4]; the read is unaligned.
        let words = unsafe { std::ptr::read_unaligned(payload.as_ptr() as *const [u32; 4]) };
        decimal_from_words(words)
    }
}

// --- IndexMap / IndexSet ---

#[cfg(feature = "indexmap")]
mod index {
    use std::hash::{BuildHasher, Hash};

    use indexmap::{IndexMap, IndexSet};

    use crate::collections::{MapCollection, MapFormatter, SequenceCollection, SequenceFormatter};
    use crate::formatter::{ErasedFormatter, Formattable};
    use crate::Result;

    impl<T, S> SequenceCollection for IndexSet<T, S>
    where
        T: Formattable + Eq + Hash,
        S: BuildHasher + Default,
    {
        type Item = T;
        type Iter<'s> = indexmap::set::Iter<'s, T>
        where
            Self: 's;
        type Builder = IndexSet<T, S>;

        fn count(&self) -> usize {
            self.len()
        }

        fn elements(&self) -> Self::Iter<'_> {
            self.iter()
        }

        fn create(count: usize) -> IndexSet<T, S> {
            IndexSet::with_capacity_and_hasher(count, S::default())
        }

        fn add(builder: &mut IndexSet<T, S>, item: T) {
            builder.insert(item);
        }

        fn complete(builder: IndexSet<T, S>) -> Result<Self> {
            Ok(builder)
        }
    }

    impl<T, S> Formattable for IndexSet<T, S>
    where
        T: Formattable + Eq + Hash,
        S: BuildHasher + Default + 'static,
    {
        fn builtin_formatter() -> Option<ErasedFormatter> {
            Some(ErasedFormatter::new::<Self, _>(SequenceFormatter::<Self>::new()))
        }
    }

    impl<K, V, S> MapCollection for IndexMap<K, V, S>
    where
        K: Formattable + Eq + Hash,
        V: Formattable,
        S: BuildHasher + Default,
    {
        type Key = K;
        type Value = V;
        type Iter<'s> = indexmap::map::Iter<'s, K, V>
        where
            Self: 's;

        fn count(&self) -> usize {
            self.len()
        }

        fn entries(&self) -> Self::Iter<'_> {
            self.iter()
        }

        fn create(count: usize) -> Self {
            IndexMap::with_capacity_and_hasher(count, S::default())
        }

        fn insert(&mut self, key: K, value: V) {
            IndexMap::insert(self, key, value);
        }
    }

    impl<K, V, S> Formattable for IndexMap<K, V, S>
    where
        K: Formattable + Eq + Hash,
        V: Formattable,
        S: BuildHasher + Default + 'static,
    {
        fn builtin_formatter() -> Option<ErasedFormatter> {
            Some(ErasedFormatter::new::<Self, _>(MapFormatter::<Self>::new()))
        }
    }
}

// --- SmolStr ---

#[cfg(feature = "smol_str")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SmolStrFormatter;

#[cfg(feature = "smol_str")]
impl Formatter<SmolStr> for SmolStrFormatter {
    fn serialize(&self, writer: &mut Writer, value: &SmolStr, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_str(value.as_str())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<SmolStr> {
        Ok(SmolStr::new(reader.read_str()?))
    }
}

#[cfg(feature = "smol_str")]
builtin!(SmolStr => SmolStrFormatter);
