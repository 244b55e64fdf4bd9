//! Formatters for std wrappers and value types.
//!
//! - `Option<T>`: nil for `None`, otherwise the inner value
//! - `Box<T>`, `Arc<T>`: transparent
//! - `Duration`: `[secs, nanos]`
//! - `SystemTime`, [`Timestamp`]: the timestamp extension
//! - IP addresses: bin of 4 or 16 bytes; socket addresses: `[ip, port]`
//!
//! All of them are builtin, so the default resolver finds them without registration:
//!
//! ```
//! use std::net::{Ipv4Addr, SocketAddr};
//! use std::time::Duration;
//!
//! use packwire::{deserialize, serialize};
//!
//! let bytes = serialize(&Duration::new(5, 500)).unwrap();
//! assert_eq!(&bytes[..], &[0x92, 0x05, 0xcd, 0x01, 0xf4]);
//!
//! let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 80));
//! let bytes = serialize(&addr).unwrap();
//! assert_eq!(deserialize::<SocketAddr>(&bytes).unwrap(), addr);
//!
//! assert_eq!(&serialize(&None::<u8>).unwrap()[..], &[0xc0]);
//! ```

use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::formatter::{builtin, ErasedFormatter, Formattable, Formatter};
use crate::primitives::read_fixed_bin;
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::timestamp::Timestamp;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

fn expect_array_len(reader: &mut Reader<'_>, expected: usize, type_name: &'static str) -> Result<()> {
    let actual = reader.read_array_header()? as usize;
    if actual != expected {
        return Err(MessagePackError::CountMismatch {
            type_name,
            expected,
            actual,
        });
    }
    Ok(())
}

// --- Option ---

/// `None` is nil; `Some(v)` is `v` with no wrapper.
///
/// `Option<Option<T>>` therefore cannot tell `Some(None)` from `None`: both read back
/// as `None`.
pub struct OptionFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for OptionFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Formattable> Formatter<Option<T>> for OptionFormatter<T> {
    fn serialize(&self, writer: &mut Writer, value: &Option<T>, resolver: &dyn FormatterResolver) -> Result<()> {
        match value {
            None => {
                writer.write_nil();
                Ok(())
            }
            Some(inner) => resolver.serialize_value(writer, inner),
        }
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<Option<T>> {
        if reader.try_read_nil()? {
            return Ok(None);
        }
        resolver.deserialize_value::<T>(reader).map(Some)
    }
}

impl<T: Formattable> Formattable for Option<T> {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Option<T>, _>(OptionFormatter::<T>::default()))
    }
}

// --- Box / Arc ---

/// Writes the boxed value as if it were unboxed.
pub struct BoxFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for BoxFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Formattable> Formatter<Box<T>> for BoxFormatter<T> {
    fn serialize(&self, writer: &mut Writer, value: &Box<T>, resolver: &dyn FormatterResolver) -> Result<()> {
        resolver.serialize_value::<T>(writer, value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<Box<T>> {
        resolver.deserialize_value::<T>(reader).map(Box::new)
    }
}

impl<T: Formattable> Formattable for Box<T> {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Box<T>, _>(BoxFormatter::<T>::default()))
    }
}

/// Like [`BoxFormatter`]. Sharing is not preserved: two `Arc`s to one value are
/// written twice and read back as two allocations.
pub struct ArcFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for ArcFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Formattable> Formatter<Arc<T>> for ArcFormatter<T> {
    fn serialize(&self, writer: &mut Writer, value: &Arc<T>, resolver: &dyn FormatterResolver) -> Result<()> {
        resolver.serialize_value::<T>(writer, value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<Arc<T>> {
        resolver.deserialize_value::<T>(reader).map(Arc::new)
    }
}

impl<T: Formattable> Formattable for Arc<T> {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Arc<T>, _>(ArcFormatter::<T>::default()))
    }
}

// --- Time ---

/// `[secs, nanos]`, both as the shortest unsigned integer. Nanoseconds of a billion or
/// more are rejected on read.
#[derive(Debug, Default, Clone, Copy)]
pub struct DurationFormatter;

impl Formatter<Duration> for DurationFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Duration, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_fixarray_header_unchecked(2);
        writer.write_u64(value.as_secs());
        writer.write_u32(value.subsec_nanos());
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Duration> {
        expect_array_len(reader, 2, "Duration")?;
        let secs = reader.read_u64()?;
        let nanos = reader.read_u32()?;
        if nanos >= 1_000_000_000 {
            return Err(MessagePackError::InvalidValue(format!(
                "duration nanoseconds out of range: {}",
                nanos
            )));
        }
        Ok(Duration::new(secs, nanos))
    }
}

builtin!(Duration => DurationFormatter);

/// The timestamp extension (type code `-1`) in its 32, 64 or 96-bit form.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampFormatter;

impl Formatter<Timestamp> for TimestampFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Timestamp, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_timestamp(*value)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Timestamp> {
        reader.read_timestamp()
    }
}

builtin!(Timestamp => TimestampFormatter);

/// Times before the epoch use the 96-bit timestamp form.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeFormatter;

impl Formatter<SystemTime> for SystemTimeFormatter {
    fn serialize(&self, writer: &mut Writer, value: &SystemTime, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_timestamp(Timestamp::from(*value))
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<SystemTime> {
        Ok(SystemTime::from(reader.read_timestamp()?))
    }
}

builtin!(SystemTime => SystemTimeFormatter);

// --- Network addresses ---

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv4AddrFormatter;

impl Formatter<Ipv4Addr> for Ipv4AddrFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Ipv4Addr, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_bin(&value.octets())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Ipv4Addr> {
        Ok(Ipv4Addr::from(read_fixed_bin::<4>(reader, "Ipv4Addr")?))
    }
}

builtin!(Ipv4Addr => Ipv4AddrFormatter);

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv6AddrFormatter;

impl Formatter<Ipv6Addr> for Ipv6AddrFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Ipv6Addr, _: &dyn FormatterResolver) -> Result<()> {
        writer.write_bin(&value.octets())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<Ipv6Addr> {
        Ok(Ipv6Addr::from(read_fixed_bin::<16>(reader, "Ipv6Addr")?))
    }
}

builtin!(Ipv6Addr => Ipv6AddrFormatter);

/// The address family follows from the bin length.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpAddrFormatter;

impl Formatter<IpAddr> for IpAddrFormatter {
    fn serialize(&self, writer: &mut Writer, value: &IpAddr, _: &dyn FormatterResolver) -> Result<()> {
        match value {
            IpAddr::V4(v4) => writer.write_bin(&v4.octets()),
            IpAddr::V6(v6) => writer.write_bin(&v6.octets()),
        }
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> Result<IpAddr> {
        let octets = reader.read_bin()?;
        match octets.len() {
            4 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&octets);
                Ok(IpAddr::V4(Ipv4Addr::from(raw)))
            }
            16 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&octets);
                Ok(IpAddr::V6(Ipv6Addr::from(raw)))
            }
            other => Err(MessagePackError::InvalidValue(format!(
                "IpAddr expects 4 or 16 bytes of binary, got {}",
                other
            ))),
        }
    }
}

builtin!(IpAddr => IpAddrFormatter);

/// `[ip, port]` with the ip as in [`IpAddrFormatter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketAddrFormatter;

impl Formatter<SocketAddr> for SocketAddrFormatter {
    fn serialize(&self, writer: &mut Writer, value: &SocketAddr, resolver: &dyn FormatterResolver) -> Result<()> {
        writer.write_fixarray_header_unchecked(2);
        IpAddrFormatter.serialize(writer, &value.ip(), resolver)?;
        writer.write_u16(value.port());
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<SocketAddr> {
        expect_array_len(reader, 2, "SocketAddr")?;
        let ip = IpAddrFormatter.deserialize(reader, resolver)?;
        let port = reader.read_u16()?;
        Ok(SocketAddr::new(ip, port))
    }
}

builtin!(SocketAddr => SocketAddrFormatter);
