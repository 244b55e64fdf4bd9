#![allow(unused_imports)]

use std::sync::Arc;

use packwire::{
    deserialize, deserialize_segments, deserialize_with, serialize, serialize_with, Formattable, MessagePackError,
};
use packwire::{RegistryResolver, SerializerOptions, StandardResolver};

fn round_trip<T: Formattable + PartialEq + std::fmt::Debug>(value: T) -> Vec<u8> {
    let bytes = serialize(&value).unwrap().to_vec();
    let decoded: T = deserialize(&bytes).unwrap();
    assert_eq!(decoded, value);
    bytes
}

#[cfg(any(feature = "chrono", feature = "uuid", feature = "rust_decimal"))]
/// Decodes `value`'s encoding from every cut into two or three segments.
fn decode_every_split<T: Formattable + PartialEq + std::fmt::Debug>(value: &T) {
    let bytes = serialize(value).unwrap();
    for a in 0..=bytes.len() {
        assert_eq!(&deserialize_segments::<T>(&[&bytes[..a], &bytes[a..]]).unwrap(), value);
        for b in a..=bytes.len() {
            let segments = [&bytes[..a], &bytes[a..b], &bytes[b..]];
            assert_eq!(&deserialize_segments::<T>(&segments).unwrap(), value, "cut at {} and {}", a, b);
        }
    }
}

#[cfg(feature = "chrono")]
mod chrono_types {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

    use super::*;

    #[test]
    fn test_utc_datetime_is_a_timestamp() {
        let bytes = round_trip(Utc.timestamp_opt(1, 0).unwrap());
        assert_eq!(bytes, vec![0xd6, 0xff, 0, 0, 0, 1]);

        let precise = Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap();
        let bytes = round_trip(precise);
        assert_eq!(&bytes[..2], &[0xd7, 0xff]);

        let ancient = Utc.timestamp_opt(-62_135_596_800, 0).unwrap();
        let bytes = round_trip(ancient);
        assert_eq!(&bytes[..3], &[0xc7, 12, 0xff]);

        round_trip(precise.naive_utc());
    }

    #[test]
    fn test_datetime_offset_keeps_offset() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let value = DateTime::from_timestamp(60, 0).unwrap().with_timezone(&offset);
        let bytes = round_trip(value);
        assert_eq!(bytes, vec![0xc7, 0x06, 0x65, 0x00, 0x00, 0x00, 0x3c, 0xfe, 0xd4]);

        let decoded: DateTime<FixedOffset> = deserialize(&bytes).unwrap();
        assert_eq!(decoded.offset(), &offset);

        let odd = FixedOffset::east_opt(30).unwrap();
        let err = serialize(&DateTime::from_timestamp(0, 0).unwrap().with_timezone(&odd)).unwrap_err();
        assert!(matches!(err, MessagePackError::Encode(_)));
    }

    #[test]
    fn test_datetime_offset_rejects_other_extensions() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let mut bytes = serialize(&DateTime::from_timestamp(60, 0).unwrap().with_timezone(&offset))
            .unwrap()
            .to_vec();
        assert_eq!(bytes[2], 101);
        bytes[2] = 0xff;
        let err = deserialize::<DateTime<FixedOffset>>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MessagePackError::ExtensionTypeMismatch {
                expected: 101,
                expected_name: "DateTimeOffset",
                actual: -1,
            }
        ));
    }

    #[test]
    fn test_time_extensions_across_segments() {
        let offset = FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap();
        for seconds in [60, 1_700_000_000, -62_135_596_800] {
            let utc = DateTime::from_timestamp(seconds, 250).unwrap();
            decode_every_split(&utc);
            decode_every_split(&utc.with_timezone(&offset));
        }
    }

    #[test]
    fn test_naive_date_counts_days() {
        let bytes = round_trip(NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
        assert_eq!(bytes, vec![0x01]);
        round_trip(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        round_trip(NaiveDate::from_ymd_opt(-44, 3, 15).unwrap());

        let err = deserialize::<NaiveDate>(&[0xd2, 0x7f, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, MessagePackError::InvalidValue(_)));
    }

    #[test]
    fn test_naive_time_layout() {
        let bytes = round_trip(NaiveTime::from_hms_milli_opt(1, 0, 0, 500).unwrap());
        assert_eq!(bytes, vec![0x92, 0xcd, 0x0e, 0x10, 0xce, 0x1d, 0xcd, 0x65, 0x00]);
        round_trip(NaiveTime::MIN);

        let err = deserialize::<NaiveTime>(&[0x92, 0xce, 0x00, 0x01, 0x51, 0x80, 0x00]).unwrap_err();
        assert!(matches!(err, MessagePackError::InvalidValue(_)));
        let err = deserialize::<NaiveTime>(&[0x91, 0x00]).unwrap_err();
        assert!(matches!(err, MessagePackError::CountMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_timestamp_ext_is_required() {
        let err = deserialize::<DateTime<Utc>>(&[0xd6, 0x05, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, MessagePackError::ExtensionTypeMismatch { expected: -1, actual: 5, .. }));
    }
}

#[cfg(feature = "uuid")]
mod guid {
    use packwire::UnsafeGuidFormatter;
    use uuid::Uuid;

    use super::*;

    fn sample() -> Uuid {
        Uuid::from_fields(0x0102_0304, 0x0506, 0x0708, &[9, 10, 11, 12, 13, 14, 15, 16])
    }

    #[test]
    fn test_guid_payload_layout() {
        let bytes = round_trip(sample());
        assert_eq!(
            bytes,
            vec![0xd8, 102, 4, 3, 2, 1, 6, 5, 8, 7, 9, 10, 11, 12, 13, 14, 15, 16]
        );
        round_trip(Uuid::new_v4());
        round_trip(Uuid::nil());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_unsafe_guid_matches_portable_bytes() {
        let registry = Arc::new(RegistryResolver::new());
        registry.register::<Uuid, _>(UnsafeGuidFormatter);
        let options = SerializerOptions::with_resolver(Arc::new(StandardResolver::with_registry(registry)));

        for value in [sample(), Uuid::new_v4()] {
            let fast = serialize_with(&value, &options).unwrap();
            assert_eq!(fast, serialize(&value).unwrap());
            assert_eq!(deserialize_with::<Uuid>(&fast, &options).unwrap(), value);
        }
    }

    #[test]
    fn test_guid_rejects_other_extensions() {
        let mut bytes = serialize(&sample()).unwrap().to_vec();
        bytes[1] = 103;
        let err = deserialize::<Uuid>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MessagePackError::ExtensionTypeMismatch {
                expected: 102,
                actual: 103,
                ..
            }
        ));

        let err = deserialize::<Uuid>(&[0xd7, 102, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, MessagePackError::InvalidValue(_)));
    }

    #[test]
    fn test_guid_across_segments() {
        decode_every_split(&sample());
        decode_every_split(&Uuid::new_v4());
    }
}

#[cfg(feature = "rust_decimal")]
mod decimal {
    use packwire::UnsafeDecimalFormatter;
    use rust_decimal::Decimal;

    use super::*;

    fn samples() -> Vec<Decimal> {
        vec![
            Decimal::new(12345, 2),
            Decimal::new(-1, 28),
            Decimal::ZERO,
            Decimal::MAX,
            Decimal::MIN,
        ]
    }

    #[test]
    fn test_decimal_payload_matches_native_layout() {
        for value in samples() {
            let bytes = round_trip(value);
            assert_eq!(&bytes[..2], &[0xd8, 103]);
            assert_eq!(&bytes[2..], &value.serialize());
        }
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_unsafe_decimal_matches_portable_bytes() {
        let registry = Arc::new(RegistryResolver::new());
        registry.register::<Decimal, _>(UnsafeDecimalFormatter);
        let options = SerializerOptions::with_resolver(Arc::new(StandardResolver::with_registry(registry)));

        for value in samples() {
            let fast = serialize_with(&value, &options).unwrap();
            assert_eq!(fast, serialize(&value).unwrap());
            assert_eq!(deserialize_with::<Decimal>(&fast, &options).unwrap(), value);
        }
    }

    #[test]
    fn test_decimal_rejects_other_extensions() {
        let mut bytes = serialize(&Decimal::new(12345, 2)).unwrap().to_vec();
        bytes[1] = 102;
        let err = deserialize::<Decimal>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MessagePackError::ExtensionTypeMismatch {
                expected: 103,
                expected_name: "Decimal",
                actual: 102,
            }
        ));
    }

    #[test]
    fn test_decimal_across_segments() {
        for value in samples() {
            decode_every_split(&value);
        }
    }

    #[test]
    fn test_decimal_rejects_bad_flags() {
        let mut bytes = vec![0xd8, 103];
        bytes.extend_from_slice(&[0, 0, 29, 0]);
        bytes.extend_from_slice(&[1; 12]);
        let err = deserialize::<Decimal>(&bytes).unwrap_err();
        assert!(matches!(err, MessagePackError::InvalidValue(_)));

        bytes[2] = 1;
        bytes[4] = 0;
        let err = deserialize::<Decimal>(&bytes).unwrap_err();
        assert!(matches!(err, MessagePackError::InvalidValue(_)));
    }
}

#[cfg(feature = "indexmap")]
mod index {
    use indexmap::{IndexMap, IndexSet};

    use super::*;

    #[test]
    fn test_index_collections_keep_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), 1u8);
        map.insert("a".to_string(), 2u8);
        let bytes = round_trip(map);
        assert_eq!(bytes, vec![0x82, 0xa1, b'b', 0x01, 0xa1, b'a', 0x02]);

        let set: IndexSet<u16> = [300, 1, 2].into_iter().collect();
        let bytes = round_trip(set);
        assert_eq!(bytes, vec![0x93, 0xcd, 0x01, 0x2c, 0x01, 0x02]);
    }
}

#[cfg(feature = "smol_str")]
mod smol {
    use smol_str::SmolStr;

    use super::*;

    #[test]
    fn test_smol_str_is_a_str() {
        let bytes = round_trip(SmolStr::new("hi"));
        assert_eq!(bytes, vec![0xa2, b'h', b'i']);
        round_trip(SmolStr::new("a string long enough to spill onto the heap"));
    }
}
