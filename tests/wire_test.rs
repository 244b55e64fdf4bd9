use packwire::{deserialize, serialize, Formattable, Stack, Writer};

fn encode<T: Formattable>(value: &T) -> Vec<u8> {
    serialize(value).unwrap().to_vec()
}

fn round_trip<T: Formattable + PartialEq + std::fmt::Debug>(value: T) {
    let bytes = encode(&value);
    let decoded: T = deserialize(&bytes).unwrap();
    assert_eq!(value, decoded);
}

#[test]
fn test_integer_300_is_uint16() {
    let bytes = encode(&300i32);
    assert_eq!(bytes, vec![0xcd, 0x01, 0x2c]);
    assert_eq!(deserialize::<i32>(&bytes).unwrap(), 300);
}

#[test]
fn test_true() {
    let bytes = encode(&true);
    assert_eq!(bytes, vec![0xc3]);
    assert!(deserialize::<bool>(&bytes).unwrap());
}

#[test]
fn test_short_string() {
    let bytes = encode(&"hi".to_string());
    assert_eq!(bytes, vec![0xa2, 0x68, 0x69]);
    assert_eq!(deserialize::<String>(&bytes).unwrap(), "hi");
}

#[test]
fn test_small_array() {
    let bytes = encode(&vec![1i32, 2, 3]);
    assert_eq!(bytes, vec![0x93, 0x01, 0x02, 0x03]);
    assert_eq!(deserialize::<Vec<i32>>(&bytes).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_none_is_nil() {
    let bytes = encode(&None::<i32>);
    assert_eq!(bytes, vec![0xc0]);
    assert_eq!(deserialize::<Option<i32>>(&bytes).unwrap(), None);
    assert_eq!(deserialize::<Option<i32>>(&encode(&Some(7i32))).unwrap(), Some(7));
}

#[test]
fn test_stack_keeps_pop_order() {
    let mut stack = Stack::new();
    stack.push(1i32);
    stack.push(2);
    stack.push(3);

    let bytes = encode(&stack);
    // Top of the stack is written first.
    assert_eq!(bytes, vec![0x93, 0x03, 0x02, 0x01]);

    let mut decoded: Stack<i32> = deserialize(&bytes).unwrap();
    assert_eq!(decoded.pop(), Some(3));
    assert_eq!(decoded.pop(), Some(2));
    assert_eq!(decoded.pop(), Some(1));
    assert_eq!(decoded.pop(), None);
}

#[test]
fn test_unsigned_boundaries() {
    let cases: &[(u64, &[u8])] = &[
        (0, &[0x00]),
        (127, &[0x7f]),
        (128, &[0xcc, 0x80]),
        (255, &[0xcc, 0xff]),
        (256, &[0xcd, 0x01, 0x00]),
        (65535, &[0xcd, 0xff, 0xff]),
        (65536, &[0xce, 0x00, 0x01, 0x00, 0x00]),
        (u32::MAX as u64, &[0xce, 0xff, 0xff, 0xff, 0xff]),
        (u32::MAX as u64 + 1, &[0xcf, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]),
    ];
    for (value, expected) in cases {
        assert_eq!(encode(value), expected.to_vec(), "encoding {}", value);
        assert_eq!(deserialize::<u64>(expected).unwrap(), *value);
    }
}

#[test]
fn test_signed_boundaries() {
    let cases: &[(i64, &[u8])] = &[
        (-1, &[0xff]),
        (-32, &[0xe0]),
        (-33, &[0xd0, 0xdf]),
        (-128, &[0xd0, 0x80]),
        (-129, &[0xd1, 0xff, 0x7f]),
        (-32768, &[0xd1, 0x80, 0x00]),
        (-32769, &[0xd2, 0xff, 0xff, 0x7f, 0xff]),
        (i32::MIN as i64 - 1, &[0xd3, 0xff, 0xff, 0xff, 0xff, 0x7f, 0xff, 0xff, 0xff]),
        // Non-negative signed values take the unsigned forms.
        (127, &[0x7f]),
        (200, &[0xcc, 0xc8]),
        (65536, &[0xce, 0x00, 0x01, 0x00, 0x00]),
    ];
    for (value, expected) in cases {
        assert_eq!(encode(value), expected.to_vec(), "encoding {}", value);
        assert_eq!(deserialize::<i64>(expected).unwrap(), *value);
    }
}

#[test]
fn test_integer_round_trips_at_width_boundaries() {
    for v in [0u8, 127, 128, 255] {
        round_trip(v);
    }
    for v in [0u16, 127, 128, 255, 256, 65535] {
        round_trip(v);
    }
    for v in [0u32, 65535, 65536, u32::MAX] {
        round_trip(v);
    }
    for v in [i8::MIN, -33, -32, -1, 0, i8::MAX] {
        round_trip(v);
    }
    for v in [i16::MIN, -129, -128, 255, 256, i16::MAX] {
        round_trip(v);
    }
    for v in [i32::MIN, -32769, -32768, 65535, 65536, i32::MAX] {
        round_trip(v);
    }
    for v in [i64::MIN, i64::from(i32::MIN) - 1, u32::MAX as i64 + 1, i64::MAX] {
        round_trip(v);
    }
    round_trip(u64::MAX);
    round_trip(usize::MAX);
    round_trip(isize::MIN);
}

#[test]
fn test_string_length_boundaries() {
    let cases: &[(usize, &[u8])] = &[
        (0, &[0xa0]),
        (31, &[0xbf]),
        (32, &[0xd9, 0x20]),
        (255, &[0xd9, 0xff]),
        (256, &[0xda, 0x01, 0x00]),
        (65535, &[0xda, 0xff, 0xff]),
        (65536, &[0xdb, 0x00, 0x01, 0x00, 0x00]),
    ];
    for (len, header) in cases {
        let value = "x".repeat(*len);
        let bytes = encode(&value);
        assert_eq!(&bytes[..header.len()], *header, "header for length {}", len);
        assert_eq!(bytes.len(), header.len() + len);
        assert_eq!(deserialize::<String>(&bytes).unwrap(), value);
    }
}

#[test]
fn test_multibyte_string_uses_byte_length() {
    let value = "日本語".to_string();
    let bytes = encode(&value);
    assert_eq!(bytes[0], 0xa0 | 9);
    round_trip(value);
}

#[test]
fn test_collection_header_boundaries() {
    let mut writer = Writer::new();
    writer.write_array_header(15).unwrap();
    writer.write_array_header(16).unwrap();
    writer.write_array_header(65536).unwrap();
    writer.write_map_header(15).unwrap();
    writer.write_map_header(16).unwrap();
    writer.write_map_header(65536).unwrap();
    assert_eq!(
        writer.as_slice(),
        &[
            0x9f, //
            0xdc, 0x00, 0x10, //
            0xdd, 0x00, 0x01, 0x00, 0x00, //
            0x8f, //
            0xde, 0x00, 0x10, //
            0xdf, 0x00, 0x01, 0x00, 0x00,
        ]
    );
}

#[test]
fn test_bin_headers() {
    let mut writer = Writer::new();
    writer.write_bin(&[]).unwrap();
    writer.write_bin(&[0xab; 255]).unwrap();
    writer.write_bin_header(256).unwrap();
    writer.write_bin_header(65536).unwrap();
    let bytes = writer.as_slice();
    assert_eq!(&bytes[..2], &[0xc4, 0x00]);
    assert_eq!(&bytes[2..4], &[0xc4, 0xff]);
    assert_eq!(&bytes[4 + 255..], &[0xc5, 0x01, 0x00, 0xc6, 0x00, 0x01, 0x00, 0x00]);
}

#[test]
fn test_ext_headers_prefer_fixext() {
    let mut writer = Writer::new();
    for (len, code) in [(1usize, 0xd4u8), (2, 0xd5), (4, 0xd6), (8, 0xd7), (16, 0xd8)] {
        writer.clear();
        writer.write_ext_header(5, len).unwrap();
        assert_eq!(writer.as_slice(), &[code, 5]);
    }

    writer.clear();
    writer.write_ext_header(5, 3).unwrap();
    assert_eq!(writer.as_slice(), &[0xc7, 3, 5]);

    writer.clear();
    writer.write_ext_header(-7, 256).unwrap();
    assert_eq!(writer.as_slice(), &[0xc8, 0x01, 0x00, 0xf9]);

    writer.clear();
    writer.write_ext_header(1, 65536).unwrap();
    assert_eq!(writer.as_slice(), &[0xc9, 0x00, 0x01, 0x00, 0x00, 1]);
}

#[test]
fn test_floats_keep_their_width() {
    assert_eq!(encode(&1.5f32), vec![0xca, 0x3f, 0xc0, 0x00, 0x00]);
    assert_eq!(encode(&1.5f64), vec![0xcb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]);
    round_trip(f32::MIN_POSITIVE);
    round_trip(-0.0f64);
    round_trip(f64::INFINITY);
    assert!(deserialize::<f64>(&encode(&f64::NAN)).unwrap().is_nan());
}

#[test]
fn test_integers_widen_to_floats() {
    assert_eq!(deserialize::<f64>(&[0x05]).unwrap(), 5.0);
    assert_eq!(deserialize::<f32>(&[0xd0, 0x80]).unwrap(), -128.0);
    assert_eq!(deserialize::<f64>(&encode(&2.25f32)).unwrap(), 2.25);
}

#[test]
fn test_narrowing_overflow_is_an_error() {
    let bytes = encode(&300u32);
    let err = deserialize::<u8>(&bytes).unwrap_err();
    assert!(matches!(err, packwire::MessagePackError::Overflow { value: 300, target: "u8" }));

    let err = deserialize::<u32>(&encode(&-1i32)).unwrap_err();
    assert!(matches!(err, packwire::MessagePackError::Overflow { value: -1, .. }));

    assert_eq!(deserialize::<i8>(&encode(&127u64)).unwrap(), 127);
}

#[test]
fn test_compact_encoding_sizes() {
    assert_eq!(encode(&10i32).len(), 1);
    assert_eq!(encode(&10u64).len(), 1);
    assert_eq!(encode(&-10i64).len(), 1);
    assert_eq!(encode(&1000i64).len(), 3);
    assert_eq!(encode(&String::new()).len(), 1);
    assert_eq!(encode(&Vec::<u8>::new()).len(), 1);
}

#[test]
fn test_forced_widths() {
    let mut writer = Writer::new();
    writer.write_u8_forced(1);
    writer.write_u16_forced(1);
    writer.write_u32_forced(1);
    writer.write_u64_forced(1);
    writer.write_i8_forced(-1);
    writer.write_i16_forced(-1);
    writer.write_i32_forced(-1);
    writer.write_i64_forced(-1);
    assert_eq!(writer.position(), 2 + 3 + 5 + 9 + 2 + 3 + 5 + 9);

    let bytes = writer.into_bytes();
    let mut reader = packwire::Reader::new(&bytes);
    assert_eq!(reader.read_u8().unwrap(), 1);
    assert_eq!(reader.read_u16().unwrap(), 1);
    assert_eq!(reader.read_u32().unwrap(), 1);
    assert_eq!(reader.read_u64().unwrap(), 1);
    assert_eq!(reader.read_i8().unwrap(), -1);
    assert_eq!(reader.read_i16().unwrap(), -1);
    assert_eq!(reader.read_i32().unwrap(), -1);
    assert_eq!(reader.read_i64().unwrap(), -1);
    assert!(reader.is_end());
}

#[test]
fn test_forced_headers() {
    let mut writer = Writer::new();
    writer.write_array_header_forced32(1);
    writer.write_map_header_forced32(0);
    writer.write_str_forced32("a").unwrap();
    assert_eq!(
        writer.as_slice(),
        &[0xdd, 0, 0, 0, 1, 0xdf, 0, 0, 0, 0, 0xdb, 0, 0, 0, 1, b'a']
    );

    let mut reader = packwire::Reader::new(writer.as_slice());
    assert_eq!(reader.read_array_header().unwrap(), 1);
    assert_eq!(reader.read_map_header().unwrap(), 0);
    assert_eq!(reader.read_str().unwrap(), "a");
}

#[test]
fn test_unchecked_writes() {
    let mut writer = Writer::with_capacity(4);
    writer.write_fixarray_header_unchecked(2);
    writer.write_positive_fixint_unchecked(0x7f);
    writer.write_fixmap_header_unchecked(0);
    writer.ensure_capacity(3);
    // SAFETY: capacity for three bytes was reserved above.
    unsafe { writer.write_raw_unchecked(&[0xc0, 0xc2, 0xc3]) };
    assert_eq!(writer.as_slice(), &[0x92, 0x7f, 0x80, 0xc0, 0xc2, 0xc3]);
}

#[test]
fn test_writer_grows_past_initial_capacity() {
    let mut writer = Writer::with_capacity(1);
    for i in 0..1000u32 {
        writer.write_u32(i);
    }
    let bytes = writer.into_bytes();
    let mut reader = packwire::Reader::new(&bytes);
    for i in 0..1000u32 {
        assert_eq!(reader.read_u32().unwrap(), i);
    }
}
