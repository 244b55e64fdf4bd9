use std::collections::BTreeMap;

use packwire::{
    deserialize, deserialize_from, serialize, MessagePackError, MessagePackObject, Reader, SerializerOptions, Value,
    Writer,
};

#[derive(MessagePackObject, Debug, PartialEq)]
struct SimpleStruct {
    id: u32,
    name: String,
    active: bool,
}

#[derive(MessagePackObject, Debug, PartialEq)]
struct TupleStruct(u32, String, bool);

#[derive(MessagePackObject, Debug, PartialEq)]
struct UnitStruct;

#[derive(MessagePackObject, Debug, PartialEq)]
#[msgpack(map)]
struct User {
    #[msgpack(rename = "user_id")]
    id: u64,
    name: String,
    email: Option<String>,
    #[msgpack(default)]
    tags: Vec<String>,
    #[msgpack(skip)]
    session: Option<String>,
}

#[derive(MessagePackObject, Debug, PartialEq)]
struct WithSkip {
    a: u8,
    #[msgpack(skip)]
    cache: Vec<u8>,
    b: u8,
}

#[derive(MessagePackObject, Debug, PartialEq, Clone, Copy)]
enum Color {
    Red,
    Green,
    Blue,
}

#[derive(MessagePackObject, Debug, PartialEq)]
#[msgpack(as_string)]
enum Level {
    Low,
    #[msgpack(rename = "mid")]
    Medium,
    High,
}

#[derive(MessagePackObject, Debug, PartialEq)]
enum Shape {
    Empty,
    Circle(f64),
    Rect { width: u32, height: u32 },
}

#[derive(MessagePackObject, Debug, PartialEq)]
struct Wrapper<T> {
    inner: T,
    items: Vec<T>,
}

#[derive(MessagePackObject, Debug, PartialEq)]
struct Nested {
    color: Color,
    shape: Shape,
    lookup: BTreeMap<String, Level>,
    maybe: Option<Box<Nested>>,
}

/// Decodes `bytes` as a dynamic value for layout assertions.
fn layout(bytes: &[u8]) -> Value {
    deserialize::<Value>(bytes).unwrap()
}

#[test]
fn test_named_struct_is_an_array() {
    let value = SimpleStruct {
        id: 42,
        name: "hello".to_string(),
        active: true,
    };
    let bytes = serialize(&value).unwrap();
    assert_eq!(&bytes[..], &[0x93, 42, 0xa5, b'h', b'e', b'l', b'l', b'o', 0xc3]);
    assert_eq!(deserialize::<SimpleStruct>(&bytes).unwrap(), value);
}

#[test]
fn test_tuple_and_unit_structs() {
    let value = TupleStruct(123, "world".to_string(), false);
    let bytes = serialize(&value).unwrap();
    assert_eq!(bytes[0], 0x93);
    assert_eq!(deserialize::<TupleStruct>(&bytes).unwrap(), value);

    let bytes = serialize(&UnitStruct).unwrap();
    assert_eq!(&bytes[..], &[0xc0]);
    assert_eq!(deserialize::<UnitStruct>(&bytes).unwrap(), UnitStruct);
}

#[test]
fn test_array_layout_tolerates_extra_elements() {
    let mut writer = Writer::new();
    writer.write_array_header(5).unwrap();
    writer.write_u32(1);
    writer.write_str("a").unwrap();
    writer.write_bool(false);
    writer.write_str("ignored").unwrap();
    writer.write_array_header(2).unwrap();
    writer.write_nil();
    writer.write_nil();
    writer.write_u8(9);

    let mut reader = packwire::Reader::new(writer.as_slice());
    let resolver = packwire::StandardResolver::shared();
    let value: SimpleStruct = resolver.deserialize_value(&mut reader).unwrap();
    assert_eq!(
        value,
        SimpleStruct {
            id: 1,
            name: "a".to_string(),
            active: false
        }
    );
    assert_eq!(reader.read_u8().unwrap(), 9);
}

#[test]
fn test_array_layout_reports_missing_field() {
    let mut writer = Writer::new();
    writer.write_array_header(1).unwrap();
    writer.write_u32(1);
    let err = deserialize::<SimpleStruct>(writer.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        MessagePackError::MissingField {
            field: "name",
            type_name: "SimpleStruct"
        }
    ));
}

#[test]
fn test_map_layout() {
    let value = User {
        id: 7,
        name: "ann".to_string(),
        email: None,
        tags: vec!["admin".to_string()],
        session: Some("secret".to_string()),
    };
    let bytes = serialize(&value).unwrap();

    let map = layout(&bytes);
    let entries = map.as_map().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(map.get("user_id"), Some(&Value::UInt(7)));
    assert_eq!(map.get("name").and_then(Value::as_str), Some("ann"));
    assert_eq!(map.get("email"), Some(&Value::Nil));
    assert!(map.get("session").is_none());

    let decoded: User = deserialize(&bytes).unwrap();
    assert_eq!(decoded.session, None);
    assert_eq!(
        decoded,
        User {
            session: None,
            ..value
        }
    );
}

#[test]
fn test_map_layout_fills_optional_and_default_fields() {
    let mut writer = Writer::new();
    writer.write_map_header(3).unwrap();
    writer.write_str("name").unwrap();
    writer.write_str("bob").unwrap();
    writer.write_str("unknown").unwrap();
    writer.write_array_header(1).unwrap();
    writer.write_u8(1);
    writer.write_str("user_id").unwrap();
    writer.write_u8(3);

    let decoded: User = deserialize(writer.as_slice()).unwrap();
    assert_eq!(
        decoded,
        User {
            id: 3,
            name: "bob".to_string(),
            email: None,
            tags: Vec::new(),
            session: None,
        }
    );

    let mut writer = Writer::new();
    writer.write_map_header(1).unwrap();
    writer.write_str("name").unwrap();
    writer.write_str("bob").unwrap();
    let err = deserialize::<User>(writer.as_slice()).unwrap_err();
    assert!(matches!(err, MessagePackError::MissingField { field: "user_id", .. }));
}

#[test]
fn test_skipped_fields_take_no_slot() {
    let value = WithSkip {
        a: 1,
        cache: vec![1, 2, 3],
        b: 2,
    };
    let bytes = serialize(&value).unwrap();
    assert_eq!(&bytes[..], &[0x92, 0x01, 0x02]);
    assert_eq!(
        deserialize::<WithSkip>(&bytes).unwrap(),
        WithSkip {
            a: 1,
            cache: Vec::new(),
            b: 2
        }
    );
}

#[test]
fn test_unit_enum_as_index() {
    assert_eq!(&serialize(&Color::Red).unwrap()[..], &[0x00]);
    assert_eq!(&serialize(&Color::Blue).unwrap()[..], &[0x02]);
    for color in [Color::Red, Color::Green, Color::Blue] {
        let bytes = serialize(&color).unwrap();
        assert_eq!(deserialize::<Color>(&bytes).unwrap(), color);
    }

    let err = deserialize::<Color>(&[0x03]).unwrap_err();
    assert!(matches!(err, MessagePackError::InvalidValue(_)));
}

#[test]
fn test_unit_enum_as_string() {
    assert_eq!(&serialize(&Level::Low).unwrap()[..], &[0xa3, b'L', b'o', b'w']);
    assert_eq!(&serialize(&Level::Medium).unwrap()[..], &[0xa3, b'm', b'i', b'd']);
    assert_eq!(deserialize::<Level>(&serialize(&Level::High).unwrap()).unwrap(), Level::High);
    assert_eq!(deserialize::<Level>(&[0xa3, b'm', b'i', b'd']).unwrap(), Level::Medium);

    let err = deserialize::<Level>(&[0xa6, b'M', b'e', b'd', b'i', b'u', b'm']).unwrap_err();
    assert!(matches!(err, MessagePackError::InvalidValue(_)));
}

#[test]
fn test_data_enum_layout() {
    assert_eq!(&serialize(&Shape::Empty).unwrap()[..], &[0x92, 0x00, 0xc0]);
    assert_eq!(
        &serialize(&Shape::Rect { width: 2, height: 3 }).unwrap()[..],
        &[0x92, 0x02, 0x92, 0x02, 0x03]
    );

    for shape in [Shape::Empty, Shape::Circle(1.5), Shape::Rect { width: 640, height: 480 }] {
        let bytes = serialize(&shape).unwrap();
        assert_eq!(deserialize::<Shape>(&bytes).unwrap(), shape);
    }
}

#[test]
fn test_data_enum_rejects_malformed_input() {
    // Variant payload with the wrong number of fields.
    let err = deserialize::<Shape>(&[0x92, 0x02, 0x91, 0x02]).unwrap_err();
    assert!(matches!(
        err,
        MessagePackError::CountMismatch {
            type_name: "Shape::Rect",
            expected: 2,
            actual: 1
        }
    ));

    // Envelope that is not a pair.
    let err = deserialize::<Shape>(&[0x93, 0x00, 0xc0, 0xc0]).unwrap_err();
    assert!(matches!(err, MessagePackError::CountMismatch { expected: 2, actual: 3, .. }));

    let err = deserialize::<Shape>(&[0x92, 0x09, 0xc0]).unwrap_err();
    assert!(matches!(err, MessagePackError::InvalidValue(_)));
}

#[test]
fn test_failed_derived_decode_leaves_depth_unchanged() {
    let options = SerializerOptions::default();

    let mut reader = Reader::new(&[0x92, 0x02, 0x92, 0x02, 0xa1, b'x']);
    assert!(deserialize_from::<Shape>(&mut reader, &options).is_err());
    assert_eq!(reader.depth(), 0);

    let mut reader = Reader::new(&[0x93, 0x01, 0x02, 0xc0]);
    assert!(deserialize_from::<SimpleStruct>(&mut reader, &options).is_err());
    assert_eq!(reader.depth(), 0);

    let mut reader = Reader::new(&[0x81, 0xa7, b'u', b's', b'e', b'r', b'_', b'i', b'd', 0xc3]);
    assert!(deserialize_from::<User>(&mut reader, &options).is_err());
    assert_eq!(reader.depth(), 0);
}

#[test]
fn test_generic_struct() {
    let value = Wrapper {
        inner: 5u16,
        items: vec![1, 2, 3],
    };
    let bytes = serialize(&value).unwrap();
    assert_eq!(deserialize::<Wrapper<u16>>(&bytes).unwrap(), value);

    let value = Wrapper {
        inner: "a".to_string(),
        items: vec![],
    };
    let bytes = serialize(&value).unwrap();
    assert_eq!(deserialize::<Wrapper<String>>(&bytes).unwrap(), value);
}

#[test]
fn test_nested_derived_types() {
    let mut lookup = BTreeMap::new();
    lookup.insert("a".to_string(), Level::Low);
    lookup.insert("b".to_string(), Level::High);
    let value = Nested {
        color: Color::Green,
        shape: Shape::Circle(2.0),
        lookup,
        maybe: Some(Box::new(Nested {
            color: Color::Red,
            shape: Shape::Empty,
            lookup: BTreeMap::new(),
            maybe: None,
        })),
    };
    let bytes = serialize(&value).unwrap();
    assert_eq!(deserialize::<Nested>(&bytes).unwrap(), value);
}
