use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use packwire::primitives::{ForceU32Formatter, U32Formatter};
use packwire::{
    deserialize_with, serialize, serialize_with, BuiltinResolver, CompositeResolver, ErasedFormatter, Formattable,
    Formatter, FormatterResolver, MessagePackError, Reader, RegistryResolver, SerializerOptions, StandardResolver,
    TypeKey, Writer,
};

/// A type with no builtin formatter.
#[derive(Debug, PartialEq)]
struct Opaque(String);

impl Formattable for Opaque {}

struct OpaqueFormatter;

impl Formatter<Opaque> for OpaqueFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Opaque, _: &dyn FormatterResolver) -> packwire::Result<()> {
        writer.write_str(&value.0)
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> packwire::Result<Opaque> {
        Ok(Opaque(reader.read_string()?))
    }
}

fn options_with(registry: Arc<RegistryResolver>) -> SerializerOptions {
    SerializerOptions::with_resolver(Arc::new(StandardResolver::with_registry(registry)))
}

#[test]
fn test_missing_formatter_names_type_and_chain() {
    let err = serialize(&Opaque("x".into())).unwrap_err();
    match &err {
        MessagePackError::FormatterNotFound { type_name, chain } => {
            assert!(type_name.ends_with("Opaque"), "{}", type_name);
            assert_eq!(chain, &vec!["builtin".to_string()]);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let registry = Arc::new(RegistryResolver::named("overrides"));
    let err = serialize_with(&Opaque("x".into()), &options_with(registry)).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Opaque"), "{}", message);
    assert!(message.ends_with("(resolvers: overrides -> builtin)"), "{}", message);
}

#[test]
fn test_missing_element_formatter_surfaces_from_collection() {
    let err = serialize(&vec![Opaque("a".into())]).unwrap_err();
    assert!(matches!(err, MessagePackError::FormatterNotFound { type_name, .. } if type_name.ends_with("Opaque")));
}

#[test]
fn test_registered_formatter_is_used_for_nested_values() {
    let registry = Arc::new(RegistryResolver::new());
    registry.register::<Opaque, _>(OpaqueFormatter);
    assert!(registry.contains::<Opaque>());
    assert_eq!(registry.len(), 1);

    let options = options_with(registry);
    let value = vec![Some(Opaque("a".into())), None];
    let bytes = serialize_with(&value, &options).unwrap();
    assert_eq!(&bytes[..], &[0x92, 0xa1, b'a', 0xc0]);

    let decoded: Vec<Option<Opaque>> = deserialize_with(&bytes, &options).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_registry_overrides_builtin() {
    let registry = Arc::new(RegistryResolver::new());
    registry.register::<u32, _>(ForceU32Formatter);
    let options = options_with(registry.clone());

    let bytes = serialize_with(&vec![1u32], &options).unwrap();
    assert_eq!(&bytes[..], &[0x91, 0xce, 0, 0, 0, 1]);
    assert_eq!(&serialize(&vec![1u32]).unwrap()[..], &[0x91, 0x01]);

    // A later registration replaces the earlier one.
    registry.register_arc::<u32>(Arc::new(U32Formatter));
    assert_eq!(registry.len(), 1);
    let bytes = serialize_with(&1u32, &options).unwrap();
    assert_eq!(&bytes[..], &[0x01]);
}

#[test]
fn test_composite_first_hit_wins() {
    let first = Arc::new(RegistryResolver::named("first"));
    first.register::<u32, _>(ForceU32Formatter);
    let second = Arc::new(RegistryResolver::named("second"));
    second.register::<Opaque, _>(OpaqueFormatter);
    second.register::<u32, _>(U32Formatter);

    let first: Arc<dyn FormatterResolver> = first;
    let second: Arc<dyn FormatterResolver> = second;
    let builtin: Arc<dyn FormatterResolver> = Arc::new(BuiltinResolver::new());
    let inner: Arc<dyn FormatterResolver> = Arc::new(CompositeResolver::new("inner", vec![first, second]));
    let outer = CompositeResolver::new("outer", vec![inner, builtin]);

    assert_eq!(outer.chain(), vec!["first", "second", "builtin"]);
    assert_eq!(outer.resolvers().len(), 2);

    let resolver: &dyn FormatterResolver = &outer;
    let mut writer = Writer::new();
    resolver.serialize_value(&mut writer, &7u32).unwrap();
    resolver.serialize_value(&mut writer, &Opaque("b".into())).unwrap();
    resolver.serialize_value(&mut writer, &true).unwrap();
    assert_eq!(writer.as_slice(), &[0xce, 0, 0, 0, 7, 0xa1, b'b', 0xc3]);
}

#[test]
fn test_builtin_resolver_caches_hits_and_misses() {
    let builtin = BuiltinResolver::new();
    let resolver: &dyn FormatterResolver = &builtin;

    assert!(resolver.get_formatter::<u8>().is_some());
    assert!(resolver.get_formatter::<u8>().is_some());
    assert_eq!(builtin.cached_len(), 1);

    assert!(resolver.get_formatter::<Opaque>().is_none());
    assert!(resolver.get_formatter::<Opaque>().is_none());
    assert_eq!(builtin.cached_len(), 2);

    let err = resolver.get_formatter_with_verify::<Opaque>().err().unwrap();
    assert!(matches!(err, MessagePackError::FormatterNotFound { .. }));
}

static BUILDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, PartialEq)]
struct Counted(u8);

struct CountedFormatter;

impl Formatter<Counted> for CountedFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Counted, _: &dyn FormatterResolver) -> packwire::Result<()> {
        writer.write_u8(value.0);
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, _: &dyn FormatterResolver) -> packwire::Result<Counted> {
        Ok(Counted(reader.read_u8()?))
    }
}

impl Formattable for Counted {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        Some(ErasedFormatter::new::<Counted, _>(CountedFormatter))
    }
}

#[test]
fn test_builtin_formatter_is_built_once_under_contention() {
    let builtin = Arc::new(BuiltinResolver::new());
    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0..16u8)
        .map(|i| {
            let builtin = builtin.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let resolver: &dyn FormatterResolver = builtin.as_ref();
                let mut writer = Writer::new();
                resolver.serialize_value(&mut writer, &Counted(i)).unwrap();
                let bytes = writer.into_bytes();
                let decoded: Counted = resolver.deserialize_value(&mut Reader::new(&bytes)).unwrap();
                assert_eq!(decoded, Counted(i));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    assert_eq!(builtin.cached_len(), 1);
}

#[test]
fn test_erased_formatter_downcast() {
    let erased = ErasedFormatter::new::<u32, _>(U32Formatter);
    assert_eq!(erased.type_name(), "u32");
    assert!(erased.downcast::<u32>().is_some());
    assert!(erased.downcast::<u64>().is_none());
}

#[test]
fn test_type_key() {
    let key = TypeKey::of::<Vec<u8>>();
    assert_eq!(key, TypeKey::of::<Vec<u8>>());
    assert_ne!(key, TypeKey::of::<Vec<u16>>());
    assert_eq!(key.name(), std::any::type_name::<Vec<u8>>());
    assert!(key.builtin_formatter().is_some());
    assert!(TypeKey::of::<Opaque>().builtin_formatter().is_none());
}

#[test]
fn test_shared_resolver_is_reused() {
    let a = StandardResolver::shared();
    let b = StandardResolver::shared();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.name(), "standard");
}
