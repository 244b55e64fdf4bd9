//! Values whose concrete type travels with the payload.
//!
//! A [`Typeless`] is written as extension `100`. The payload is the registered type name
//! as a MessagePack str, followed by the value encoded by that type's formatter. On read
//! the name is looked up through a [`TypeNameResolver`] to find the type again.
//!
//! Payloads that are not extension `100` decode to a boxed [`Value`], so any
//! well-formed input can be read as `Typeless`.
//!
//! The per-type serialize/deserialize delegates are built on first use and cached. The
//! build runs at most once per type even under concurrent first use.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::code::{ext, MessagePackType};
use crate::formatter::{ErasedFormatter, Formattable, Formatter};
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::value::Value;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

type AnyValue = dyn Any + Send + Sync;

/// A value of any registered type.
pub struct Typeless(Box<AnyValue>);

impl Typeless {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn from_box(value: Box<AnyValue>) -> Self {
        Self(value)
    }

    /// `TypeId` of the held value (not of the box).
    pub fn value_type_id(&self) -> TypeId {
        self.0.as_ref().type_id()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Takes the value out, or gives `self` back if it holds another type.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(other) => Err(Self(other)),
        }
    }

    pub fn into_inner(self) -> Box<AnyValue> {
        self.0
    }
}

impl fmt::Debug for Typeless {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.downcast_ref::<Value>() {
            Some(value) => f.debug_tuple("Typeless").field(value).finish(),
            None => f.debug_tuple("Typeless").field(&self.value_type_id()).finish(),
        }
    }
}

/// Type-erased serialize and deserialize entry points for one concrete type.
#[derive(Clone, Copy)]
pub struct TypelessDelegates {
    pub serialize: fn(&mut Writer, &AnyValue, &dyn FormatterResolver) -> Result<()>,
    pub deserialize: fn(&mut Reader<'_>, &dyn FormatterResolver) -> Result<Box<AnyValue>>,
}

impl TypelessDelegates {
    pub fn of<T: Formattable + Send + Sync>() -> Self {
        Self {
            serialize: serialize_erased::<T>,
            deserialize: deserialize_erased::<T>,
        }
    }
}

fn serialize_erased<T: Formattable + Send + Sync>(
    writer: &mut Writer,
    value: &AnyValue,
    resolver: &dyn FormatterResolver,
) -> Result<()> {
    let value = value.downcast_ref::<T>().ok_or_else(|| {
        MessagePackError::Encode(format!("typeless delegate for {} got another type", type_name::<T>()))
    })?;
    resolver.serialize_value::<T>(writer, value)
}

fn deserialize_erased<T: Formattable + Send + Sync>(
    reader: &mut Reader<'_>,
    resolver: &dyn FormatterResolver,
) -> Result<Box<AnyValue>> {
    let value = resolver.deserialize_value::<T>(reader)?;
    Ok(Box::new(value))
}

/// A registered type: its wire name and how to build its delegates.
#[derive(Clone)]
pub struct TypeHandle {
    id: TypeId,
    name: Arc<str>,
    type_name: &'static str,
    build: fn() -> TypelessDelegates,
}

impl TypeHandle {
    pub fn new<T: Formattable + Send + Sync>(name: impl Into<Arc<str>>) -> Self {
        Self::with_builder::<T>(name, TypelessDelegates::of::<T>)
    }

    /// A handle with a custom delegate builder.
    pub fn with_builder<T: 'static>(name: impl Into<Arc<str>>, build: fn() -> TypelessDelegates) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: name.into(),
            type_name: type_name::<T>(),
            build,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The name written on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Maps runtime types to wire names and back.
pub trait TypeNameResolver: Send + Sync {
    fn by_type(&self, id: TypeId) -> Option<TypeHandle>;

    fn by_name(&self, name: &str) -> Option<TypeHandle>;
}

#[derive(Default)]
struct Names {
    by_type: HashMap<TypeId, TypeHandle>,
    by_name: HashMap<Arc<str>, TypeHandle>,
}

impl Names {
    fn insert(&mut self, handle: TypeHandle) {
        debug!(name = %handle.name, type_name = handle.type_name, "registered typeless name");
        self.by_name.insert(handle.name.clone(), handle.clone());
        self.by_type.insert(handle.id, handle);
    }
}

/// Registration-based [`TypeNameResolver`].
pub struct TypeRegistry {
    names: RwLock<Names>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            names: RwLock::new(Names::default()),
        }
    }

    /// A registry with the primitive types registered under their Rust names.
    pub fn new() -> Self {
        let registry = Self::empty();
        macro_rules! primitives {
            ($($ty:ty),*) => {$(
                registry.insert(TypeHandle::new::<$ty>(stringify!($ty)));
            )*};
        }
        primitives!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, char, String);
        registry
    }

    /// Process-wide registry used by the builtin [`Typeless`] formatter.
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(TypeRegistry::new())).clone()
    }

    /// Registers `T` under `name`.
    ///
    /// Registering the same pair again is a no-op. Fails if the name is taken by another
    /// type or the type already has another name.
    pub fn register<T: Formattable + Send + Sync>(&self, name: impl Into<Arc<str>>) -> Result<()> {
        self.register_handle(TypeHandle::new::<T>(name))
    }

    pub fn register_handle(&self, handle: TypeHandle) -> Result<()> {
        let mut names = self.names.write();
        if let Some(existing) = names.by_name.get(&handle.name) {
            if existing.id == handle.id {
                return Ok(());
            }
            return Err(MessagePackError::InvalidValue(format!(
                "type name '{}' is already registered for {}",
                handle.name, existing.type_name
            )));
        }
        if let Some(existing) = names.by_type.get(&handle.id) {
            return Err(MessagePackError::InvalidValue(format!(
                "{} is already registered as '{}'",
                handle.type_name, existing.name
            )));
        }
        names.insert(handle);
        Ok(())
    }

    fn insert(&self, handle: TypeHandle) {
        self.names.write().insert(handle);
    }

    pub fn len(&self) -> usize {
        self.names.read().by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeNameResolver for TypeRegistry {
    fn by_type(&self, id: TypeId) -> Option<TypeHandle> {
        self.names.read().by_type.get(&id).cloned()
    }

    fn by_name(&self, name: &str) -> Option<TypeHandle> {
        self.names.read().by_name.get(name).cloned()
    }
}

/// Formatter for [`Typeless`].
pub struct TypelessFormatter {
    names: Arc<dyn TypeNameResolver>,
    delegates: RwLock<HashMap<TypeId, TypelessDelegates>>,
    build_lock: Mutex<()>,
}

impl TypelessFormatter {
    pub fn new(names: Arc<dyn TypeNameResolver>) -> Self {
        Self {
            names,
            delegates: RwLock::new(HashMap::new()),
            build_lock: Mutex::new(()),
        }
    }

    /// Number of types whose delegates have been built.
    pub fn cached_len(&self) -> usize {
        self.delegates.read().len()
    }

    fn delegates_for(&self, handle: &TypeHandle) -> TypelessDelegates {
        if let Some(delegates) = self.delegates.read().get(&handle.id) {
            return *delegates;
        }
        let _guard = self.build_lock.lock();
        if let Some(delegates) = self.delegates.read().get(&handle.id) {
            return *delegates;
        }
        let delegates = (handle.build)();
        debug!(name = %handle.name, type_name = handle.type_name, "built typeless delegates");
        self.delegates.write().insert(handle.id, delegates);
        delegates
    }
}

impl Default for TypelessFormatter {
    fn default() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl Formatter<Typeless> for TypelessFormatter {
    fn serialize(&self, writer: &mut Writer, value: &Typeless, resolver: &dyn FormatterResolver) -> Result<()> {
        if let Some(plain) = value.downcast_ref::<Value>() {
            return plain.write(writer);
        }
        let id = value.value_type_id();
        let handle = self
            .names
            .by_type(id)
            .ok_or(MessagePackError::UnregisteredType(id))?;
        let delegates = self.delegates_for(&handle);

        let mut payload = Writer::new();
        payload.write_str(handle.name())?;
        (delegates.serialize)(&mut payload, value.0.as_ref(), resolver)?;

        writer.write_ext_header(ext::TYPELESS, payload.position())?;
        writer.write_raw(payload.as_slice());
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<Typeless> {
        let is_typeless = reader.peek_type()? == MessagePackType::Extension
            && reader.peek_ext_header()?.type_code == ext::TYPELESS;
        if !is_typeless {
            return Ok(Typeless::new(Value::read(reader)?));
        }

        let header = reader.read_ext_header()?;
        let start = reader.position();
        let (handle, value) = reader.nested(|reader| {
            let name = reader.read_str()?;
            let handle = self
                .names
                .by_name(&name)
                .ok_or_else(|| MessagePackError::UnknownTypeName(name.to_string()))?;
            let delegates = self.delegates_for(&handle);
            let value = (delegates.deserialize)(reader, resolver)?;
            Ok((handle, value))
        })?;

        let consumed = reader.position() - start;
        if consumed != header.length as usize {
            return Err(MessagePackError::InvalidValue(format!(
                "typeless payload for '{}' declared {} bytes but {} were read",
                handle.name(),
                header.length,
                consumed
            )));
        }
        Ok(Typeless(value))
    }
}

impl Formattable for Typeless {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Typeless, _>(TypelessFormatter::default()))
    }
}
