//! Formatter lookup.
//!
//! Resolvers map a [`TypeKey`] to an [`ErasedFormatter`]. They compose: a
//! [`CompositeResolver`] asks its members in order and the first hit wins, so a
//! [`RegistryResolver`] placed before the [`BuiltinResolver`] overrides builtin formatters.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::formatter::{ErasedFormatter, Formattable, Formatter};
use crate::reader::Reader;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

/// Identity of a type plus the factory for its builtin formatter.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    builtin: fn() -> Option<ErasedFormatter>,
}

impl TypeKey {
    pub fn of<T: Formattable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            builtin: T::builtin_formatter,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Constructs the type's builtin formatter, if it has one.
    pub fn builtin_formatter(&self) -> Option<ErasedFormatter> {
        (self.builtin)()
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

/// Source of formatters.
pub trait FormatterResolver: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    fn resolve(&self, key: &TypeKey) -> Option<ErasedFormatter>;

    /// Names of every resolver consulted by this one, in order.
    fn chain(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }
}

impl dyn FormatterResolver + '_ {
    pub fn get_formatter<T: Formattable>(&self) -> Option<Arc<dyn Formatter<T>>> {
        self.resolve(&TypeKey::of::<T>())?.downcast::<T>()
    }

    /// Like [`get_formatter`](Self::get_formatter) but a miss is an error naming the chain.
    pub fn get_formatter_with_verify<T: Formattable>(&self) -> Result<Arc<dyn Formatter<T>>> {
        self.get_formatter::<T>()
            .ok_or_else(|| MessagePackError::FormatterNotFound {
                type_name: type_name::<T>(),
                chain: self.chain(),
            })
    }

    pub fn serialize_value<T: Formattable>(&self, writer: &mut Writer, value: &T) -> Result<()> {
        self.get_formatter_with_verify::<T>()?
            .serialize(writer, value, self)
    }

    pub fn deserialize_value<T: Formattable>(&self, reader: &mut Reader<'_>) -> Result<T> {
        self.get_formatter_with_verify::<T>()?
            .deserialize(reader, self)
    }
}

/// Formatters every [`Formattable`] type provides for itself.
///
/// Each type's formatter is constructed on first use and cached. Concurrent first uses
/// construct it once.
pub struct BuiltinResolver {
    cache: RwLock<HashMap<TypeId, Option<ErasedFormatter>>>,
    build_lock: Mutex<()>,
}

impl BuiltinResolver {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            build_lock: Mutex::new(()),
        }
    }

    /// Number of types resolved so far, hits and misses alike.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for BuiltinResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterResolver for BuiltinResolver {
    fn name(&self) -> &str {
        "builtin"
    }

    fn resolve(&self, key: &TypeKey) -> Option<ErasedFormatter> {
        if let Some(cached) = self.cache.read().get(&key.id()) {
            return cached.clone();
        }
        let _guard = self.build_lock.lock();
        if let Some(cached) = self.cache.read().get(&key.id()) {
            return cached.clone();
        }
        let built = key.builtin_formatter();
        debug!(
            type_name = key.name(),
            found = built.is_some(),
            "built builtin formatter"
        );
        self.cache.write().insert(key.id(), built.clone());
        built
    }
}

/// Formatters registered explicitly at runtime.
pub struct RegistryResolver {
    name: String,
    formatters: RwLock<HashMap<TypeId, ErasedFormatter>>,
}

impl RegistryResolver {
    pub fn new() -> Self {
        Self::named("registry")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formatters: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `formatter` for `T`, replacing any earlier registration.
    pub fn register<T: 'static, F: Formatter<T> + 'static>(&self, formatter: F) {
        self.register_erased(TypeId::of::<T>(), ErasedFormatter::new::<T, F>(formatter));
    }

    pub fn register_arc<T: 'static>(&self, formatter: Arc<dyn Formatter<T>>) {
        self.register_erased(TypeId::of::<T>(), ErasedFormatter::from_arc::<T>(formatter));
    }

    fn register_erased(&self, id: TypeId, formatter: ErasedFormatter) {
        debug!(
            resolver = %self.name,
            type_name = formatter.type_name(),
            "registered formatter"
        );
        self.formatters.write().insert(id, formatter);
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.formatters.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.formatters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegistryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterResolver for RegistryResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, key: &TypeKey) -> Option<ErasedFormatter> {
        self.formatters.read().get(&key.id()).cloned()
    }
}

/// An ordered chain of resolvers. The first one that knows the type wins.
pub struct CompositeResolver {
    name: String,
    resolvers: Vec<Arc<dyn FormatterResolver>>,
}

impl CompositeResolver {
    pub fn new(name: impl Into<String>, resolvers: Vec<Arc<dyn FormatterResolver>>) -> Self {
        Self {
            name: name.into(),
            resolvers,
        }
    }

    pub fn resolvers(&self) -> &[Arc<dyn FormatterResolver>] {
        &self.resolvers
    }
}

impl FormatterResolver for CompositeResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, key: &TypeKey) -> Option<ErasedFormatter> {
        let found = self.resolvers.iter().find_map(|r| r.resolve(key));
        if found.is_none() {
            trace!(resolver = %self.name, type_name = key.name(), "no formatter in chain");
        }
        found
    }

    fn chain(&self) -> Vec<String> {
        self.resolvers.iter().flat_map(|r| r.chain()).collect()
    }
}

/// The default resolver: builtin formatters, optionally preceded by user registrations.
pub struct StandardResolver {
    inner: CompositeResolver,
}

impl StandardResolver {
    pub fn new() -> Self {
        let builtin: Arc<dyn FormatterResolver> = Arc::new(BuiltinResolver::new());
        Self {
            inner: CompositeResolver::new("standard", vec![builtin]),
        }
    }

    /// Consults `registry` before the builtin formatters.
    pub fn with_registry(registry: Arc<RegistryResolver>) -> Self {
        let registry: Arc<dyn FormatterResolver> = registry;
        let builtin: Arc<dyn FormatterResolver> = Arc::new(BuiltinResolver::new());
        Self {
            inner: CompositeResolver::new("standard", vec![registry, builtin]),
        }
    }

    /// Process-wide instance, created on first use.
    pub fn shared() -> Arc<dyn FormatterResolver> {
        static SHARED: OnceLock<Arc<dyn FormatterResolver>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(StandardResolver::new()))
            .clone()
    }
}

impl Default for StandardResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterResolver for StandardResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn resolve(&self, key: &TypeKey) -> Option<ErasedFormatter> {
        self.inner.resolve(key)
    }

    fn chain(&self) -> Vec<String> {
        self.inner.chain()
    }
}
