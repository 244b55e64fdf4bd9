//! The formatter protocol.
//!
//! A [`Formatter<T>`] turns a `T` into MessagePack and back. Formatters are stateless,
//! shared behind `Arc` and looked up through a [`FormatterResolver`], which is passed down
//! every call so nested values resolve their own formatters from the same chain.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::writer::Writer;
use crate::Result;

/// Serializes and deserializes values of one type.
pub trait Formatter<T>: Send + Sync {
    fn serialize(&self, writer: &mut Writer, value: &T, resolver: &dyn FormatterResolver) -> Result<()>;

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<T>;
}

/// A type with a formatter the builtin resolver can construct on demand.
///
/// Implemented for primitives, std collections and wrappers, tuples, the optional
/// third-party types and everything that derives `MessagePackObject`. Types without a
/// builtin formatter can still be serialized by registering one with a
/// [`RegistryResolver`](crate::RegistryResolver).
///
/// `builtin_formatter` only constructs the formatter. It must not resolve other
/// formatters; those are looked up lazily when the formatter runs.
pub trait Formattable: Sized + 'static {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        None
    }
}

/// A formatter with its value type erased, as stored in resolver caches.
#[derive(Clone)]
pub struct ErasedFormatter {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ErasedFormatter {
    pub fn new<T: 'static, F: Formatter<T> + 'static>(formatter: F) -> Self {
        Self::from_arc::<T>(Arc::new(formatter))
    }

    pub fn from_arc<T: 'static>(formatter: Arc<dyn Formatter<T>>) -> Self {
        Self {
            type_name: type_name::<T>(),
            inner: Arc::new(formatter),
        }
    }

    /// Name of the value type this formatter handles.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recovers the typed formatter. `None` if it was built for another type.
    pub fn downcast<T: 'static>(&self) -> Option<Arc<dyn Formatter<T>>> {
        self.inner.downcast_ref::<Arc<dyn Formatter<T>>>().cloned()
    }
}

impl fmt::Debug for ErasedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedFormatter")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Implements `Formattable` by returning a default-constructed formatter.
macro_rules! builtin {
    ($ty:ty => $formatter:expr) => {
        impl $crate::formatter::Formattable for $ty {
            fn builtin_formatter() -> Option<$crate::formatter::ErasedFormatter> {
                Some($crate::formatter::ErasedFormatter::new::<$ty, _>($formatter))
            }
        }
    };
}

pub(crate) use builtin;
