//! Tuples of arity 1 to 8, encoded as fixed-length arrays.
//!
//! The array length must equal the arity on read; anything else is a
//! [`CountMismatch`](crate::MessagePackError::CountMismatch).
//!
//! ```
//! use packwire::{deserialize, serialize, MessagePackError};
//!
//! let bytes = serialize(&(1u8, "a".to_string())).unwrap();
//! assert_eq!(&bytes[..], &[0x92, 0x01, 0xa1, b'a']);
//! assert_eq!(deserialize::<(u8, String)>(&bytes).unwrap(), (1, "a".to_string()));
//!
//! let err = deserialize::<(u8, String, bool)>(&bytes).unwrap_err();
//! assert!(matches!(err, MessagePackError::CountMismatch { expected: 3, actual: 2, .. }));
//! ```

use std::marker::PhantomData;

use crate::formatter::{ErasedFormatter, Formattable, Formatter};
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

/// Formatter for a tuple `T`; each element goes through the resolver, so nested
/// tuples and user types work as elements.
pub struct TupleFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for TupleFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

macro_rules! tuple_formatter {
    ($len:expr => $($name:ident . $idx:tt),+) => {
        impl<$($name: Formattable),+> Formatter<($($name,)+)> for TupleFormatter<($($name,)+)> {
            fn serialize(
                &self,
                writer: &mut Writer,
                value: &($($name,)+),
                resolver: &dyn FormatterResolver,
            ) -> Result<()> {
                writer.write_array_header($len)?;
                $(resolver.serialize_value::<$name>(writer, &value.$idx)?;)+
                Ok(())
            }

            fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<($($name,)+)> {
                let count = reader.read_array_header()? as usize;
                if count != $len {
                    return Err(MessagePackError::CountMismatch {
                        type_name: std::any::type_name::<($($name,)+)>(),
                        expected: $len,
                        actual: count,
                    });
                }
                reader.nested(|reader| Ok(($(resolver.deserialize_value::<$name>(reader)?,)+)))
            }
        }

        impl<$($name: Formattable),+> Formattable for ($($name,)+) {
            fn builtin_formatter() -> Option<ErasedFormatter> {
                Some(ErasedFormatter::new::<($($name,)+), _>(TupleFormatter::<($($name,)+)>::default()))
            }
        }
    };
}

tuple_formatter!(1 => A.0);
tuple_formatter!(2 => A.0, B.1);
tuple_formatter!(3 => A.0, B.1, C.2);
tuple_formatter!(4 => A.0, B.1, C.2, D.3);
tuple_formatter!(5 => A.0, B.1, C.2, D.3, E.4);
tuple_formatter!(6 => A.0, B.1, C.2, D.3, E.4, F.5);
tuple_formatter!(7 => A.0, B.1, C.2, D.3, E.4, F.5, G.6);
tuple_formatter!(8 => A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
