//! Formatters for sequences and maps.
//!
//! Sequences are arrays and maps are maps. Both are driven by one generic formatter
//! each: a collection type only describes how to count, enumerate and rebuild itself
//! ([`SequenceCollection`], [`MapCollection`]).
//!
//! On read the header count has already been checked against the remaining input, so
//! preallocating `count` slots is bounded by the size of the payload.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::formatter::{ErasedFormatter, Formattable, Formatter};
use crate::reader::Reader;
use crate::resolver::FormatterResolver;
use crate::writer::Writer;
use crate::{MessagePackError, Result};

/// A collection written as a MessagePack array.
pub trait SequenceCollection: Sized {
    type Item: Formattable;
    type Iter<'s>: Iterator<Item = &'s Self::Item>
    where
        Self: 's;
    /// Intermediate state while decoding.
    type Builder;

    fn count(&self) -> usize;

    /// Elements in wire order.
    fn elements(&self) -> Self::Iter<'_>;

    fn create(count: usize) -> Self::Builder;

    fn add(builder: &mut Self::Builder, item: Self::Item);

    fn complete(builder: Self::Builder) -> Result<Self>;
}

/// A collection written as a MessagePack map.
pub trait MapCollection: Sized {
    type Key: Formattable;
    type Value: Formattable;
    type Iter<'s>: Iterator<Item = (&'s Self::Key, &'s Self::Value)>
    where
        Self: 's;

    fn count(&self) -> usize;

    fn entries(&self) -> Self::Iter<'_>;

    fn create(count: usize) -> Self;

    fn insert(&mut self, key: Self::Key, value: Self::Value);
}

/// Array formatter for any [`SequenceCollection`].
pub struct SequenceFormatter<C>(PhantomData<fn() -> C>);

impl<C> SequenceFormatter<C> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C> Default for SequenceFormatter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SequenceCollection> Formatter<C> for SequenceFormatter<C> {
    fn serialize(&self, writer: &mut Writer, value: &C, resolver: &dyn FormatterResolver) -> Result<()> {
        let element = resolver.get_formatter_with_verify::<C::Item>()?;
        writer.write_array_header(value.count())?;
        for item in value.elements() {
            element.serialize(writer, item, resolver)?;
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<C> {
        let count = reader.read_array_header()? as usize;
        let element = resolver.get_formatter_with_verify::<C::Item>()?;
        let builder = reader.nested(|reader| {
            let mut builder = C::create(count);
            for _ in 0..count {
                C::add(&mut builder, element.deserialize(reader, resolver)?);
            }
            Ok(builder)
        })?;
        C::complete(builder)
    }
}

/// Map formatter for any [`MapCollection`].
pub struct MapFormatter<M>(PhantomData<fn() -> M>);

impl<M> MapFormatter<M> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M> Default for MapFormatter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MapCollection> Formatter<M> for MapFormatter<M> {
    fn serialize(&self, writer: &mut Writer, value: &M, resolver: &dyn FormatterResolver) -> Result<()> {
        let keys = resolver.get_formatter_with_verify::<M::Key>()?;
        let values = resolver.get_formatter_with_verify::<M::Value>()?;
        writer.write_map_header(value.count())?;
        for (k, v) in value.entries() {
            keys.serialize(writer, k, resolver)?;
            values.serialize(writer, v, resolver)?;
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<M> {
        let count = reader.read_map_header()? as usize;
        let keys = resolver.get_formatter_with_verify::<M::Key>()?;
        let values = resolver.get_formatter_with_verify::<M::Value>()?;
        reader.nested(|reader| {
            let mut map = M::create(count);
            for _ in 0..count {
                let k = keys.deserialize(reader, resolver)?;
                let v = values.deserialize(reader, resolver)?;
                map.insert(k, v);
            }
            Ok(map)
        })
    }
}

macro_rules! sequence_builtin {
    (impl<$($gen:ident),*> for $ty:ty $(where $($bound:tt)*)?) => {
        impl<$($gen),*> Formattable for $ty
        where
            $ty: SequenceCollection + 'static,
            $($($bound)*)?
        {
            fn builtin_formatter() -> Option<ErasedFormatter> {
                Some(ErasedFormatter::new::<$ty, _>(SequenceFormatter::<$ty>::new()))
            }
        }
    };
}

// --- Vec / VecDeque / LinkedList ---

impl<T: Formattable> SequenceCollection for Vec<T> {
    type Item = T;
    type Iter<'s> = std::slice::Iter<'s, T>
    where
        Self: 's;
    type Builder = Vec<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> Vec<T> {
        Vec::with_capacity(count)
    }

    fn add(builder: &mut Vec<T>, item: T) {
        builder.push(item);
    }

    fn complete(builder: Vec<T>) -> Result<Self> {
        Ok(builder)
    }
}

sequence_builtin!(impl<T> for Vec<T>);

impl<T: Formattable> SequenceCollection for VecDeque<T> {
    type Item = T;
    type Iter<'s> = std::collections::vec_deque::Iter<'s, T>
    where
        Self: 's;
    type Builder = VecDeque<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> VecDeque<T> {
        VecDeque::with_capacity(count)
    }

    fn add(builder: &mut VecDeque<T>, item: T) {
        builder.push_back(item);
    }

    fn complete(builder: VecDeque<T>) -> Result<Self> {
        Ok(builder)
    }
}

sequence_builtin!(impl<T> for VecDeque<T>);

impl<T: Formattable> SequenceCollection for LinkedList<T> {
    type Item = T;
    type Iter<'s> = std::collections::linked_list::Iter<'s, T>
    where
        Self: 's;
    type Builder = LinkedList<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(_: usize) -> LinkedList<T> {
        LinkedList::new()
    }

    fn add(builder: &mut LinkedList<T>, item: T) {
        builder.push_back(item);
    }

    fn complete(builder: LinkedList<T>) -> Result<Self> {
        Ok(builder)
    }
}

sequence_builtin!(impl<T> for LinkedList<T>);

// --- Sets ---

impl<T, S> SequenceCollection for HashSet<T, S>
where
    T: Formattable + Eq + Hash,
    S: BuildHasher + Default,
{
    type Item = T;
    type Iter<'s> = std::collections::hash_set::Iter<'s, T>
    where
        Self: 's;
    type Builder = HashSet<T, S>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> HashSet<T, S> {
        HashSet::with_capacity_and_hasher(count, S::default())
    }

    fn add(builder: &mut HashSet<T, S>, item: T) {
        builder.insert(item);
    }

    fn complete(builder: HashSet<T, S>) -> Result<Self> {
        Ok(builder)
    }
}

sequence_builtin!(impl<T, S> for HashSet<T, S> where S: 'static);

impl<T: Formattable + Ord> SequenceCollection for BTreeSet<T> {
    type Item = T;
    type Iter<'s> = std::collections::btree_set::Iter<'s, T>
    where
        Self: 's;
    type Builder = BTreeSet<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(_: usize) -> BTreeSet<T> {
        BTreeSet::new()
    }

    fn add(builder: &mut BTreeSet<T>, item: T) {
        builder.insert(item);
    }

    fn complete(builder: BTreeSet<T>) -> Result<Self> {
        Ok(builder)
    }
}

sequence_builtin!(impl<T> for BTreeSet<T>);

// --- Fixed-size and boxed slices ---

impl<T: Formattable, const N: usize> SequenceCollection for [T; N] {
    type Item = T;
    type Iter<'s> = std::slice::Iter<'s, T>
    where
        Self: 's;
    type Builder = Vec<T>;

    fn count(&self) -> usize {
        N
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> Vec<T> {
        Vec::with_capacity(count.min(N))
    }

    fn add(builder: &mut Vec<T>, item: T) {
        builder.push(item);
    }

    fn complete(builder: Vec<T>) -> Result<Self> {
        let actual = builder.len();
        builder.try_into().map_err(|_| MessagePackError::CountMismatch {
            type_name: std::any::type_name::<[T; N]>(),
            expected: N,
            actual,
        })
    }
}

impl<T: Formattable, const N: usize> Formattable for [T; N] {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<[T; N], _>(SequenceFormatter::<[T; N]>::new()))
    }
}

impl<T: Formattable> SequenceCollection for Box<[T]> {
    type Item = T;
    type Iter<'s> = std::slice::Iter<'s, T>
    where
        Self: 's;
    type Builder = Vec<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> Vec<T> {
        Vec::with_capacity(count)
    }

    fn add(builder: &mut Vec<T>, item: T) {
        builder.push(item);
    }

    fn complete(builder: Vec<T>) -> Result<Self> {
        Ok(builder.into_boxed_slice())
    }
}

sequence_builtin!(impl<T> for Box<[T]>);

// --- Stack ---

/// A last-in first-out stack.
///
/// Serialized top-first, so the first element on the wire is the next one `pop` returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Stack<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates from the top of the stack down.
    pub fn iter(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.items.iter().rev()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for Stack<T> {
    /// Pushes the items in order; the last one ends up on top.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Formattable> SequenceCollection for Stack<T> {
    type Item = T;
    type Iter<'s> = std::iter::Rev<std::slice::Iter<'s, T>>
    where
        Self: 's;
    type Builder = Vec<T>;

    fn count(&self) -> usize {
        self.len()
    }

    fn elements(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> Vec<T> {
        Vec::with_capacity(count)
    }

    fn add(builder: &mut Vec<T>, item: T) {
        builder.push(item);
    }

    fn complete(mut builder: Vec<T>) -> Result<Self> {
        builder.reverse();
        Ok(Stack { items: builder })
    }
}

sequence_builtin!(impl<T> for Stack<T>);

// --- Array2 ---

/// A row-major two-dimensional array.
///
/// Encoded as `[rows, cols, [elements...]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array2<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Array2<T> {
    /// Fails unless `data` holds exactly `rows * cols` elements.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            MessagePackError::InvalidValue(format!("array dimensions {}x{} overflow", rows, cols))
        })?;
        if data.len() != expected {
            return Err(MessagePackError::CountMismatch {
                type_name: std::any::type_name::<Self>(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "index ({}, {}) out of bounds", row, col);
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "index ({}, {}) out of bounds", row, col);
        &mut self.data[row * self.cols + col]
    }
}

pub struct Array2Formatter<T>(PhantomData<fn() -> T>);

impl<T> Default for Array2Formatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Formattable> Formatter<Array2<T>> for Array2Formatter<T> {
    fn serialize(&self, writer: &mut Writer, value: &Array2<T>, resolver: &dyn FormatterResolver) -> Result<()> {
        let element = resolver.get_formatter_with_verify::<T>()?;
        writer.write_array_header(3)?;
        writer.write_u64(value.rows as u64);
        writer.write_u64(value.cols as u64);
        writer.write_array_header(value.data.len())?;
        for item in &value.data {
            element.serialize(writer, item, resolver)?;
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut Reader<'_>, resolver: &dyn FormatterResolver) -> Result<Array2<T>> {
        let header = reader.read_array_header()? as usize;
        if header != 3 {
            return Err(MessagePackError::CountMismatch {
                type_name: std::any::type_name::<Array2<T>>(),
                expected: 3,
                actual: header,
            });
        }
        let (rows, cols, data) = reader.nested(|reader| {
            let rows = reader.read_integer()?.convert::<usize>("usize")?;
            let cols = reader.read_integer()?.convert::<usize>("usize")?;
            let data: Vec<T> = SequenceFormatter::<Vec<T>>::new().deserialize(reader, resolver)?;
            Ok((rows, cols, data))
        })?;
        Array2::new(rows, cols, data)
    }
}

impl<T: Formattable> Formattable for Array2<T> {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Array2<T>, _>(Array2Formatter::<T>::default()))
    }
}

// --- Maps ---

impl<K, V, S> MapCollection for HashMap<K, V, S>
where
    K: Formattable + Eq + Hash,
    V: Formattable,
    S: BuildHasher + Default,
{
    type Key = K;
    type Value = V;
    type Iter<'s> = std::collections::hash_map::Iter<'s, K, V>
    where
        Self: 's;

    fn count(&self) -> usize {
        self.len()
    }

    fn entries(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(count: usize) -> Self {
        HashMap::with_capacity_and_hasher(count, S::default())
    }

    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }
}

impl<K, V, S> Formattable for HashMap<K, V, S>
where
    K: Formattable + Eq + Hash,
    V: Formattable,
    S: BuildHasher + Default + 'static,
{
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Self, _>(MapFormatter::<Self>::new()))
    }
}

impl<K: Formattable + Ord, V: Formattable> MapCollection for BTreeMap<K, V> {
    type Key = K;
    type Value = V;
    type Iter<'s> = std::collections::btree_map::Iter<'s, K, V>
    where
        Self: 's;

    fn count(&self) -> usize {
        self.len()
    }

    fn entries(&self) -> Self::Iter<'_> {
        self.iter()
    }

    fn create(_: usize) -> Self {
        BTreeMap::new()
    }

    fn insert(&mut self, key: K, value: V) {
        BTreeMap::insert(self, key, value);
    }
}

impl<K: Formattable + Ord, V: Formattable> Formattable for BTreeMap<K, V> {
    fn builtin_formatter() -> Option<ErasedFormatter> {
        Some(ErasedFormatter::new::<Self, _>(MapFormatter::<Self>::new()))
    }
}
