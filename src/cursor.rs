//! Read positions over contiguous and segmented byte sources.
//!
//! Decoding never cares where the bytes live. A [`Cursor`] hides whether the input is one
//! slice ([`SliceCursor`]) or several disjoint ones ([`SegmentedCursor`]). Every read
//! first checks whether the current span already holds the requested bytes; only a read
//! that straddles a segment boundary takes the copying path.

use std::borrow::Cow;

use crate::{MessagePackError, Result};

/// A forward-only read position over an immutable byte source.
pub trait Cursor<'a> {
    /// Bytes left before the logical end of the source.
    fn remaining(&self) -> usize;

    /// Bytes consumed since the cursor was created.
    fn position(&self) -> usize;

    /// Whether the source is split across more than one span.
    fn is_segmented(&self) -> bool;

    /// The unread bytes of the current span. Empty only at the end of the source.
    fn current_span(&self) -> &'a [u8];

    /// Moves forward `n` bytes, crossing span boundaries as needed.
    fn advance(&mut self, n: usize) -> Result<()>;

    /// Moves forward `n` bytes inside the current span.
    ///
    /// The caller must already know that `current_span().len() >= n`.
    fn advance_within_span(&mut self, n: usize);

    /// Copies the next `dst.len()` bytes into `dst` without advancing.
    fn peek_into(&self, dst: &mut [u8]) -> Result<()>;

    fn peek_byte(&self) -> Result<u8> {
        match self.current_span().first() {
            Some(b) => Ok(*b),
            None => Err(MessagePackError::InsufficientData {
                needed: 1,
                remaining: 0,
            }),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = self.peek_byte()?;
        self.advance_within_span(1);
        Ok(b)
    }

    /// Reads exactly `N` bytes.
    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        let span = self.current_span();
        if span.len() >= N {
            out.copy_from_slice(&span[..N]);
            self.advance_within_span(N);
            return Ok(out);
        }
        self.peek_into(&mut out)?;
        self.advance(N)?;
        Ok(out)
    }

    /// Reads `n` bytes, borrowing them when they lie inside one span.
    fn read_slice(&mut self, n: usize) -> Result<Cow<'a, [u8]>> {
        let span = self.current_span();
        if span.len() >= n {
            self.advance_within_span(n);
            return Ok(Cow::Borrowed(&span[..n]));
        }
        ensure_remaining(n, self.remaining())?;
        let mut owned = vec![0u8; n];
        self.peek_into(&mut owned)?;
        self.advance(n)?;
        Ok(Cow::Owned(owned))
    }
}

#[inline]
pub(crate) fn ensure_remaining(needed: usize, remaining: usize) -> Result<()> {
    if needed > remaining {
        Err(MessagePackError::InsufficientData { needed, remaining })
    } else {
        Ok(())
    }
}

/// Cursor over a single contiguous slice.
#[derive(Debug, Clone)]
pub struct SliceCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Cursor<'a> for SliceCursor<'a> {
    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn is_segmented(&self) -> bool {
        false
    }

    #[inline]
    fn current_span(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    #[inline]
    fn advance(&mut self, n: usize) -> Result<()> {
        ensure_remaining(n, self.remaining())?;
        self.pos += n;
        Ok(())
    }

    #[inline]
    fn advance_within_span(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.pos += n;
    }

    fn peek_into(&self, dst: &mut [u8]) -> Result<()> {
        ensure_remaining(dst.len(), self.remaining())?;
        dst.copy_from_slice(&self.buf[self.pos..self.pos + dst.len()]);
        Ok(())
    }
}

/// Cursor over a logically contiguous sequence stored as several slices.
///
/// Empty segments are allowed and skipped.
#[derive(Debug, Clone)]
pub struct SegmentedCursor<'a> {
    segments: &'a [&'a [u8]],
    /// Index of the current segment.
    index: usize,
    /// Offset inside the current segment.
    offset: usize,
    remaining: usize,
    consumed: usize,
}

impl<'a> SegmentedCursor<'a> {
    pub fn new(segments: &'a [&'a [u8]]) -> Self {
        let remaining = segments.iter().map(|s| s.len()).sum();
        let mut cursor = Self {
            segments,
            index: 0,
            offset: 0,
            remaining,
            consumed: 0,
        };
        cursor.skip_exhausted();
        cursor
    }

    /// Moves to the next segment with unread bytes.
    fn skip_exhausted(&mut self) {
        while self.index < self.segments.len() && self.offset >= self.segments[self.index].len() {
            self.index += 1;
            self.offset = 0;
        }
    }
}

impl<'a> Cursor<'a> for SegmentedCursor<'a> {
    #[inline]
    fn remaining(&self) -> usize {
        self.remaining
    }

    #[inline]
    fn position(&self) -> usize {
        self.consumed
    }

    #[inline]
    fn is_segmented(&self) -> bool {
        true
    }

    #[inline]
    fn current_span(&self) -> &'a [u8] {
        let segments: &'a [&'a [u8]] = self.segments;
        match segments.get(self.index) {
            Some(segment) => &segment[self.offset..],
            None => &[],
        }
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        ensure_remaining(n, self.remaining)?;
        let mut left = n;
        while left > 0 {
            let available = self.segments[self.index].len() - self.offset;
            let step = available.min(left);
            self.offset += step;
            left -= step;
            self.skip_exhausted();
        }
        self.remaining -= n;
        self.consumed += n;
        Ok(())
    }

    #[inline]
    fn advance_within_span(&mut self, n: usize) {
        debug_assert!(n <= self.current_span().len());
        self.offset += n;
        self.remaining -= n;
        self.consumed += n;
        self.skip_exhausted();
    }

    fn peek_into(&self, dst: &mut [u8]) -> Result<()> {
        ensure_remaining(dst.len(), self.remaining)?;
        let mut written = 0;
        let mut index = self.index;
        let mut offset = self.offset;
        while written < dst.len() {
            let segment = self.segments[index];
            let available = &segment[offset..];
            let step = available.len().min(dst.len() - written);
            dst[written..written + step].copy_from_slice(&available[..step]);
            written += step;
            index += 1;
            offset = 0;
        }
        Ok(())
    }
}

/// Either kind of cursor, chosen at runtime.
///
/// This is the default cursor of [`Reader`](crate::Reader) so formatters can take one
/// concrete reader type. Code that only ever reads slices can use
/// `Reader<'a, SliceCursor<'a>>` to drop the variant check.
#[derive(Debug, Clone)]
pub enum ByteCursor<'a> {
    Contiguous(SliceCursor<'a>),
    Segmented(SegmentedCursor<'a>),
}

impl<'a> ByteCursor<'a> {
    pub fn contiguous(buf: &'a [u8]) -> Self {
        ByteCursor::Contiguous(SliceCursor::new(buf))
    }

    /// A single-segment sequence is read through the contiguous path.
    pub fn segmented(segments: &'a [&'a [u8]]) -> Self {
        match segments {
            [] => ByteCursor::Contiguous(SliceCursor::new(&[])),
            [single] => ByteCursor::Contiguous(SliceCursor::new(*single)),
            _ => ByteCursor::Segmented(SegmentedCursor::new(segments)),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            ByteCursor::Contiguous($c) => $body,
            ByteCursor::Segmented($c) => $body,
        }
    };
}

impl<'a> Cursor<'a> for ByteCursor<'a> {
    #[inline]
    fn remaining(&self) -> usize {
        dispatch!(self, c => c.remaining())
    }

    #[inline]
    fn position(&self) -> usize {
        dispatch!(self, c => c.position())
    }

    #[inline]
    fn is_segmented(&self) -> bool {
        matches!(self, ByteCursor::Segmented(_))
    }

    #[inline]
    fn current_span(&self) -> &'a [u8] {
        dispatch!(self, c => c.current_span())
    }

    #[inline]
    fn advance(&mut self, n: usize) -> Result<()> {
        dispatch!(self, c => c.advance(n))
    }

    #[inline]
    fn advance_within_span(&mut self, n: usize) {
        dispatch!(self, c => c.advance_within_span(n))
    }

    #[inline]
    fn peek_into(&self, dst: &mut [u8]) -> Result<()> {
        dispatch!(self, c => c.peek_into(dst))
    }
}
