//! Spans of input positions and the triangular matrices indexed by them.

use core::ops::Index;
use core::ops::IndexMut;
use std::fmt;

/// A contiguous range of input token positions, given by its start and its
/// (non-zero) length.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    /// Position of the first token.
    pub start: u32,
    /// Number of tokens covered, at least 1 for chart spans.
    pub len: u32,
}

impl Span {
    /// Creates a new span.
    #[inline]
    #[must_use]
    pub const fn new(start: usize, len: usize) -> Span {
        Span {
            start: start as u32,
            len: len as u32,
        }
    }

    /// Position of the first token.
    #[inline]
    #[must_use]
    pub const fn start(self) -> usize {
        self.start as usize
    }

    /// Number of tokens covered.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    /// Returns true for a zero-length span; chart spans never are.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Position one past the last token.
    #[inline]
    #[must_use]
    pub const fn end(self) -> usize {
        self.start as usize + self.len as usize
    }

    /// Returns true if `other` lies within this span.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Span) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Returns true if `other` lies within this span and is shorter.
    #[inline]
    #[must_use]
    pub const fn strictly_contains(self, other: Span) -> bool {
        self.contains(other) && other.len < self.len
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end())
    }
}

/// Total number of chart spans over a sentence of `size` tokens.
#[inline]
#[must_use]
pub const fn span_count(size: usize) -> usize {
    size * (size + 1) / 2
}

/// A triangular matrix holding one value per span of a sentence.
///
/// Values are laid out by start position, then by length, so the spans
/// starting at one position are contiguous.  The storage is kept across
/// [`SpanMatrix::resize`] calls, so that one matrix can be reused for many
/// sentences.
#[derive(Debug, Clone)]
pub struct SpanMatrix<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T> Default for SpanMatrix<T> {
    fn default() -> Self {
        Self {
            size: 0,
            cells: vec![],
        }
    }
}

impl<T> SpanMatrix<T> {
    /// Number of sentence positions this matrix was sized for.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of cells, which is `span_count(size)`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the matrix has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Checked mapping from a span to its cell index.
    #[inline]
    fn cell_index(&self, span: Span) -> usize {
        assert!(span.len > 0, "Cannot index an empty span {span}!");
        assert!(
            span.end() <= self.size,
            "Span {span} is outside of the sentence of length {}!",
            self.size
        );
        // spans starting before `start` take up size + (size-1) + ... cells
        let start = span.start();
        start * self.size - start * start.saturating_sub(1) / 2 + span.len() - 1
    }

    /// Iterator through all the spans of the matrix, in storage order.
    pub fn spans(&self) -> impl Iterator<Item = Span> {
        let size = self.size;
        (0..size).flat_map(move |start| (1..=size - start).map(move |len| Span::new(start, len)))
    }

    /// Iterator through all cells with their spans.
    pub fn iter(&self) -> impl Iterator<Item = (Span, &T)> {
        self.spans().zip(self.cells.iter())
    }
}

impl<T: Default> SpanMatrix<T> {
    /// Creates a matrix for a sentence of `size` tokens, all cells defaulted.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let mut matrix = Self::default();
        matrix.resize(size, |_| {});
        matrix
    }

    /// Resizes the matrix for a new sentence.  Every cell is either reset
    /// with `reset`, or created by `Default`.
    pub fn resize(&mut self, size: usize, mut reset: impl FnMut(&mut T)) {
        let count = span_count(size);
        self.cells.truncate(count);
        self.cells.iter_mut().for_each(&mut reset);
        self.cells.resize_with(count, T::default);
        self.size = size;
    }
}

impl<T> Index<Span> for SpanMatrix<T> {
    type Output = T;

    fn index(&self, span: Span) -> &Self::Output {
        &self.cells[self.cell_index(span)]
    }
}

impl<T> IndexMut<Span> for SpanMatrix<T> {
    fn index_mut(&mut self, span: Span) -> &mut Self::Output {
        let index = self.cell_index(span);
        &mut self.cells[index]
    }
}

#[cfg(test)]
mod tests {
    use super::{span_count, Span, SpanMatrix};

    #[test]
    fn test_cell_index_is_dense() {
        let mut matrix: SpanMatrix<Option<Span>> = SpanMatrix::new(5);
        assert_eq!(matrix.len(), span_count(5));
        let spans: Vec<_> = matrix.spans().collect();
        for &span in &spans {
            assert_eq!(matrix[span], None, "cell for {span} was already used");
            matrix[span] = Some(span);
        }
        assert_eq!(spans.len(), 15);
        assert!(matrix.iter().all(|(span, cell)| *cell == Some(span)));
    }

    #[test]
    #[should_panic(expected = "outside of the sentence")]
    fn test_out_of_range_span() {
        let matrix: SpanMatrix<u8> = SpanMatrix::new(3);
        let _value: u8 = matrix[Span::new(2, 2)];
    }

    #[test]
    fn test_resize_resets_cells() {
        let mut matrix: SpanMatrix<Vec<u8>> = SpanMatrix::new(2);
        matrix[Span::new(1, 1)].push(1);
        matrix.resize(3, Vec::clear);
        assert_eq!(matrix.len(), 6);
        assert!(matrix.iter().all(|(_, cell)| cell.is_empty()));
    }

    #[test]
    fn test_containment() {
        let outer = Span::new(1, 3);
        assert!(outer.strictly_contains(Span::new(2, 2)));
        assert!(outer.contains(outer));
        assert!(!outer.strictly_contains(outer));
        assert!(!outer.contains(Span::new(0, 2)));
        assert_eq!(outer.to_string(), "[1,4)");
    }
}
