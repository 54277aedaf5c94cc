//! The per-span input paths and their active-chart state.
//!
//! Rule matching is incremental: a rule source keeps, for every span, the
//! partial matches whose consumed source symbols end exactly at the end of
//! that span.  When a longer span with the same start is matched, those
//! partial matches are advanced over the last symbol instead of matching the
//! whole grammar again.  Partial matches of a span are written only while
//! that span is matched, and read-only afterwards.
//!
//! Completed matches are stored per span, grouped by [`SymbolBind`].

use crate::phrase::{SourceSymbol, TargetPhrase};
use crate::span::{Span, SpanMatrix};
use crate::util::HashMap;
use crate::vocab::Label;
use std::sync::Arc;
use tinyvec::TinyVec;

/// One source symbol of a match, and the span it was matched against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindElement {
    /// The sub-span covered by the symbol.
    pub span: Span,
    /// The matched symbol.
    pub symbol: SourceSymbol,
}

/// The assignment of a rule's source symbols to sub-spans.
///
/// Two bindings are equal if every symbol is assigned to the same sub-span,
/// with the same word or label.  All the target phrases with an equal
/// binding share their nonterminal gaps, and so the same gap fillers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SymbolBind {
    elements: TinyVec<[BindElement; 4]>,
}

impl SymbolBind {
    /// Creates an empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this binding extended by one symbol.
    #[must_use]
    pub fn with(&self, span: Span, symbol: SourceSymbol) -> Self {
        let mut bind = self.clone();
        bind.elements.push(BindElement { span, symbol });
        bind
    }

    /// All elements, in source order.
    #[must_use]
    pub fn elements(&self) -> &[BindElement] {
        &self.elements
    }

    /// The nonterminal elements, in source order.
    pub fn gaps(&self) -> impl Iterator<Item = (Span, Label)> + '_ {
        self.elements.iter().filter_map(|element| match element.symbol {
            SourceSymbol::NonTerminal(label) => Some((element.span, label)),
            SourceSymbol::Terminal(_) => None,
        })
    }

    /// Number of nonterminal elements.
    #[must_use]
    pub fn num_gaps(&self) -> usize {
        self.gaps().count()
    }

    /// The input position right after the last matched symbol.
    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.elements.last().map(|element| element.span.end())
    }
}

/// A partial match: the state reached in a rule source's automaton, and the
/// symbols consumed to reach it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveEntry {
    /// Source-specific automaton state.
    pub node: u32,
    /// Symbols consumed so far.
    pub bind: SymbolBind,
}

/// The partial matches of one rule source ending at one position.
pub type ActiveChart = Vec<ActiveEntry>;

/// The matching record of one span.
#[derive(Debug, Default)]
pub struct InputPath {
    span: Span,
    active: Vec<ActiveChart>,
    candidates: Vec<(SymbolBind, Vec<Arc<TargetPhrase>>)>,
    index: HashMap<SymbolBind, usize>,
}

impl InputPath {
    fn reset(&mut self, span: Span, num_sources: usize) {
        self.span = span;
        self.active.iter_mut().for_each(Vec::clear);
        self.active.resize_with(num_sources, Vec::new);
        self.candidates.clear();
        self.index.clear();
    }

    /// The span this path covers.
    #[must_use]
    pub const fn span(&self) -> Span {
        self.span
    }

    /// The partial matches of the source in `slot` ending at this span's end.
    #[must_use]
    pub fn active(&self, slot: usize) -> &ActiveChart {
        &self.active[slot]
    }

    /// Mutable access to the partial matches of the source in `slot`.
    pub fn active_mut(&mut self, slot: usize) -> &mut ActiveChart {
        &mut self.active[slot]
    }

    /// Adds matched target phrases for a binding.  Phrases for a binding
    /// which has been seen already for this span, possibly from another
    /// source, are appended to the same group.
    pub fn add_candidates(
        &mut self,
        bind: &SymbolBind,
        phrases: impl IntoIterator<Item = Arc<TargetPhrase>>,
    ) {
        debug_assert!(bind.end() == Some(self.span.end()));
        let index = match self.index.get(bind) {
            Some(&index) => index,
            None => {
                self.index.insert(bind.clone(), self.candidates.len());
                self.candidates.push((bind.clone(), vec![]));
                self.candidates.len() - 1
            }
        };
        self.candidates[index].1.extend(phrases);
    }

    /// The candidates grouped by binding, in order of first appearance.
    #[must_use]
    pub fn candidates(&self) -> &[(SymbolBind, Vec<Arc<TargetPhrase>>)] {
        &self.candidates
    }

    /// Total number of candidates over all bindings.
    #[must_use]
    pub fn num_candidates(&self) -> usize {
        self.candidates.iter().map(|(_, phrases)| phrases.len()).sum()
    }

    /// Returns true if no candidate was matched for this span.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.iter().all(|(_, phrases)| phrases.is_empty())
    }
}

/// The input paths of a sentence, one per span, plus the seeded partial
/// matches of every start position.
#[derive(Debug, Default)]
pub struct InputPaths {
    matrix: SpanMatrix<InputPath>,
    seeds: Vec<Vec<ActiveChart>>,
}

impl InputPaths {
    /// Recreates one path per span of a sentence of `size` tokens, reusing
    /// the storage of a previous sentence.
    pub fn init(&mut self, size: usize, num_sources: usize) {
        self.matrix.resize(size, |path| path.reset(Span::default(), 0));
        let spans: Vec<_> = self.matrix.spans().collect();
        for span in spans {
            self.matrix[span].reset(span, num_sources);
        }
        self.seeds.truncate(size);
        for seed in &mut self.seeds {
            seed.iter_mut().for_each(Vec::clear);
            seed.resize_with(num_sources, Vec::new);
        }
        self.seeds.resize_with(size, || vec![Vec::new(); num_sources]);
    }

    /// Number of paths, one per span.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    /// Returns true before initialization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// The seeded partial matches of a source at a start position.
    pub fn seed_mut(&mut self, pos: usize, slot: usize) -> &mut ActiveChart {
        &mut self.seeds[pos][slot]
    }

    /// The partial matches of the source in `slot`, started at `start` and
    /// ending at `end`.  These are the seeds if `start == end`.
    #[must_use]
    pub fn ending_at(&self, start: usize, end: usize, slot: usize) -> &ActiveChart {
        if start == end {
            &self.seeds[start][slot]
        } else {
            self.matrix[Span::new(start, end - start)].active(slot)
        }
    }

    /// Detaches the path of a span so that it can be filled while the other
    /// paths are read.  It must be given back with [`InputPaths::restore`].
    pub fn take(&mut self, span: Span) -> InputPath {
        std::mem::take(&mut self.matrix[span])
    }

    /// Puts back a path detached by [`InputPaths::take`].
    pub fn restore(&mut self, path: InputPath) {
        let span = path.span();
        self.matrix[span] = path;
    }

    /// Iterator through all paths.
    pub fn iter(&self) -> impl Iterator<Item = &InputPath> {
        self.matrix.iter().map(|(_, path)| path)
    }
}

impl std::ops::Index<Span> for InputPaths {
    type Output = InputPath;

    fn index(&self, span: Span) -> &Self::Output {
        &self.matrix[span]
    }
}
