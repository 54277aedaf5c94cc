//! Datatypes to represent diagnostics emitted while loading models and
//! decoding sentences.
//!
//! This includes an enum-based representation suited for programmatic
//! interpretation and testing, as well as a rendering to `annotate_snippets`
//! messages which can be used for human-readable output.

use crate::line_cache::LineCache;
use annotate_snippets::{Level, Message, Snippet};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;
use typed_arena::Arena;

/// Semantic type for byte ranges within a source (grammar file, LM file or
/// input sentence).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TextRange {
    /// Index of first byte of the range.
    pub start: u32,
    /// Index one past last byte of the range.
    pub end: u32,
}

impl TextRange {
    /// Coercion from array index pairs.
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> TextRange {
        TextRange {
            start: start as u32,
            end: end as u32,
        }
    }

    /// Returns the null range.
    pub const NULL: TextRange = TextRange::new(0, 0);

    /// Checks for the null range, i.e. zero length at offset zero.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.end == 0
    }

    /// Shifts the range by `offset` bytes.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: usize) -> TextRange {
        TextRange::new(self.start as usize + offset, self.end as usize + offset)
    }

    /// Get the length of the range.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.end as usize - self.start as usize
    }

    /// Returns true if the range is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// A named source text which diagnostics point into.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Name of the source as loaded (a file name, or `input:N` for sentences).
    pub name: String,
    /// Reference to the full source text.
    pub text: Arc<str>,
}

impl SourceInfo {
    /// Creates a new source info.
    #[must_use]
    pub fn new(name: String, text: Arc<str>) -> Self {
        Self { name, text }
    }
}

/// List of all diagnostic codes.  For a description of each, see the source
/// of `build_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Diagnostic {
    BadArpa(TextRange, &'static str),
    BadNonTerminal(TextRange),
    BadRuleFormat(TextRange),
    BadScore(TextRange),
    EmptySentence,
    EmptySourceSide(TextRange),
    GapIndexMismatch(TextRange),
    IoError(String),
    NoDerivation,
    PoolExhausted(usize),
    ReservedToken(TextRange),
    UnaryRule(TextRange),
    WrongFeatureCount(TextRange, usize, usize),
}
use self::Diagnostic::*;

impl From<io::Error> for Diagnostic {
    fn from(err: io::Error) -> Diagnostic {
        IoError(format!("{err}"))
    }
}

/// Annotation info: a global title, then the annotated ranges.
type AnnInfo<'a> = (Cow<'a, str>, Vec<(Level, Cow<'a, str>, TextRange)>);

impl Diagnostic {
    /// The diagnostic's severity.
    ///
    /// Everything is an error except for decode failures, which the caller is
    /// expected to recover from.
    #[must_use]
    pub const fn severity(&self) -> Level {
        match self {
            NoDerivation => Level::Warning,
            _ => Level::Error,
        }
    }

    fn build_info(&self) -> (AnnInfo<'_>, &'static [&'static str]) {
        let level = self.severity();
        let mut notes: &'static [&'static str] = &[];
        let info: AnnInfo<'_> = match self {
            BadArpa(range, message) => ("Malformed ARPA language model".into(), vec![(
                level,
                (*message).into(),
                *range,
            )]),
            BadNonTerminal(range) => {
                notes = &["Nonterminals are written [LABEL,INDEX], with a 1-based index"];
                ("Malformed nonterminal".into(), vec![(
                    level,
                    "Could not parse this as a nonterminal".into(),
                    *range,
                )])
            }
            BadRuleFormat(range) => {
                notes = &["A rule has the form: [LHS] ||| source ||| target ||| scores"];
                ("Malformed rule".into(), vec![(
                    level,
                    "Expected four fields separated by |||".into(),
                    *range,
                )])
            }
            BadScore(range) => ("Bad score".into(), vec![(
                level,
                "Feature values must be non-negative numbers".into(),
                *range,
            )]),
            EmptySentence => ("Empty sentence".into(), vec![(
                level,
                "An input sentence must have at least one token".into(),
                TextRange::NULL,
            )]),
            EmptySourceSide(range) => ("Empty source side".into(), vec![(
                level,
                "A rule must have at least one source symbol".into(),
                *range,
            )]),
            GapIndexMismatch(range) => {
                notes = &["Each source nonterminal index must appear exactly once on the target side"];
                ("Nonterminal indices do not match".into(), vec![(
                    level,
                    "The target side does not use the same nonterminal indices as the source side".into(),
                    *range,
                )])
            }
            IoError(err) => (format!("I/O error: {err}").into(), vec![(
                level,
                "Source file could not be read".into(),
                TextRange::NULL,
            )]),
            NoDerivation => ("No derivation".into(), vec![(
                level,
                "No derivation covers the whole sentence".into(),
                TextRange::NULL,
            )]),
            PoolExhausted(limit) => (format!("Hypothesis limit of {limit} exceeded").into(), vec![(
                level,
                "Decoding of this sentence was abandoned".into(),
                TextRange::NULL,
            )]),
            ReservedToken(range) => ("Reserved token".into(), vec![(
                level,
                "Input tokens may not use the [LABEL] nonterminal syntax".into(),
                *range,
            )]),
            UnaryRule(range) => {
                notes = &["Rules whose source side is a single nonterminal are not supported"];
                ("Unary rule".into(), vec![(
                    level,
                    "This source side is a single nonterminal".into(),
                    *range,
                )])
            }
            WrongFeatureCount(range, expected, found) => ("Wrong number of features".into(), vec![(
                level,
                format!("Expected {expected} feature values, but found {found}").into(),
                *range,
            )]),
        };
        (info, notes)
    }

    /// Creates an `annotate_snippets` message for this diagnostic, pointing
    /// into `source`, and passes it to `f`.
    pub fn to_snippet<T>(
        &self,
        source: &SourceInfo,
        lc: &mut LineCache,
        f: impl for<'a> FnOnce(Message<'a>) -> T,
    ) -> T {
        let ((title, infos), notes) = self.build_info();
        let arena: Arena<String> = Arena::new();
        let text = source.text.as_bytes();
        let mut snippets = vec![];
        let mut level = None;
        let mut bare_labels = vec![];
        for (level2, label, range) in infos {
            level.get_or_insert(level2);
            if range.is_null() || text.is_empty() {
                bare_labels.push(arena.alloc(label.into_owned()).as_str());
                continue;
            }
            let offs = range.start as usize;
            let (line_start, col) = lc.from_offset(text, offs);
            let source_start = offs + 1 - col as usize;
            let source_end = LineCache::line_end(text, range.end as usize);
            let annotation = level2
                .span(offs - source_start..range.end as usize - source_start)
                .label(arena.alloc(label.into_owned()));
            snippets.push(
                Snippet::source(&source.text[source_start..source_end])
                    .line_start(line_start as usize)
                    .origin(source.name.as_str())
                    .fold(true)
                    .annotation(annotation),
            );
        }
        let title = arena.alloc(if bare_labels.is_empty() {
            title.into_owned()
        } else {
            format!("{title} ({}): {}", source.name, bare_labels.join("; "))
        });
        f(level
            .unwrap_or(Level::Error)
            .title(title)
            .snippets(snippets)
            .footers(notes.iter().map(|msg| Level::Note.title(msg))))
    }

    /// Convert a list of diagnostics with their sources to a list of
    /// rendered messages.
    pub fn render_list<T>(
        diags: &[(&SourceInfo, Diagnostic)],
        f: impl for<'a> FnOnce(Message<'a>) -> T + Copy,
    ) -> Vec<T> {
        let mut lc = LineCache::default();
        diags
            .iter()
            .map(move |&(source, ref diag)| diag.to_snippet(source, &mut lc, f))
            .collect::<Vec<_>>()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ((title, infos), _) = self.build_info();
        write!(f, "{title}")?;
        if let Some((_, label, _)) = infos.first() {
            write!(f, ": {label}")?;
        }
        Ok(())
    }
}

impl Error for Diagnostic {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
