//! Input sentences.
//!
//! A sentence is parsed once, from one line of input, into a fixed sequence
//! of interned tokens.  The byte range of each token within the line is kept
//! for diagnostics.

use crate::diag::{Diagnostic, TextRange};
use crate::span::Span;
use crate::util::words_with_offsets;
use crate::vocab::{SentenceVocab, Word};
use std::sync::Arc;

/// A parsed, non-empty input sentence.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    text: Arc<str>,
    words: Vec<Word>,
    ranges: Vec<TextRange>,
}

/// Returns true if the token uses the nonterminal syntax `[...]`.
fn is_reserved(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('[') && token.ends_with(']')
}

impl Sentence {
    /// Tokenizes a line on whitespace, interning its tokens.
    ///
    /// Fails with [`Diagnostic::EmptySentence`] if the line has no token, and
    /// with [`Diagnostic::ReservedToken`] if a token looks like a
    /// nonterminal.  No token is interned on failure.
    pub fn parse(text: &str, vocab: &mut SentenceVocab<'_>) -> Result<Sentence, Diagnostic> {
        let mut tokens = vec![];
        for (offset, token) in words_with_offsets(text) {
            let range = TextRange::new(offset, offset + token.len());
            if is_reserved(token) {
                return Err(Diagnostic::ReservedToken(range));
            }
            tokens.push((token, range));
        }
        if tokens.is_empty() {
            return Err(Diagnostic::EmptySentence);
        }
        let (words, ranges): (Vec<_>, Vec<_>) = tokens
            .into_iter()
            .map(|(token, range)| (vocab.word(token), range))
            .unzip();
        Ok(Sentence {
            text: text.into(),
            words,
            ranges,
        })
    }

    /// Number of tokens in the sentence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Parsed sentences are never empty; this is only true for the default
    /// placeholder.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The token at the given position.
    #[must_use]
    pub fn word(&self, pos: usize) -> Word {
        self.words[pos]
    }

    /// All the tokens.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// A read-only view of the tokens of a span.
    #[must_use]
    pub fn sub_phrase(&self, span: Span) -> &[Word] {
        &self.words[span.start()..span.end()]
    }

    /// The original text of a span, as it appeared in the input line.
    #[must_use]
    pub fn span_text(&self, span: Span) -> &str {
        let start = self.ranges[span.start()].start as usize;
        let end = self.ranges[span.end() - 1].end as usize;
        &self.text[start..end]
    }

    /// The input line this sentence was parsed from.
    #[must_use]
    pub fn text(&self) -> &Arc<str> {
        &self.text
    }
}
