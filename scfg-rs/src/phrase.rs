//! Target phrases: the matched rule instances a rule source hands to the
//! decoder.

use crate::vocab::{Label, SentenceVocab, Word};
use std::fmt;

/// A symbol of a rule's source side, which is also a transition of the
/// active-chart automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceSymbol {
    /// An input word, matched against exactly one input position.
    Terminal(Word),
    /// A gap, matched against any shorter span holding a hypothesis with
    /// that label.
    NonTerminal(Label),
}

impl Default for SourceSymbol {
    fn default() -> Self {
        SourceSymbol::Terminal(Word::default())
    }
}

/// A symbol of a rule's target side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetToken {
    /// An output word.
    Word(Word),
    /// The translation of the n-th source gap (counting in source order,
    /// from zero).
    Gap(u8),
}

/// The target side of a rule, together with its scores.
///
/// Target phrases are immutable once loaded, and shared between all the
/// sentences decoded with a model.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPhrase {
    lhs: Label,
    target: Vec<TargetToken>,
    features: Vec<f32>,
    score: f32,
    num_words: u32,
    rule: Box<str>,
}

impl TargetPhrase {
    /// Creates a new target phrase.  `score` is the weighted sum of the
    /// features, as computed by the rule source.
    #[must_use]
    pub fn new(
        lhs: Label,
        target: Vec<TargetToken>,
        features: Vec<f32>,
        score: f32,
        rule: Box<str>,
    ) -> Self {
        let num_words = target
            .iter()
            .filter(|token| matches!(token, TargetToken::Word(_)))
            .count() as u32;
        TargetPhrase {
            lhs,
            target,
            features,
            score,
            num_words,
            rule,
        }
    }

    /// The label of the hypotheses built from this phrase.
    #[must_use]
    pub const fn lhs(&self) -> Label {
        self.lhs
    }

    /// The target tokens.
    #[must_use]
    pub fn target(&self) -> &[TargetToken] {
        &self.target
    }

    /// The raw feature values, in natural-log domain.
    #[must_use]
    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// The weighted rule score.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Number of target words, excluding gaps.
    #[must_use]
    pub const fn num_words(&self) -> u32 {
        self.num_words
    }

    /// Number of gaps on the target side.
    #[must_use]
    pub fn num_gaps(&self) -> usize {
        self.target.len() - self.num_words as usize
    }

    /// A human-readable form of the rule, used in derivations.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }
}

/// Display helper printing the target side of a phrase with a vocabulary.
pub struct TargetPhraseRef<'a>(pub &'a TargetPhrase, pub &'a SentenceVocab<'a>);

impl fmt::Display for TargetPhraseRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in self.0.target() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match *token {
                TargetToken::Word(word) => f.write_str(self.1.name(word.0))?,
                TargetToken::Gap(index) => write!(f, "[{}]", index + 1)?,
            }
        }
        Ok(())
    }
}
