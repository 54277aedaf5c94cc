//! Scoring of new hypotheses.

use crate::hypothesis::{Hypothesis, RecombState, Scored};
use crate::lm::BigramModel;
use crate::phrase::{TargetPhrase, TargetToken};
use std::fmt::Debug;

/// Computes the score and recombination state of a candidate, given the
/// hypotheses chosen for its gaps.
///
/// The state must capture everything the scorer will later read from the
/// hypothesis, so that recombining equal states is safe.
pub trait Scorer: Debug + Send + Sync {
    /// Scores `phrase` with `gaps` as its fillers, in source order.
    fn score(&self, phrase: &TargetPhrase, gaps: &[&Hypothesis]) -> Scored;
}

/// A log-linear scorer: the rule score, a word penalty, and optionally a
/// bigram language model.
#[derive(Debug, Default)]
pub struct LinearScorer {
    word_penalty: f32,
    lm: Option<(BigramModel, f32)>,
}

impl LinearScorer {
    /// Creates a scorer without a language model.
    #[must_use]
    pub fn new(word_penalty: f32) -> Self {
        LinearScorer {
            word_penalty,
            lm: None,
        }
    }

    /// Adds a language model, with its weight.
    #[must_use]
    pub fn with_lm(mut self, lm: BigramModel, weight: f32) -> Self {
        self.lm = Some((lm, weight));
        self
    }

    /// Returns true if a language model takes part in scoring.
    #[must_use]
    pub const fn has_lm(&self) -> bool {
        self.lm.is_some()
    }

    /// The language model contribution of a phrase, and the edge words of
    /// its expansion.
    fn lm_delta(lm: &BigramModel, phrase: &TargetPhrase, gaps: &[&Hypothesis]) -> (f32, RecombState) {
        let mut state = RecombState::label_only(phrase.lhs());
        let mut delta = 0.0;
        for token in phrase.target() {
            match *token {
                TargetToken::Word(word) => {
                    delta += match state.right {
                        Some(prev) => lm.bigram(prev, word),
                        None => lm.unigram(word),
                    };
                    state.left.get_or_insert(word);
                    state.right = Some(word);
                }
                TargetToken::Gap(index) => {
                    let gap = gaps[index as usize].state();
                    // an empty gap leaves the context untouched
                    let Some(first) = gap.left else { continue };
                    if let Some(prev) = state.right {
                        delta += lm.bigram(prev, first) - lm.unigram(first);
                    }
                    state.left.get_or_insert(first);
                    state.right = gap.right;
                }
            }
        }
        (delta, state)
    }
}

impl Scorer for LinearScorer {
    fn score(&self, phrase: &TargetPhrase, gaps: &[&Hypothesis]) -> Scored {
        let mut score = phrase.score() + gaps.iter().map(|gap| gap.score()).sum::<f32>();
        score -= self.word_penalty * phrase.num_words() as f32;
        let state = match &self.lm {
            Some((lm, weight)) => {
                let (delta, state) = Self::lm_delta(lm, phrase, gaps);
                score += weight * delta;
                state
            }
            None => RecombState::label_only(phrase.lhs()),
        };
        Scored { score, state }
    }
}
