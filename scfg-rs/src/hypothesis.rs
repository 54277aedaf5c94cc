//! Hypotheses: scored partial derivations covering one span.

use crate::phrase::TargetPhrase;
use crate::pool::HypoId;
use crate::span::Span;
use crate::vocab::{Label, Word};
use std::cmp::Ordering;
use std::sync::Arc;
use tinyvec::TinyVec;

/// Everything about a hypothesis that can influence how it is extended.
///
/// Two hypotheses of the same span with equal states are indistinguishable
/// to any larger derivation, so only the better one needs to be extended.
/// The edge words are only filled in by scorers with a language model; when
/// they are `None` the label alone decides recombination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecombState {
    /// The left-hand side label of the hypothesis' rule.
    pub label: Label,
    /// The first target word, if it is relevant for scoring.
    pub left: Option<Word>,
    /// The last target word, if it is relevant for scoring.
    pub right: Option<Word>,
}

impl RecombState {
    /// A state that recombines on the label only.
    #[must_use]
    pub const fn label_only(label: Label) -> Self {
        RecombState {
            label,
            left: None,
            right: None,
        }
    }
}

/// The result of scoring a candidate with its gap fillers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scored {
    /// The cumulative score, including the gap fillers' scores.
    pub score: f32,
    /// The recombination state of the new hypothesis.
    pub state: RecombState,
}

/// A derivation covering one span: a target phrase, one hypothesis of a
/// smaller span for each of its gaps, and the resulting score.
///
/// Gap fillers and arcs are handles into the sentence's [`crate::pool::HypoPool`];
/// they are only valid for the sentence being decoded.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    span: Span,
    phrase: Arc<TargetPhrase>,
    gaps: TinyVec<[HypoId; 2]>,
    score: f32,
    state: RecombState,
    pub(crate) arcs: Vec<HypoId>,
    pub(crate) seq: u32,
}

impl Hypothesis {
    /// Creates a hypothesis; `gaps` are given in source order.
    #[must_use]
    pub fn new(
        span: Span,
        phrase: Arc<TargetPhrase>,
        gaps: TinyVec<[HypoId; 2]>,
        scored: Scored,
    ) -> Self {
        debug_assert_eq!(gaps.len(), phrase.num_gaps());
        Hypothesis {
            span,
            phrase,
            gaps,
            score: scored.score,
            state: scored.state,
            arcs: vec![],
            seq: 0,
        }
    }

    /// The span covered.
    #[must_use]
    pub const fn span(&self) -> Span {
        self.span
    }

    /// The target phrase applied at the top of this derivation.
    #[must_use]
    pub fn phrase(&self) -> &Arc<TargetPhrase> {
        &self.phrase
    }

    /// The label of this hypothesis.
    #[must_use]
    pub const fn label(&self) -> Label {
        self.state.label
    }

    /// The gap fillers, in source order.
    #[must_use]
    pub fn gaps(&self) -> &[HypoId] {
        &self.gaps
    }

    /// The cumulative score.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// The recombination state.
    #[must_use]
    pub const fn state(&self) -> &RecombState {
        &self.state
    }

    /// The hypotheses which were recombined into this one, if arc lists are
    /// kept.  They share this hypothesis' state but have lower scores.
    #[must_use]
    pub fn arcs(&self) -> &[HypoId] {
        &self.arcs
    }

    /// Creation order within the sentence, used to break score ties.
    #[must_use]
    pub const fn seq(&self) -> u32 {
        self.seq
    }

    /// Orders hypotheses best first: by decreasing score, then by creation
    /// order.
    #[must_use]
    pub fn rank(&self, other: &Hypothesis) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.seq.cmp(&other.seq))
    }
}
