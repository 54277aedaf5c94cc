//! Decoding results, extracted from the chart into owned values before the
//! hypotheses of a sentence are released.

use crate::hypothesis::Hypothesis;
use crate::phrase::TargetToken;
use crate::pool::{HypoId, HypoPool};
use crate::span::Span;
use crate::tree::{NodeId, Tree};
use crate::util::HashSet;
use crate::vocab::{SentenceVocab, Word};
use itertools::Itertools;
use std::fmt;
use std::time::Duration;

/// One rule application in a derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationNode {
    /// The span covered.
    pub span: Span,
    /// The label of the hypothesis, without brackets.
    pub label: String,
    /// The applied rule.
    pub rule: Box<str>,
    /// The cumulative score of the hypothesis.
    pub score: f32,
}

/// The tree of rule applications of a translation.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    tree: Tree<DerivationNode>,
}

impl Derivation {
    /// The rule applied over the whole sentence.
    #[must_use]
    pub fn root(&self) -> Option<&DerivationNode> {
        self.tree.root().map(|root| &self.tree[root])
    }

    /// All rule applications, children before their parents.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &DerivationNode> + '_ {
        self.tree.iter()
    }

    /// Number of rule applications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true for the derivation of nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    fn fmt_node(&self, node_id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.tree[node_id];
        write!(f, "({}{} {{{}}}", node.label, node.span, node.rule)?;
        for child in self.tree.children_iter(node_id) {
            f.write_str(" ")?;
            self.fmt_node(child, f)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Derivation {
    /// Bracketed form: `(LABEL[start,end) {rule} children...)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tree.root() {
            Some(root) => self.fmt_node(root, f),
            None => f.write_str("()"),
        }
    }
}

/// An entry of the n-best list.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    /// The target text.
    pub text: String,
    /// The score of its best derivation.
    pub score: f32,
}

/// Counters of a sentence decode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeStats {
    /// Number of spans processed.
    pub spans: usize,
    /// Number of candidates matched by the rule sources.
    pub candidates: usize,
    /// Number of hypotheses created.
    pub created: usize,
    /// Number of hypotheses recombined into an equivalent one.
    pub recombined: usize,
    /// Number of hypotheses pruned out of the beam.
    pub pruned: usize,
    /// Number of allocations which reused a slot.
    pub recycled: usize,
    /// Wall time of the decode.
    pub elapsed: Duration,
}

/// The result of decoding one sentence.
#[derive(Debug, Clone)]
pub struct Translation {
    /// The best target text.
    pub text: String,
    /// The score of the best derivation.
    pub score: f32,
    /// The best derivation.
    pub derivation: Derivation,
    /// The n-best list, best first, if requested.
    pub alternatives: Vec<Alternative>,
    /// Decode counters.
    pub stats: DecodeStats,
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Appends the target words of a hypothesis, expanding its gaps.
fn collect_words(pool: &HypoPool, hypo: &Hypothesis, words: &mut Vec<Word>) {
    for token in hypo.phrase().target() {
        match *token {
            TargetToken::Word(word) => words.push(word),
            TargetToken::Gap(index) => collect_words(pool, pool.get(hypo.gaps()[index as usize]), words),
        }
    }
}

/// The target text of a hypothesis.
pub(crate) fn target_text(pool: &HypoPool, vocab: &SentenceVocab<'_>, id: HypoId) -> String {
    let mut words = vec![];
    collect_words(pool, pool.get(id), &mut words);
    words.iter().map(|word| vocab.name(word.0)).join(" ")
}

fn add_derivation(
    pool: &HypoPool,
    vocab: &SentenceVocab<'_>,
    id: HypoId,
    tree: &mut Tree<DerivationNode>,
) -> NodeId {
    let hypo = pool.get(id);
    let children: Vec<NodeId> = hypo
        .gaps()
        .iter()
        .map(|&gap| add_derivation(pool, vocab, gap, tree))
        .collect();
    let node = DerivationNode {
        span: hypo.span(),
        label: vocab.name(hypo.label().0).to_owned(),
        rule: hypo.phrase().rule().into(),
        score: hypo.score(),
    };
    tree.add_node(node, &children)
}

/// The derivation of a hypothesis.
pub(crate) fn derivation(pool: &HypoPool, vocab: &SentenceVocab<'_>, id: HypoId) -> Derivation {
    let mut tree = Tree::default();
    add_derivation(pool, vocab, id, &mut tree);
    Derivation { tree }
}

/// The n-best list among `primaries` and the hypotheses recombined into
/// them, at most `n_best` entries with distinct texts.
pub(crate) fn alternatives(
    pool: &HypoPool,
    vocab: &SentenceVocab<'_>,
    primaries: &[HypoId],
    n_best: usize,
) -> Vec<Alternative> {
    let mut ids: Vec<HypoId> = primaries
        .iter()
        .flat_map(|&id| std::iter::once(id).chain(pool.get(id).arcs().iter().copied()))
        .collect();
    ids.sort_by(|&a, &b| pool.get(a).rank(pool.get(b)));
    let mut seen = HashSet::default();
    let mut list = vec![];
    for id in ids {
        if list.len() >= n_best {
            break;
        }
        let text = target_text(pool, vocab, id);
        if seen.insert(text.clone()) {
            list.push(Alternative {
                text,
                score: pool.get(id).score(),
            });
        }
    }
    list
}
