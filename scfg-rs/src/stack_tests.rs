use crate::diag::Diagnostic;
use crate::hypothesis::{Hypothesis, RecombState, Scored};
use crate::phrase::{TargetPhrase, TargetToken};
use crate::pool::{HypoId, HypoPool};
use crate::span::Span;
use crate::stack::{BeamPolicy, Stack, StackAdd};
use crate::vocab::{Label, Vocab, Word};
use assert_matches::assert_matches;
use std::sync::Arc;
use tinyvec::TinyVec;

struct Fixture {
    vocab: Vocab,
    x: Label,
}

impl Fixture {
    fn new() -> Self {
        let mut vocab = Vocab::new();
        let x = vocab.label("X");
        Fixture { vocab, x }
    }

    fn word(&mut self, text: &str) -> Word {
        self.vocab.word(text)
    }

    fn phrase(&mut self, label: Label, word: &str, gaps: u8) -> Arc<TargetPhrase> {
        let mut target = vec![TargetToken::Word(self.word(word))];
        target.extend((0..gaps).map(TargetToken::Gap));
        Arc::new(TargetPhrase::new(label, target, vec![], 0.0, word.into()))
    }

    /// Allocates a hypothesis whose state is its label and its word.
    fn hypo(&mut self, pool: &mut HypoPool, span: Span, label: Label, word: &str, score: f32) -> HypoId {
        self.hypo_with_gaps(pool, span, label, word, score, &[])
    }

    fn hypo_with_gaps(
        &mut self,
        pool: &mut HypoPool,
        span: Span,
        label: Label,
        word: &str,
        score: f32,
        gaps: &[HypoId],
    ) -> HypoId {
        let phrase = self.phrase(label, word, gaps.len() as u8);
        let state = RecombState {
            label,
            left: None,
            right: Some(self.word(word)),
        };
        let gaps: TinyVec<[HypoId; 2]> = gaps.iter().copied().collect();
        pool.allocate(Hypothesis::new(span, phrase, gaps, Scored { score, state }))
            .unwrap()
    }
}

fn policy(stack_size: usize, keep_arcs: bool) -> BeamPolicy {
    BeamPolicy {
        stack_size,
        threshold: f32::NEG_INFINITY,
        keep_arcs,
    }
}

const SPAN: Span = Span::new(0, 1);

#[test]
fn test_recombination_without_arcs() {
    let mut fx = Fixture::new();
    let (mut pool, mut stack) = (HypoPool::default(), Stack::default());
    let policy = policy(10, false);
    let x = fx.x;
    let first = fx.hypo(&mut pool, SPAN, x, "a", -1.0);
    let second = fx.hypo(&mut pool, SPAN, x, "a", -2.0);
    assert_eq!(stack.add(first, &mut pool, &policy), StackAdd::Added);
    assert_eq!(stack.add(second, &mut pool, &policy), StackAdd::Recombined(first));
    assert!(!pool.contains(second));
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.recombined(), 1);

    let better = fx.hypo(&mut pool, SPAN, x, "a", -0.5);
    assert_eq!(stack.add(better, &mut pool, &policy), StackAdd::Replaced(first));
    assert!(!pool.contains(first));
    stack.finalize(&mut pool, &policy);
    assert_eq!(stack.hypotheses(), &[better]);
}

#[test]
fn test_recombination_keeps_arcs() {
    let mut fx = Fixture::new();
    let (mut pool, mut stack) = (HypoPool::default(), Stack::default());
    let policy = policy(10, true);
    let x = fx.x;
    let worse = fx.hypo(&mut pool, SPAN, x, "a", -2.0);
    let best = fx.hypo(&mut pool, SPAN, x, "a", -1.0);
    let worst = fx.hypo(&mut pool, SPAN, x, "a", -3.0);
    assert!(stack.add(worse, &mut pool, &policy).added());
    assert_eq!(stack.add(best, &mut pool, &policy), StackAdd::Replaced(worse));
    assert_eq!(stack.add(worst, &mut pool, &policy), StackAdd::Recombined(best));
    stack.finalize(&mut pool, &policy);

    // the losers are retired but reachable, and never the best
    assert_eq!(stack.best(), Some(best));
    assert!(pool.is_live(best));
    let arcs = pool.get(best).arcs();
    assert_eq!(arcs, &[worse, worst]);
    for &arc in arcs {
        assert!(pool.contains(arc));
        assert!(!pool.is_live(arc));
    }
}

#[test]
fn test_threshold_pruning() {
    let mut fx = Fixture::new();
    let (mut pool, mut stack) = (HypoPool::default(), Stack::default());
    let policy = BeamPolicy {
        stack_size: 10,
        threshold: -5.0,
        keep_arcs: false,
    };
    let x = fx.x;
    let first = fx.hypo(&mut pool, SPAN, x, "a", -1.0);
    let far = fx.hypo(&mut pool, SPAN, x, "b", -10.0);
    let near = fx.hypo(&mut pool, SPAN, x, "c", -4.0);
    assert_eq!(stack.add(first, &mut pool, &policy), StackAdd::Added);
    assert_eq!(stack.add(far, &mut pool, &policy), StackAdd::Pruned);
    assert_eq!(stack.add(near, &mut pool, &policy), StackAdd::Added);
    assert!(!pool.contains(far));

    // a new best tightens the beam at finalization
    let top = fx.hypo(&mut pool, SPAN, x, "d", 2.0);
    assert_eq!(stack.add(top, &mut pool, &policy), StackAdd::Added);
    stack.finalize(&mut pool, &policy);
    assert_eq!(stack.hypotheses(), &[top, first]);
    assert_eq!(stack.pruned(), 2);
}

#[test]
fn test_stack_size_and_order() {
    let mut fx = Fixture::new();
    let (mut pool, mut stack) = (HypoPool::default(), Stack::default());
    let policy = policy(2, false);
    let x = fx.x;
    let ids: Vec<_> = [("a", -3.0), ("b", -1.0), ("c", -1.0), ("d", -2.0), ("e", -5.0)]
        .into_iter()
        .map(|(word, score)| fx.hypo(&mut pool, SPAN, x, word, score))
        .collect();
    for &id in &ids {
        stack.add(id, &mut pool, &policy);
    }
    // lazily pruned: at most twice the stack size before finalization
    assert!(stack.len() <= 4);
    stack.finalize(&mut pool, &policy);
    // ties are broken by creation order
    assert_eq!(stack.hypotheses(), &[ids[1], ids[2]]);
    assert_eq!(stack.len(), 2);
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_best_with_label() {
    let mut fx = Fixture::new();
    let (mut pool, mut stack) = (HypoPool::default(), Stack::default());
    let policy = policy(10, false);
    let (x, s) = (fx.x, fx.vocab.label("S"));
    let a = fx.hypo(&mut pool, SPAN, x, "a", -1.0);
    let b = fx.hypo(&mut pool, SPAN, s, "b", -3.0);
    let c = fx.hypo(&mut pool, SPAN, s, "c", -2.0);
    for id in [a, b, c] {
        stack.add(id, &mut pool, &policy);
    }
    stack.finalize(&mut pool, &policy);
    assert_eq!(stack.best(), Some(a));
    assert_eq!(stack.best_with_label(x), Some(a));
    assert_eq!(stack.best_with_label(s), Some(c));
    assert_eq!(stack.best_with_label(fx.vocab.label("Y")), None);
    let mut labels: Vec<_> = stack.labels().collect();
    labels.sort();
    let mut expected = vec![x, s];
    expected.sort();
    assert_eq!(labels, expected);
}

#[test]
fn test_pruning_keeps_gap_fillers() {
    let mut fx = Fixture::new();
    let mut pool = HypoPool::default();
    let policy = policy(1, false);
    let x = fx.x;
    let mut small = Stack::default();
    let filler = fx.hypo(&mut pool, SPAN, x, "a", -1.0);
    small.add(filler, &mut pool, &policy);
    small.finalize(&mut pool, &policy);

    let mut big = Stack::default();
    let parent = fx.hypo_with_gaps(&mut pool, Span::new(0, 2), x, "b", -2.0, &[filler]);
    assert_eq!(pool.refs(filler), 1);
    big.add(parent, &mut pool, &policy);

    // the filler is retired but stays alive while its parent refers to it
    pool.retire(filler);
    assert!(pool.contains(filler));
    assert!(!pool.is_live(filler));

    // pruning the parent releases the filler in turn
    let better = fx.hypo(&mut pool, Span::new(0, 2), x, "c", 0.0);
    big.add(better, &mut pool, &policy);
    big.finalize(&mut pool, &policy);
    assert_eq!(big.hypotheses(), &[better]);
    assert!(!pool.contains(parent));
    assert!(!pool.contains(filler));
    assert_eq!(pool.stats().freed, 2);
}

#[test]
fn test_pool_limit_and_recycling() {
    let mut fx = Fixture::new();
    let mut pool = HypoPool::new(Some(2));
    let x = fx.x;
    let a = fx.hypo(&mut pool, SPAN, x, "a", 0.0);
    let _b = fx.hypo(&mut pool, SPAN, x, "b", 0.0);
    let phrase = fx.phrase(x, "c", 0);
    let scored = Scored {
        score: 0.0,
        state: RecombState::label_only(x),
    };
    let hypo = Hypothesis::new(SPAN, phrase, TinyVec::default(), scored);
    assert_matches!(pool.allocate(hypo.clone()), Err(Diagnostic::PoolExhausted(2)));

    pool.retire(a);
    let c = pool.allocate(hypo).unwrap();
    assert_eq!(c.index(), a.index());
    assert_ne!(c, a);
    assert!(!pool.contains(a));
    assert_eq!(pool.stats().recycled, 1);
}

#[test]
fn test_pool_reset() {
    let mut fx = Fixture::new();
    let mut pool = HypoPool::default();
    let x = fx.x;
    let a = fx.hypo(&mut pool, SPAN, x, "a", 0.0);
    pool.reset();
    assert!(!pool.contains(a));
    assert!(pool.is_empty());
    let b = fx.hypo(&mut pool, SPAN, x, "b", 0.0);
    assert!(pool.contains(b));
    assert_eq!(pool.get(b).seq(), 0);
}

#[test]
#[should_panic(expected = "Stale hypothesis handle")]
fn test_stale_handle() {
    let mut fx = Fixture::new();
    let mut pool = HypoPool::default();
    let x = fx.x;
    let a = fx.hypo(&mut pool, SPAN, x, "a", 0.0);
    pool.retire(a);
    let _ = pool.get(a);
}

#[test]
#[should_panic(expected = "before it is finalized")]
fn test_read_unfinalized_stack() {
    let stack = Stack::default();
    let _ = stack.best();
}
