//! Chart cells: the beam of hypotheses of one span.
//!
//! A stack admits hypotheses while its span is being decoded, recombining
//! those with equal states and pruning those which fall out of the beam.
//! Once the span is done the stack is finalized: its survivors are sorted
//! and indexed by label, and it becomes read-only.

use crate::hypothesis::RecombState;
use crate::pool::{HypoId, HypoPool};
use crate::span::{Span, SpanMatrix};
use crate::util::HashMap;
use crate::vocab::Label;
use log::trace;
use std::collections::hash_map::Entry;
use std::ops::Index;

/// The pruning and recombination parameters of a stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamPolicy {
    /// Maximum number of hypotheses kept in a finalized stack.
    pub stack_size: usize,
    /// Hypotheses scoring less than the best one plus this (non-positive)
    /// natural-log margin are pruned.  `f32::NEG_INFINITY` disables it.
    pub threshold: f32,
    /// Keep recombined hypotheses on arc lists, for n-best extraction.
    pub keep_arcs: bool,
}

impl Default for BeamPolicy {
    fn default() -> Self {
        BeamPolicy {
            stack_size: 100,
            threshold: 1e-5f32.ln(),
            keep_arcs: false,
        }
    }
}

/// The outcome of [`Stack::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackAdd {
    /// The hypothesis became a new entry.
    Added,
    /// The hypothesis took the place of this worse hypothesis with the same
    /// state.
    Replaced(HypoId),
    /// The hypothesis was recombined into this better entry with the same
    /// state.
    Recombined(HypoId),
    /// The hypothesis fell out of the beam.
    Pruned,
}

impl StackAdd {
    /// Returns true if the hypothesis entered the beam.
    #[must_use]
    pub const fn added(self) -> bool {
        matches!(self, StackAdd::Added | StackAdd::Replaced(_))
    }
}

/// The hypotheses of one span.
#[derive(Debug)]
pub struct Stack {
    by_state: HashMap<RecombState, HypoId>,
    best: f32,
    sorted: Vec<HypoId>,
    labels: Vec<(Label, HypoId)>,
    finalized: bool,
    pruned: usize,
    recombined: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Stack {
            by_state: HashMap::default(),
            best: f32::NEG_INFINITY,
            sorted: vec![],
            labels: vec![],
            finalized: false,
            pruned: 0,
            recombined: 0,
        }
    }
}

impl Stack {
    /// Empties the stack for a new sentence, keeping its storage.
    pub fn reset(&mut self) {
        self.by_state.clear();
        self.best = f32::NEG_INFINITY;
        self.sorted.clear();
        self.labels.clear();
        self.finalized = false;
        self.pruned = 0;
        self.recombined = 0;
    }

    /// Submits a live hypothesis.  Whatever does not end up in the stack is
    /// retired to the pool.
    pub fn add(&mut self, id: HypoId, pool: &mut HypoPool, policy: &BeamPolicy) -> StackAdd {
        assert!(!self.finalized, "Cannot add to a finalized stack!");
        let hypo = pool.get(id);
        let (score, state) = (hypo.score(), *hypo.state());
        if score < self.best + policy.threshold {
            trace!("   PRUNE {score} (best {})", self.best);
            pool.retire(id);
            self.pruned += 1;
            return StackAdd::Pruned;
        }
        let outcome = match self.by_state.entry(state) {
            Entry::Vacant(e) => {
                e.insert(id);
                StackAdd::Added
            }
            Entry::Occupied(mut e) => {
                let existing = *e.get();
                self.recombined += 1;
                if score > pool.get(existing).score() {
                    e.insert(id);
                    if policy.keep_arcs {
                        pool.add_arc(id, existing);
                    }
                    pool.retire(existing);
                    StackAdd::Replaced(existing)
                } else {
                    if policy.keep_arcs {
                        pool.add_arc(existing, id);
                    }
                    pool.retire(id);
                    return StackAdd::Recombined(existing);
                }
            }
        };
        self.best = self.best.max(score);
        // prune lazily, once the stack grows to twice its size
        if self.by_state.len() > policy.stack_size.saturating_mul(2) {
            self.prune(pool, policy);
            if !pool.contains(id) {
                return StackAdd::Pruned;
            }
        }
        outcome
    }

    /// Prunes the stack down to its beam, and returns the survivors best
    /// first.
    fn prune(&mut self, pool: &mut HypoPool, policy: &BeamPolicy) -> Vec<HypoId> {
        let mut entries: Vec<HypoId> = self.by_state.values().copied().collect();
        entries.sort_by(|&a, &b| pool.get(a).rank(pool.get(b)));
        let cutoff = self.best + policy.threshold;
        let mut kept = Vec::with_capacity(entries.len().min(policy.stack_size));
        for (rank, id) in entries.into_iter().enumerate() {
            let hypo = pool.get(id);
            if rank < policy.stack_size && hypo.score() >= cutoff {
                kept.push(id);
            } else {
                let state = *hypo.state();
                self.by_state.remove(&state);
                pool.retire(id);
                self.pruned += 1;
            }
        }
        kept
    }

    /// Prunes the stack to its final size and freezes it.
    pub fn finalize(&mut self, pool: &mut HypoPool, policy: &BeamPolicy) {
        assert!(!self.finalized, "Stack finalized twice!");
        self.sorted = self.prune(pool, policy);
        self.labels.clear();
        for &id in &self.sorted {
            let label = pool.get(id).label();
            if !self.labels.iter().any(|&(known, _)| known == label) {
                self.labels.push((label, id));
            }
        }
        self.labels.sort_by_key(|&(label, _)| label);
        self.finalized = true;
    }

    /// Returns true once the stack's span has been decoded.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Checks the stack may be read.
    #[inline]
    fn check_finalized(&self) {
        assert!(self.finalized, "Cannot read a stack before it is finalized!");
    }

    /// The surviving hypotheses, best first.
    #[must_use]
    pub fn hypotheses(&self) -> &[HypoId] {
        self.check_finalized();
        &self.sorted
    }

    /// The best hypothesis, if any.
    #[must_use]
    pub fn best(&self) -> Option<HypoId> {
        self.hypotheses().first().copied()
    }

    /// The best hypothesis with the given label, if any.
    #[must_use]
    pub fn best_with_label(&self, label: Label) -> Option<HypoId> {
        self.check_finalized();
        self.labels
            .binary_search_by_key(&label, |&(known, _)| known)
            .ok()
            .map(|index| self.labels[index].1)
    }

    /// The labels of the surviving hypotheses, in label order.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.check_finalized();
        self.labels.iter().map(|&(label, _)| label)
    }

    /// Number of entries currently in the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_state.len()
    }

    /// Returns true if the stack has no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_state.is_empty()
    }

    /// Number of hypotheses pruned from this stack.
    #[must_use]
    pub const fn pruned(&self) -> usize {
        self.pruned
    }

    /// Number of recombinations performed in this stack.
    #[must_use]
    pub const fn recombined(&self) -> usize {
        self.recombined
    }
}

/// The stacks of a sentence, one per span.
#[derive(Debug, Default)]
pub struct Stacks(SpanMatrix<Stack>);

impl Stacks {
    /// Recreates one empty stack per span of a sentence of `size` tokens.
    pub fn init(&mut self, size: usize) {
        self.0.resize(size, Stack::reset);
    }

    /// Mutable access to the stack of a span.
    pub fn stack_mut(&mut self, span: Span) -> &mut Stack {
        &mut self.0[span]
    }

    /// Iterator through all stacks.
    pub fn iter(&self) -> impl Iterator<Item = (Span, &Stack)> {
        self.0.iter()
    }

    /// Number of stacks, one per span.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true before initialization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<Span> for Stacks {
    type Output = Stack;

    fn index(&self, span: Span) -> &Self::Output {
        &self.0[span]
    }
}
