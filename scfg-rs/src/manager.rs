//! The chart decoding loop for one sentence.
//!
//! The [`Manager`] visits every span of the sentence so that a span is
//! always processed after all the spans it strictly contains: start
//! positions from the last one down to the first, and for each start
//! position, lengths in increasing order.  Processing a span is done in two
//! phases:
//!
//! 1. _Matching_: each rule source, in registration order, extends its
//!    partial matches into the span's input path, and records the matched
//!    target phrases, grouped by symbol binding.
//! 2. _Synthesis_: for each binding, every gap is filled with the best
//!    hypothesis of the gap's label in the sub-span's stack, and each of the
//!    binding's target phrases is scored, allocated, and submitted to the
//!    span's stack.  The stack is then finalized.
//!
//! A binding with a gap that has no hypothesis of the right label is
//! skipped; a span without candidates simply ends up with an empty stack.
//! The sentence fails only if the whole-sentence stack ends up empty.
//!
//! A manager keeps its charts and its pool between sentences, so that a
//! worker decoding many sentences reuses the same storage.

use crate::active_chart::{InputPath, InputPaths};
use crate::decoder::Model;
use crate::diag::Diagnostic;
use crate::hypothesis::{Hypothesis, Scored};
use crate::output::{self, DecodeStats, Translation};
use crate::phrase::TargetPhraseRef;
use crate::pool::{HypoId, HypoPool};
use crate::rule_source::MatchContext;
use crate::sentence::Sentence;
use crate::span::Span;
use crate::stack::{BeamPolicy, Stacks};
use crate::vocab::{Label, LabelRef, SentenceVocab};
use log::{debug, trace};
use std::sync::Arc;
use std::time::Instant;
use tinyvec::TinyVec;

/// The decoder of one sentence at a time.
#[derive(Debug)]
pub struct Manager<'a> {
    model: &'a Model,
    vocab: SentenceVocab<'a>,
    sentence: Sentence,
    paths: InputPaths,
    stacks: Stacks,
    pool: HypoPool,
    policy: BeamPolicy,
    stats: DecodeStats,
}

impl<'a> Manager<'a> {
    /// Creates a manager for a model.
    #[must_use]
    pub fn new(model: &'a Model) -> Self {
        Manager {
            model,
            vocab: SentenceVocab::new(model.vocab()),
            sentence: Sentence::default(),
            paths: InputPaths::default(),
            stacks: Stacks::default(),
            pool: HypoPool::new(model.options().max_hypotheses),
            policy: model.options().beam_policy(),
            stats: DecodeStats::default(),
        }
    }

    /// Decodes one sentence.
    ///
    /// All hypotheses and charts of the previous sentence are released
    /// first, even if the new sentence cannot be parsed.
    pub fn decode(&mut self, text: &str) -> Result<Translation, Diagnostic> {
        let timer = Instant::now();
        self.pool.reset();
        self.vocab.reset();
        self.stats = DecodeStats::default();
        self.sentence = match Sentence::parse(text, &mut self.vocab) {
            Ok(sentence) => sentence,
            Err(diag) => {
                self.sentence = Sentence::default();
                self.paths.init(0, 0);
                self.stacks.init(0);
                return Err(diag);
            }
        };

        let size = self.sentence.len();
        let model = self.model;
        let sources = model.sources();
        self.paths.init(size, sources.len());
        self.stacks.init(size);
        debug!("Decoding {size} tokens over {} spans", self.paths.len());

        for start in (0..size).rev() {
            for (slot, source) in sources.iter().enumerate() {
                source.seed_active_chart(self.paths.seed_mut(start, slot));
            }
            for len in 1..=size - start {
                self.process_span(Span::new(start, len))?;
            }
        }

        let full = Span::new(0, size);
        self.collect_stats();
        self.stats.elapsed = timer.elapsed();
        let best = self.best().ok_or(Diagnostic::NoDerivation)?;

        let stack = &self.stacks[full];
        let primaries: Vec<HypoId> = match model.goal() {
            Some(goal) => stack
                .hypotheses()
                .iter()
                .copied()
                .filter(|&id| self.pool.get(id).label() == goal)
                .collect(),
            None => stack.hypotheses().to_vec(),
        };
        let n_best = model.options().n_best;
        Ok(Translation {
            text: output::target_text(&self.pool, &self.vocab, best),
            score: self.pool.get(best).score(),
            derivation: output::derivation(&self.pool, &self.vocab, best),
            alternatives: output::alternatives(&self.pool, &self.vocab, &primaries, n_best),
            stats: self.stats,
        })
    }

    /// Matches then synthesizes one span.
    fn process_span(&mut self, span: Span) -> Result<(), Diagnostic> {
        let model = self.model;
        let mut path = self.paths.take(span);
        let ctx = MatchContext {
            sentence: &self.sentence,
            paths: &self.paths,
            stacks: &self.stacks,
        };
        for (slot, source) in model.sources().iter().enumerate() {
            source.match_span(slot, &mut path, &ctx);
        }
        let result = self.synthesize(span, &path);
        self.stats.spans += 1;
        self.stats.candidates += path.num_candidates();
        self.paths.restore(path);
        result?;

        let stack = self.stacks.stack_mut(span);
        stack.finalize(&mut self.pool, &self.policy);
        debug!(
            "Span {span}: {} hypotheses, {} recombined, {} pruned",
            stack.hypotheses().len(),
            stack.recombined(),
            stack.pruned()
        );
        Ok(())
    }

    /// Builds the hypotheses of a span from its matched candidates.
    fn synthesize(&mut self, span: Span, path: &InputPath) -> Result<(), Diagnostic> {
        for (bind, phrases) in path.candidates() {
            let gaps: Result<TinyVec<[HypoId; 2]>, (Span, Label)> = bind
                .gaps()
                .map(|(sub_span, label)| {
                    self.stacks[sub_span]
                        .best_with_label(label)
                        .ok_or((sub_span, label))
                })
                .collect();
            let gaps = match gaps {
                Ok(gaps) => gaps,
                Err((sub_span, label)) => {
                    trace!("  No {} filler in {sub_span}", LabelRef(&self.vocab, label));
                    continue;
                }
            };
            let scored: Vec<Scored> = {
                let fillers: Vec<&Hypothesis> = gaps.iter().map(|&id| self.pool.get(id)).collect();
                phrases
                    .iter()
                    .map(|phrase| self.model.scorer().score(phrase, &fillers))
                    .collect()
            };
            for (phrase, scored) in phrases.iter().zip(scored) {
                let hypo = Hypothesis::new(span, Arc::clone(phrase), gaps.clone(), scored);
                let id = self.pool.allocate(hypo)?;
                let outcome = self.stacks.stack_mut(span).add(id, &mut self.pool, &self.policy);
                trace!(
                    "  {span} {} {} -> {outcome:?}",
                    LabelRef(&self.vocab, phrase.lhs()),
                    TargetPhraseRef(phrase, &self.vocab)
                );
            }
        }
        Ok(())
    }

    fn collect_stats(&mut self) {
        let pool = self.pool.stats();
        self.stats.created = pool.allocated;
        self.stats.recycled = pool.recycled;
        for (_, stack) in self.stacks.iter() {
            self.stats.recombined += stack.recombined();
            self.stats.pruned += stack.pruned();
        }
    }

    /// The best hypothesis of the whole sentence, with the goal label if the
    /// model has one.
    #[must_use]
    pub fn best(&self) -> Option<HypoId> {
        if self.stacks.is_empty() {
            return None;
        }
        let stack = &self.stacks[Span::new(0, self.sentence.len())];
        if !stack.is_finalized() {
            return None;
        }
        match self.model.goal() {
            Some(goal) => stack.best_with_label(goal),
            None => stack.best(),
        }
    }

    /// The goal label of the model, if any.
    #[must_use]
    pub fn goal(&self) -> Option<Label> {
        self.model.goal()
    }

    /// The sentence being decoded.
    #[must_use]
    pub const fn sentence(&self) -> &Sentence {
        &self.sentence
    }

    /// The vocabulary of the sentence being decoded.
    #[must_use]
    pub const fn vocab(&self) -> &SentenceVocab<'a> {
        &self.vocab
    }

    /// The stacks of the last sentence decoded.
    #[must_use]
    pub const fn stacks(&self) -> &Stacks {
        &self.stacks
    }

    /// The input paths of the last sentence decoded.
    #[must_use]
    pub const fn paths(&self) -> &InputPaths {
        &self.paths
    }

    /// The hypotheses of the last sentence decoded.
    #[must_use]
    pub const fn pool(&self) -> &HypoPool {
        &self.pool
    }

    /// Counters of the last sentence decoded.
    #[must_use]
    pub const fn stats(&self) -> &DecodeStats {
        &self.stats
    }
}
