//! The fallback rule source for words no grammar can translate.

use crate::active_chart::{ActiveChart, InputPath, SymbolBind};
use crate::phrase::{SourceSymbol, TargetPhrase, TargetToken};
use crate::rule_source::{MatchContext, RuleSource};
use crate::vocab::Label;
use log::debug;
use std::sync::Arc;

/// Copies an input token to the output when nothing else matched it.
///
/// This source must be registered after all the others: it only produces a
/// candidate for single-token spans which have received none so far.
#[derive(Debug, Clone)]
pub struct UnknownWordSource {
    label: Label,
    score: f32,
}

impl UnknownWordSource {
    /// Creates a source producing pass-through phrases with the given label
    /// and score.
    #[must_use]
    pub const fn new(label: Label, score: f32) -> Self {
        UnknownWordSource { label, score }
    }

    /// The label of the pass-through phrases.
    #[must_use]
    pub const fn label(&self) -> Label {
        self.label
    }
}

impl RuleSource for UnknownWordSource {
    fn name(&self) -> &str {
        "<unknown>"
    }

    fn seed_active_chart(&self, _chart: &mut ActiveChart) {}

    fn match_span(&self, _slot: usize, path: &mut InputPath, ctx: &MatchContext<'_>) {
        let span = path.span();
        if span.len() != 1 || !path.is_empty() {
            return;
        }
        let word = ctx.sentence.word(span.start());
        let text = ctx.sentence.span_text(span);
        debug!("Passing through unknown word {text:?} at {span}");
        let phrase = TargetPhrase::new(
            self.label,
            vec![TargetToken::Word(word)],
            vec![],
            self.score,
            format!("<unknown> ||| {text} ||| {text}").into(),
        );
        let bind = SymbolBind::new().with(span, SourceSymbol::Terminal(word));
        path.add_candidates(&bind, [Arc::new(phrase)]);
    }
}
