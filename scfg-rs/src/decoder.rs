//! The shared model and the entry points for decoding.
//!
//! A [`Model`] gathers everything that is shared, read-only, between the
//! sentences being decoded: the vocabulary, the rule sources, the scorer and
//! the options.  It is built once with a [`ModelBuilder`], then frozen into
//! a [`Decoder`], which hands a reference to it to one [`Manager`] per
//! worker thread.

use crate::diag::{Diagnostic, SourceInfo};
use crate::executor::Executor;
use crate::grammar::{Grammar, GrammarConfig};
use crate::manager::Manager;
use crate::output::Translation;
use crate::rule_source::RuleSource;
use crate::scorer::{LinearScorer, Scorer};
use crate::stack::BeamPolicy;
use crate::unknown::UnknownWordSource;
use crate::vocab::{Label, Vocab};
use log::debug;
use std::sync::Arc;

/// The decoding options.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Maximum number of hypotheses kept per span.
    pub stack_size: usize,
    /// Hypotheses scoring below the best hypothesis of their span plus this
    /// non-positive margin (natural log) are pruned.
    pub beam_threshold: f32,
    /// Length of the n-best list; 0 disables it, and recombined hypotheses
    /// are then released right away.
    pub n_best: usize,
    /// Maximum number of hypotheses alive at once in a sentence.
    pub max_hypotheses: Option<usize>,
    /// Maximum number of target phrases per source side of a grammar.
    pub table_limit: Option<usize>,
    /// Grammars (except glue grammars) only apply to spans up to this length.
    pub max_chart_span: Option<usize>,
    /// The label translations of the whole sentence must have.
    pub goal_label: Option<String>,
    /// The score of passing an untranslatable word through.
    pub unknown_word_score: f32,
    /// Number of sentences decoded in parallel.
    pub jobs: usize,
    /// Report decoding times.
    pub timing: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        let policy = BeamPolicy::default();
        DecoderOptions {
            stack_size: policy.stack_size,
            beam_threshold: policy.threshold,
            n_best: 0,
            max_hypotheses: None,
            table_limit: Some(20),
            max_chart_span: Some(10),
            goal_label: None,
            unknown_word_score: -100.0,
            jobs: 1,
            timing: false,
        }
    }
}

impl DecoderOptions {
    /// The stack parameters for these options.
    #[must_use]
    pub fn beam_policy(&self) -> BeamPolicy {
        BeamPolicy {
            stack_size: self.stack_size,
            threshold: self.beam_threshold,
            keep_arcs: self.n_best > 0,
        }
    }

    /// The loading parameters of a grammar for these options.
    #[must_use]
    pub fn grammar_config(&self, weights: Option<Vec<f32>>) -> GrammarConfig {
        GrammarConfig {
            weights,
            max_span: self.max_chart_span,
            table_limit: self.table_limit,
        }
    }
}

/// Everything shared between sentence decodes.
#[derive(Debug)]
pub struct Model {
    vocab: Vocab,
    sources: Vec<Box<dyn RuleSource>>,
    scorer: Box<dyn Scorer>,
    goal: Option<Label>,
    options: DecoderOptions,
}

impl Model {
    /// The frozen vocabulary.
    #[must_use]
    pub const fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// The rule sources, in matching order.
    #[must_use]
    pub fn sources(&self) -> &[Box<dyn RuleSource>] {
        &self.sources
    }

    /// The scorer.
    #[must_use]
    pub fn scorer(&self) -> &dyn Scorer {
        &*self.scorer
    }

    /// The goal label, if any.
    #[must_use]
    pub const fn goal(&self) -> Option<Label> {
        self.goal
    }

    /// The options.
    #[must_use]
    pub const fn options(&self) -> &DecoderOptions {
        &self.options
    }
}

/// Assembles a [`Model`].
#[derive(Debug)]
pub struct ModelBuilder {
    vocab: Vocab,
    sources: Vec<Box<dyn RuleSource>>,
    scorer: Option<Box<dyn Scorer>>,
    options: DecoderOptions,
}

impl ModelBuilder {
    /// Starts an empty model.
    #[must_use]
    pub fn new(options: DecoderOptions) -> Self {
        ModelBuilder {
            vocab: Vocab::new(),
            sources: vec![],
            scorer: None,
            options,
        }
    }

    /// The vocabulary, for loading grammars and language models.
    pub fn vocab_mut(&mut self) -> &mut Vocab {
        &mut self.vocab
    }

    /// The options of the model.
    #[must_use]
    pub const fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Parses a grammar from text and adds it as a rule source, returning
    /// the problems found in it.
    pub fn add_grammar_text(&mut self, name: &str, text: &str, weights: Option<Vec<f32>>) -> Vec<Diagnostic> {
        let config = self.options.grammar_config(weights);
        let source = SourceInfo::new(name.to_owned(), text.into());
        let grammar = Grammar::parse(source, &mut self.vocab, &config);
        let diags = grammar.diagnostics().to_vec();
        self.add_source(Box::new(grammar));
        diags
    }

    /// Adds the glue grammar over `label`.
    pub fn add_glue(&mut self, label: &str) {
        let glue = Grammar::glue(&mut self.vocab, label);
        self.add_source(Box::new(glue));
    }

    /// Adds a rule source, matched after the ones added before.
    pub fn add_source(&mut self, source: Box<dyn RuleSource>) {
        debug!("Adding rule source {} in slot {}", source.name(), self.sources.len());
        self.sources.push(source);
    }

    /// Sets the scorer.  The default is a [`LinearScorer`] without word
    /// penalty nor language model.
    pub fn set_scorer(&mut self, scorer: Box<dyn Scorer>) {
        self.scorer = Some(scorer);
    }

    /// Freezes the model.  The unknown-word source is added last, using the
    /// goal label, or `X` if there is none.
    #[must_use]
    pub fn build(mut self) -> Model {
        let goal = self
            .options
            .goal_label
            .as_deref()
            .map(|name| self.vocab.label(name));
        let unknown_label = match goal {
            Some(goal) => goal,
            None => self.vocab.label("X"),
        };
        let unknown = UnknownWordSource::new(unknown_label, self.options.unknown_word_score);
        self.add_source(Box::new(unknown));
        Model {
            vocab: self.vocab,
            sources: self.sources,
            scorer: self
                .scorer
                .unwrap_or_else(|| Box::new(LinearScorer::default())),
            goal,
            options: self.options,
        }
    }
}

/// Decodes sentences with a shared model.
#[derive(Debug)]
pub struct Decoder {
    model: Arc<Model>,
    exec: Executor,
}

impl Decoder {
    /// Creates a decoder, with `options.jobs` workers.
    #[must_use]
    pub fn new(model: Model) -> Self {
        let exec = Executor::new(model.options.jobs);
        Decoder {
            model: Arc::new(model),
            exec,
        }
    }

    /// The shared model.
    #[must_use]
    pub const fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Decodes one sentence on the current thread.
    pub fn decode(&self, text: &str) -> Result<Translation, Diagnostic> {
        Manager::new(&self.model).decode(text)
    }

    /// Decodes many sentences on the workers; results come in input order.
    pub fn decode_all(&self, lines: Vec<String>) -> Vec<Result<Translation, Diagnostic>> {
        if lines.is_empty() {
            return vec![];
        }
        // a few batches per worker, each decoded with one manager
        let batches = self.exec.concurrency().max(1) * 4;
        let batch_size = lines.len().div_ceil(batches);
        let mut lines = lines.into_iter();
        let mut promises = vec![];
        loop {
            let batch: Vec<String> = lines.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let model = self.model.clone();
            promises.push(self.exec.exec(move || {
                let mut manager = Manager::new(&model);
                let results: Vec<_> = batch.iter().map(|line| manager.decode(line)).collect();
                results
            }));
        }
        promises.into_iter().flat_map(|promise| promise.wait()).collect()
    }
}
