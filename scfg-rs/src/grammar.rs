//! Grammar loads a synchronous context-free grammar from its text form, and
//! matches its rules against the spans of a sentence.
//!
//! The text form has one rule per line:
//!
//! ```text
//! [X] ||| le [X,1] noir ||| the black [X,1] ||| 0.5 0.25
//! ```
//!
//! that is, the left-hand side label, the source side, the target side, and
//! the feature values (probabilities).  Nonterminals carry a co-index linking
//! source and target gaps.  Empty lines and lines starting with `#` are
//! ignored; malformed lines are skipped and reported in
//! [`Grammar::diagnostics`].
//!
//! Rules are stored in a trie over their source symbols.  The trie is the
//! automaton driven by the active chart: a partial match is a trie node, and
//! advancing it over a terminal or a nonterminal is a transition to a child.

use crate::active_chart::{ActiveChart, ActiveEntry, InputPath, SymbolBind};
use crate::diag::{Diagnostic, SourceInfo, TextRange};
use crate::phrase::{SourceSymbol, TargetPhrase, TargetToken};
use crate::rule_source::{MatchContext, RuleSource};
use crate::span::Span;
use crate::util::{split_fields, transform_score, words_with_offsets, HashMap};
use crate::vocab::Vocab;
use log::debug;
use std::fs;
use std::sync::Arc;

/// An index to address [`RuleNode`]'s
type NodeId = u32;

/// The root of every rule trie.
const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct RuleNode {
    children: HashMap<SourceSymbol, NodeId>,
    rules: Vec<Arc<TargetPhrase>>,
}

/// The prefix tree of the source sides of all rules.
#[derive(Debug)]
struct RuleTrie(Vec<RuleNode>);

impl Default for RuleTrie {
    fn default() -> Self {
        RuleTrie(vec![RuleNode::default()])
    }
}

impl RuleTrie {
    /// Retrieves a [`RuleNode`] structure, given its [`NodeId`].
    fn get(&self, node_id: NodeId) -> &RuleNode {
        &self.0[node_id as usize]
    }

    /// The transition from a node over a symbol, if any.
    fn child(&self, node_id: NodeId, symbol: SourceSymbol) -> Option<NodeId> {
        self.get(node_id).children.get(&symbol).copied()
    }

    /// Returns the node reached by `symbols` from the root, creating the
    /// missing nodes on the way.
    fn insert_path(&mut self, symbols: &[SourceSymbol]) -> NodeId {
        let mut node_id = ROOT;
        for &symbol in symbols {
            node_id = match self.child(node_id, symbol) {
                Some(next) => next,
                None => {
                    let next = self.0.len() as NodeId;
                    self.0.push(RuleNode::default());
                    self.0[node_id as usize].children.insert(symbol, next);
                    next
                }
            };
        }
        node_id
    }

    /// Returns the total number of nodes in this trie.
    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Loading parameters of a grammar.
#[derive(Debug, Clone, Default)]
pub struct GrammarConfig {
    /// One weight per feature; all weights default to 1.  When given, this
    /// also fixes the number of features each rule must have.
    pub weights: Option<Vec<f32>>,
    /// Rules only apply to spans of at most this many tokens.
    pub max_span: Option<usize>,
    /// At most this many target phrases are kept per source side, the best
    /// scoring ones.
    pub table_limit: Option<usize>,
}

/// A grammar, used as a rule source by the decoder.
#[derive(Debug)]
pub struct Grammar {
    source: SourceInfo,
    trie: RuleTrie,
    weights: Vec<f32>,
    num_features: Option<usize>,
    max_span: Option<usize>,
    num_rules: usize,
    diagnostics: Vec<Diagnostic>,
}

/// Parses a `[LABEL,INDEX]` nonterminal.
fn parse_nonterminal(token: &str) -> Option<(&str, u8)> {
    let inner = token.strip_prefix('[')?.strip_suffix(']')?;
    let (label, index) = inner.rsplit_once(',')?;
    let index: u8 = index.parse().ok()?;
    (index > 0 && is_valid_label(label)).then_some((label, index))
}

/// Parses a `[LABEL]` left-hand side.
fn parse_lhs(token: &str) -> Option<&str> {
    let label = token.strip_prefix('[')?.strip_suffix(']')?;
    is_valid_label(label).then_some(label)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && !label
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '[' | ']' | ','))
}

impl Grammar {
    fn new(source: SourceInfo, config: &GrammarConfig) -> Self {
        Grammar {
            source,
            trie: RuleTrie::default(),
            weights: config.weights.clone().unwrap_or_default(),
            num_features: config.weights.as_ref().map(Vec::len),
            max_span: config.max_span,
            num_rules: 0,
            diagnostics: vec![],
        }
    }

    /// Parses a grammar from its text form, interning its words and labels.
    pub fn parse(source: SourceInfo, vocab: &mut Vocab, config: &GrammarConfig) -> Grammar {
        let text = source.text.clone();
        let mut grammar = Grammar::new(source, config);
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let content = line.trim_end();
            let trimmed = content.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Err(diag) = grammar.parse_rule(content, line_start, vocab) {
                grammar.diagnostics.push(diag);
            }
        }
        grammar.sort_and_limit(config.table_limit);
        debug!(
            "Loaded {} rules from {}, {} trie nodes, {} diagnostics",
            grammar.num_rules,
            grammar.source.name,
            grammar.trie.len(),
            grammar.diagnostics.len()
        );
        grammar
    }

    /// Reads and parses a grammar file.
    pub fn load(path: &str, vocab: &mut Vocab, config: &GrammarConfig) -> Result<Grammar, Diagnostic> {
        let text = fs::read_to_string(path)?;
        Ok(Grammar::parse(
            SourceInfo::new(path.to_owned(), text.into()),
            vocab,
            config,
        ))
    }

    /// The glue grammar over `label`: the single rule concatenating two
    /// adjacent spans in order, applicable to spans of any length.
    pub fn glue(vocab: &mut Vocab, label: &str) -> Grammar {
        let text = format!("[{label}] ||| [{label},1] [{label},2] ||| [{label},1] [{label},2] ||| 1\n");
        Grammar::parse(
            SourceInfo::new("<glue>".to_owned(), text.into()),
            vocab,
            &GrammarConfig::default(),
        )
    }

    fn parse_rule(&mut self, line: &str, line_start: usize, vocab: &mut Vocab) -> Result<(), Diagnostic> {
        let fields = split_fields(line);
        let field_range =
            |(offset, text): (usize, &str)| TextRange::new(offset, offset + text.len()).offset(line_start);
        if fields.len() < 4 {
            return Err(Diagnostic::BadRuleFormat(TextRange::new(0, line.len()).offset(line_start)));
        }

        let lhs = parse_lhs(fields[0].1).ok_or(Diagnostic::BadNonTerminal(field_range(fields[0])))?;
        let lhs = vocab.label(lhs);

        // source side, remembering the co-index of each gap in source order
        let mut source = vec![];
        let mut gap_indices = vec![];
        for (offset, token) in words_with_offsets(fields[1].1) {
            if token.starts_with('[') {
                let range = TextRange::new(offset, offset + token.len()).offset(line_start + fields[1].0);
                let (label, index) = parse_nonterminal(token).ok_or(Diagnostic::BadNonTerminal(range))?;
                source.push(SourceSymbol::NonTerminal(vocab.label(label)));
                gap_indices.push(index);
            } else {
                source.push(SourceSymbol::Terminal(vocab.word(token)));
            }
        }
        let source_range = field_range(fields[1]);
        match source[..] {
            [] => return Err(Diagnostic::EmptySourceSide(source_range)),
            [SourceSymbol::NonTerminal(_)] => return Err(Diagnostic::UnaryRule(source_range)),
            _ => {}
        }
        if (1..gap_indices.len()).any(|i| gap_indices[..i].contains(&gap_indices[i])) {
            return Err(Diagnostic::GapIndexMismatch(source_range));
        }

        // target side, mapping co-indices to source gap positions
        let target_range = field_range(fields[2]);
        let mut target = vec![];
        let mut seen = vec![false; gap_indices.len()];
        for (offset, token) in words_with_offsets(fields[2].1) {
            if token.starts_with('[') {
                let range = TextRange::new(offset, offset + token.len()).offset(line_start + fields[2].0);
                let (_, index) = parse_nonterminal(token).ok_or(Diagnostic::BadNonTerminal(range))?;
                let position = gap_indices
                    .iter()
                    .position(|&known| known == index)
                    .filter(|&position| !seen[position])
                    .ok_or(Diagnostic::GapIndexMismatch(target_range))?;
                seen[position] = true;
                target.push(TargetToken::Gap(position as u8));
            } else {
                target.push(TargetToken::Word(vocab.word(token)));
            }
        }
        if seen.contains(&false) {
            return Err(Diagnostic::GapIndexMismatch(target_range));
        }

        let mut features = vec![];
        for (offset, token) in words_with_offsets(fields[3].1) {
            let range = TextRange::new(offset, offset + token.len()).offset(line_start + fields[3].0);
            let value = token
                .parse::<f32>()
                .ok()
                .filter(|value| *value >= 0.0)
                .ok_or(Diagnostic::BadScore(range))?;
            features.push(transform_score(value));
        }
        let expected = *self.num_features.get_or_insert(features.len());
        if features.len() != expected {
            return Err(Diagnostic::WrongFeatureCount(
                field_range(fields[3]),
                expected,
                features.len(),
            ));
        }
        let score = features
            .iter()
            .enumerate()
            .map(|(i, value)| self.weights.get(i).copied().unwrap_or(1.0) * value)
            .sum();

        let rule = format!("{} ||| {} ||| {}", fields[0].1, fields[1].1, fields[2].1);
        let phrase = TargetPhrase::new(lhs, target, features, score, rule.into());
        let node_id = self.trie.insert_path(&source);
        self.trie.0[node_id as usize].rules.push(Arc::new(phrase));
        self.num_rules += 1;
        Ok(())
    }

    /// Sorts the target phrases of each source side best first, keeping at
    /// most `limit` of them.  Equal scores keep their file order.
    fn sort_and_limit(&mut self, limit: Option<usize>) {
        for node in &mut self.trie.0 {
            node.rules.sort_by(|a, b| b.score().total_cmp(&a.score()));
            if let Some(limit) = limit {
                node.rules.truncate(limit);
            }
        }
    }

    /// The source this grammar was parsed from.
    #[must_use]
    pub const fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// Number of rules successfully loaded, before the table limit applies.
    #[must_use]
    pub const fn num_rules(&self) -> usize {
        self.num_rules
    }

    /// Number of features of each rule, once known.
    #[must_use]
    pub const fn num_features(&self) -> Option<usize> {
        self.num_features
    }

    /// The longest span rules of this grammar apply to.
    #[must_use]
    pub const fn max_span(&self) -> Option<usize> {
        self.max_span
    }

    /// The problems found in the grammar text; the corresponding lines were
    /// skipped.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The target phrases of a source side, best first.
    #[must_use]
    pub fn rules(&self, source: &[SourceSymbol]) -> &[Arc<TargetPhrase>] {
        let mut node_id = ROOT;
        for &symbol in source {
            match self.trie.child(node_id, symbol) {
                Some(next) => node_id = next,
                None => return &[],
            }
        }
        &self.trie.get(node_id).rules
    }

    /// Advances a partial match over one symbol matched against `span`.
    fn advance(&self, entry: &ActiveEntry, span: Span, symbol: SourceSymbol) -> Option<ActiveEntry> {
        let node = self.trie.child(entry.node, symbol)?;
        Some(ActiveEntry {
            node,
            bind: entry.bind.with(span, symbol),
        })
    }
}

impl RuleSource for Grammar {
    fn name(&self) -> &str {
        &self.source.name
    }

    fn seed_active_chart(&self, chart: &mut ActiveChart) {
        chart.push(ActiveEntry {
            node: ROOT,
            bind: SymbolBind::new(),
        });
    }

    fn match_span(&self, slot: usize, path: &mut InputPath, ctx: &MatchContext<'_>) {
        let span = path.span();
        if self.max_span.is_some_and(|max| span.len() > max) {
            return;
        }
        let (start, end) = (span.start(), span.end());
        let seeds = ctx.paths.ending_at(start, start, slot);
        let mut advanced = vec![];
        // `pos` is where the last symbol of the match starts
        for pos in start..end {
            let last = Span::new(pos, end - pos);
            // partial matches made of a single gap covering the prefix
            let mut lifted = vec![];
            if pos > start {
                let prefix = Span::new(start, pos - start);
                for label in ctx.stacks[prefix].labels() {
                    for seed in seeds {
                        lifted.extend(self.advance(seed, prefix, SourceSymbol::NonTerminal(label)));
                    }
                }
            }
            for entry in ctx.paths.ending_at(start, pos, slot).iter().chain(&lifted) {
                if last.len() == 1 {
                    let word = ctx.sentence.word(pos);
                    advanced.extend(self.advance(entry, last, SourceSymbol::Terminal(word)));
                }
                // a gap never covers the whole span
                if pos > start {
                    for label in ctx.stacks[last].labels() {
                        advanced.extend(self.advance(entry, last, SourceSymbol::NonTerminal(label)));
                    }
                }
            }
        }
        for entry in advanced {
            let node = self.trie.get(entry.node);
            if !node.rules.is_empty() {
                path.add_candidates(&entry.bind, node.rules.iter().cloned());
            }
            if !node.children.is_empty() {
                path.active_mut(slot).push(entry);
            }
        }
    }
}
