use crate::active_chart::{ActiveChart, InputPath};
use crate::decoder::{Decoder, DecoderOptions, Model, ModelBuilder};
use crate::diag::{Diagnostic, SourceInfo, TextRange};
use crate::lm::BigramModel;
use crate::manager::Manager;
use crate::rule_source::{MatchContext, RuleSource};
use crate::scorer::LinearScorer;
use crate::span::Span;
use assert_matches::assert_matches;
use std::sync::{Arc, Mutex};

const ABC: &str = "\
[X] ||| a ||| A ||| 1
[X] ||| b ||| B ||| 1
[X] ||| c ||| C ||| 1
";

const ABC_BINARY: &str = "\
[X] ||| a ||| A ||| 1
[X] ||| b ||| B ||| 1
[X] ||| c ||| C ||| 1
[X] ||| [X,1] [X,2] ||| [X,1] [X,2] ||| 0.5
";

fn mkmodel(grammar: &str, options: DecoderOptions) -> Model {
    let mut builder = ModelBuilder::new(options);
    let diags = builder.add_grammar_text("test.grammar", grammar, None);
    assert!(diags.is_empty(), "{diags:?}");
    builder.build()
}

fn assert_close(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-4, "{a} != {b}");
}

/// A rule source matching nothing, which records the spans it is asked to
/// match.
#[derive(Debug, Default)]
struct Recorder {
    visited: Arc<Mutex<Vec<Span>>>,
}

impl RuleSource for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn seed_active_chart(&self, _chart: &mut ActiveChart) {}

    fn match_span(&self, _slot: usize, path: &mut InputPath, ctx: &MatchContext<'_>) {
        let span = path.span();
        // everything strictly inside was finalized before
        for (inner, stack) in ctx.stacks.iter() {
            if span.strictly_contains(inner) {
                assert!(stack.is_finalized(), "{inner} is not done before {span}");
            }
        }
        self.visited.lock().unwrap().push(span);
    }
}

#[test]
fn test_span_traversal() {
    let visited = Arc::default();
    let mut builder = ModelBuilder::new(DecoderOptions::default());
    builder.add_source(Box::new(Recorder {
        visited: Arc::clone(&visited),
    }));
    builder.add_grammar_text("test.grammar", ABC_BINARY, None);
    let model = builder.build();
    let mut manager = Manager::new(&model);
    manager.decode("a b c").unwrap();

    let visited = visited.lock().unwrap();
    let expected: Vec<_> = [(2, 1), (1, 1), (1, 2), (0, 1), (0, 2), (0, 3)]
        .into_iter()
        .map(|(start, len)| Span::new(start, len))
        .collect();
    assert_eq!(*visited, expected);
    assert_eq!(manager.paths().len(), 6);
    assert_eq!(manager.stacks().len(), 6);
    assert_eq!(manager.stats().spans, 6);
}

#[test]
fn test_abc_derivation() {
    let model = mkmodel(ABC_BINARY, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    let translation = manager.decode("a b c").unwrap();
    assert_eq!(translation.text, "A B C");
    assert_close(translation.score, 2.0 * 0.5f32.ln());

    let root = translation.derivation.root().unwrap();
    assert_eq!(root.span, Span::new(0, 3));
    assert_eq!(root.label, "X");
    assert_eq!(root.rule.as_ref(), "[X] ||| [X,1] [X,2] ||| [X,1] [X,2]");
    assert_eq!(translation.derivation.len(), 5);
    // both bracketings of the full span have the same state
    assert!(translation.stats.recombined >= 1);
    assert_eq!(manager.stacks()[Span::new(0, 3)].hypotheses().len(), 1);
}

#[test]
fn test_no_derivation() {
    let model = mkmodel(ABC, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("a b c").unwrap_err(), Diagnostic::NoDerivation);
    for pos in 0..3 {
        assert_eq!(manager.stacks()[Span::new(pos, 1)].hypotheses().len(), 1);
    }
    assert!(manager.stacks()[Span::new(0, 3)].hypotheses().is_empty());
    assert!(manager.best().is_none());
}

#[test]
fn test_single_token() {
    let grammar = "[X] ||| a ||| A ||| 0.5\n[X] ||| a ||| AA ||| 0.25\n";
    let options = DecoderOptions {
        n_best: 5,
        ..DecoderOptions::default()
    };
    let model = mkmodel(grammar, options);
    let mut manager = Manager::new(&model);
    let translation = manager.decode("a").unwrap();
    assert_eq!(translation.text, "A");
    assert_eq!(translation.stats.spans, 1);
    // every candidate became a hypothesis, then they recombined
    assert_eq!(translation.stats.created, 2);
    assert_eq!(translation.stats.recombined, 1);
    let texts: Vec<_> = translation
        .alternatives
        .iter()
        .map(|alt| alt.text.as_str())
        .collect();
    assert_eq!(texts, vec!["A", "AA"]);
    assert_close(translation.alternatives[1].score, 0.25f32.ln());
    let best = manager.best().unwrap();
    assert!(manager.pool().get(best).gaps().is_empty());
}

#[test]
fn test_empty_span_and_unknown_word() {
    let grammar = "\
[X] ||| a ||| A ||| 1
[X] ||| c ||| C ||| 1
[X] ||| a [X,1] c ||| A [X,1] C ||| 0.5
";
    let model = mkmodel(grammar, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    let translation = manager.decode("a zorglub c").unwrap();
    assert_eq!(translation.text, "A zorglub C");
    assert_close(translation.score, 0.5f32.ln() - 100.0);
    // nothing covers the first two words together
    assert!(manager.stacks()[Span::new(0, 2)].hypotheses().is_empty());
    assert!(manager.vocab().base().lookup_word("zorglub").is_none());
    assert!(manager.vocab().is_local(manager.sentence().word(1)));
    assert!(!manager.vocab().is_local(manager.sentence().word(0)));
}

#[test]
fn test_reordering() {
    let grammar = "\
[X] ||| le chat ||| the cat ||| 1
[X] ||| [X,1] noir ||| black [X,1] ||| 0.5
[X] ||| la [X,1] de [X,2] ||| the [X,2] of [X,1] ||| 0.5
[X] ||| maison ||| house ||| 1
[X] ||| pierre ||| stone ||| 1
";
    let model = mkmodel(grammar, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("le chat noir").unwrap().text, "black the cat");
    let translation = manager.decode("la maison de pierre").unwrap();
    assert_eq!(translation.text, "the stone of house");
    assert_eq!(
        translation.derivation.to_string(),
        "(X[0,4) {[X] ||| la [X,1] de [X,2] ||| the [X,2] of [X,1]} \
         (X[1,2) {[X] ||| maison ||| house}) (X[3,4) {[X] ||| pierre ||| stone}))"
    );
}

#[test]
fn test_determinism() {
    let model = mkmodel(ABC_BINARY, DecoderOptions::default());
    let first = Manager::new(&model).decode("a b c a b").unwrap();
    let mut manager = Manager::new(&model);
    for _ in 0..3 {
        let again = manager.decode("a b c a b").unwrap();
        assert_eq!(again.text, first.text);
        assert_eq!(again.score, first.score);
        assert_eq!(again.derivation.to_string(), first.derivation.to_string());
    }
}

#[test]
fn test_manager_reuse() {
    let model = mkmodel(ABC_BINARY, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("c b a").unwrap().text, "C B A");
    assert_matches!(manager.decode(""), Err(Diagnostic::EmptySentence));
    assert_eq!(manager.decode("b").unwrap().text, "B");
    assert_eq!(manager.stacks().len(), 1);
    assert_eq!(manager.pool().len(), 1);
}

#[test]
fn test_input_error_clears_charts() {
    let model = mkmodel(ABC, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("a").unwrap().text, "A");
    assert!(manager.best().is_some());
    assert_matches!(manager.decode(""), Err(Diagnostic::EmptySentence));
    assert!(manager.best().is_none());
    assert!(manager.stacks().is_empty());
    assert!(manager.paths().is_empty());
    assert!(manager.pool().is_empty());
}

#[test]
fn test_input_errors() {
    let model = mkmodel(ABC, DecoderOptions::default());
    let mut manager = Manager::new(&model);
    assert_matches!(manager.decode(" \t "), Err(Diagnostic::EmptySentence));
    assert_eq!(
        manager.decode("a [X] b").unwrap_err(),
        Diagnostic::ReservedToken(TextRange::new(2, 5))
    );
}

#[test]
fn test_pool_exhausted() {
    let options = DecoderOptions {
        max_hypotheses: Some(2),
        ..DecoderOptions::default()
    };
    let model = mkmodel(ABC_BINARY, options);
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("a b c").unwrap_err(), Diagnostic::PoolExhausted(2));
    // the manager is still usable
    assert_eq!(manager.decode("a").unwrap().text, "A");
}

#[test]
fn test_goal_label() {
    let grammar = "\
[X] ||| a ||| A ||| 1
[S] ||| [X,1] c ||| [X,1] C ||| 1
";
    let options = DecoderOptions {
        goal_label: Some("S".to_owned()),
        ..DecoderOptions::default()
    };
    let model = mkmodel(grammar, options);
    let mut manager = Manager::new(&model);
    let translation = manager.decode("a c").unwrap();
    assert_eq!(translation.text, "A C");
    assert_eq!(translation.derivation.root().unwrap().label, "S");
    assert_eq!(manager.decode("a").unwrap_err(), Diagnostic::NoDerivation);
}

#[test]
fn test_glue_grammar() {
    let mut builder = ModelBuilder::new(DecoderOptions::default());
    builder.add_grammar_text("test.grammar", ABC, None);
    builder.add_glue("X");
    let model = builder.build();
    let mut manager = Manager::new(&model);
    let translation = manager.decode("a b c b").unwrap();
    assert_eq!(translation.text, "A B C B");
    assert_close(translation.score, 0.0);
}

#[test]
fn test_bindings_shared_across_sources() {
    let mut builder = ModelBuilder::new(DecoderOptions::default());
    builder.add_grammar_text("test.grammar", ABC_BINARY, None);
    builder.add_glue("X");
    let model = builder.build();
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("a b").unwrap().text, "A B");

    // the binary rule and the glue rule bind the same two sub-spans
    let path = &manager.paths()[Span::new(0, 2)];
    assert_eq!(path.candidates().len(), 1);
    assert_eq!(path.num_candidates(), 2);
    let (bind, _) = &path.candidates()[0];
    assert_eq!(bind.elements().len(), 2);
    let gaps: Vec<_> = bind.gaps().map(|(span, _)| span).collect();
    assert_eq!(gaps, [Span::new(0, 1), Span::new(1, 1)]);
}

#[test]
fn test_max_chart_span() {
    let grammar = "\
[X] ||| a ||| A ||| 1
[X] ||| b ||| B ||| 1
[X] ||| a b ||| AB ||| 1
";
    let options = DecoderOptions {
        max_chart_span: Some(1),
        ..DecoderOptions::default()
    };
    let model = mkmodel(grammar, options.clone());
    let mut manager = Manager::new(&model);
    assert_matches!(manager.decode("a b"), Err(Diagnostic::NoDerivation));
    assert!(manager.paths()[Span::new(0, 2)].is_empty());

    // the glue grammar is not limited
    let mut builder = ModelBuilder::new(options);
    builder.add_grammar_text("test.grammar", grammar, None);
    builder.add_glue("X");
    let model = builder.build();
    let mut manager = Manager::new(&model);
    assert_eq!(manager.decode("a b").unwrap().text, "A B");

    // without the limit the two-word rule applies
    let model = mkmodel(grammar, DecoderOptions::default());
    assert_eq!(Manager::new(&model).decode("a b").unwrap().text, "AB");
}

#[test]
fn test_language_model() {
    let arpa = "\
\\data\\
\\1-grams:
-1.0 x
-0.5 y
\\2-grams:
-0.1 x y
\\end\\
";
    let mut builder = ModelBuilder::new(DecoderOptions::default());
    let lm = BigramModel::parse(
        &SourceInfo::new("test.arpa".to_owned(), arpa.into()),
        builder.vocab_mut(),
    )
    .unwrap();
    let scorer = LinearScorer::new(0.0).with_lm(lm, 1.0);
    assert!(scorer.has_lm());
    assert!(!LinearScorer::new(0.0).has_lm());
    builder.set_scorer(Box::new(scorer));
    builder.add_grammar_text(
        "test.grammar",
        "[X] ||| a ||| x ||| 0.5\n[X] ||| a ||| y ||| 0.5\n[X] ||| b ||| y ||| 0.5\n",
        None,
    );
    builder.add_glue("X");
    let model = builder.build();
    let mut manager = Manager::new(&model);

    // the more likely word wins, and both edges are kept apart
    let translation = manager.decode("a").unwrap();
    assert_eq!(translation.text, "y");
    assert_close(translation.score, 0.5f32.ln() - 0.5 * std::f32::consts::LN_10);
    assert_eq!(manager.stacks()[Span::new(0, 1)].hypotheses().len(), 2);

    // a gap is filled with the best hypothesis of its label only, so the
    // better scoring `x y` is never built
    let translation = manager.decode("a b").unwrap();
    let expected = 2.0 * 0.5f32.ln() + (-1.0 - 0.1) * std::f32::consts::LN_10;
    let y_y = 2.0 * 0.5f32.ln() + (-0.5 - 0.5) * std::f32::consts::LN_10;
    assert!(expected < y_y);
    assert_eq!(translation.text, "y y");
    assert_close(translation.score, y_y);
}

#[test]
fn test_decode_all() {
    let options = DecoderOptions {
        jobs: 3,
        ..DecoderOptions::default()
    };
    let decoder = Decoder::new(mkmodel(ABC_BINARY, options));
    let lines: Vec<String> = ["a b", "", "c", "b a c", "a [X]"]
        .iter()
        .map(|line| (*line).to_owned())
        .collect();
    let results = decoder.decode_all(lines);
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].as_ref().unwrap().text, "A B");
    assert_matches!(results[1], Err(Diagnostic::EmptySentence));
    assert_eq!(results[2].as_ref().unwrap().text, "C");
    assert_eq!(results[3].as_ref().unwrap().text, "B A C");
    assert_matches!(results[4], Err(Diagnostic::ReservedToken(_)));
    assert_eq!(decoder.decode("c a").unwrap().text, "C A");
}
