//! A bigram language model read from the ARPA format.
//!
//! Only the unigram and bigram sections are used; higher orders are skipped.
//! Log-probabilities are converted from base 10 to natural logarithms and
//! floored like every other score.

use crate::diag::{Diagnostic, SourceInfo, TextRange};
use crate::util::{floor_score, transform_log10, words_with_offsets, HashMap, LOWEST_SCORE};
use crate::vocab::{Vocab, Word};
use log::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Header,
    Data,
    Order(usize),
    End,
}

/// A backed-off bigram model.
#[derive(Debug, Default, Clone)]
pub struct BigramModel {
    unigrams: HashMap<Word, (f32, f32)>,
    bigrams: HashMap<(Word, Word), f32>,
    unknown: Option<f32>,
}

fn bad(line_start: usize, line: &str, reason: &'static str) -> Diagnostic {
    Diagnostic::BadArpa(TextRange::new(line_start, line_start + line.len()), reason)
}

fn parse_log10(token: &str, line_start: usize, line: &str) -> Result<f32, Diagnostic> {
    token
        .parse::<f32>()
        .map(transform_log10)
        .map_err(|_| bad(line_start, line, "invalid log-probability"))
}

impl BigramModel {
    /// Parses an ARPA file, interning its words.
    pub fn parse(source: &SourceInfo, vocab: &mut Vocab) -> Result<BigramModel, Diagnostic> {
        let mut model = BigramModel::default();
        let mut section = Section::Header;
        let mut seen_unigrams = false;
        let mut offset = 0;
        for line in source.text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('\\') {
                section = match line {
                    "\\data\\" => Section::Data,
                    "\\end\\" => Section::End,
                    _ => {
                        let order = line
                            .strip_prefix('\\')
                            .and_then(|rest| rest.strip_suffix("-grams:"))
                            .and_then(|order| order.parse::<usize>().ok())
                            .filter(|&order| order > 0)
                            .ok_or_else(|| bad(line_start, line, "unknown section"))?;
                        if order > 2 {
                            warn!("Skipping the {order}-grams of {}", source.name);
                        }
                        seen_unigrams |= order == 1;
                        Section::Order(order)
                    }
                };
                continue;
            }
            match section {
                Section::Header | Section::End => {}
                Section::Data => {
                    if !line.starts_with("ngram ") {
                        return Err(bad(line_start, line, "expected an ngram count"));
                    }
                }
                Section::Order(1) => model.parse_unigram(line, line_start, vocab)?,
                Section::Order(2) => model.parse_bigram(line, line_start, vocab)?,
                Section::Order(_) => {}
            }
        }
        if !seen_unigrams {
            return Err(Diagnostic::BadArpa(TextRange::NULL, "missing unigram section"));
        }
        debug!(
            "Loaded {} unigrams and {} bigrams from {}",
            model.unigrams.len(),
            model.bigrams.len(),
            source.name
        );
        Ok(model)
    }

    fn parse_unigram(&mut self, line: &str, line_start: usize, vocab: &mut Vocab) -> Result<(), Diagnostic> {
        let tokens: Vec<_> = words_with_offsets(line).map(|(_, token)| token).collect();
        let (prob, word, backoff) = match tokens[..] {
            [prob, word] => (prob, word, None),
            [prob, word, backoff] => (prob, word, Some(backoff)),
            _ => return Err(bad(line_start, line, "expected a probability, a word and a backoff")),
        };
        let prob = parse_log10(prob, line_start, line)?;
        let backoff = match backoff {
            Some(backoff) => parse_log10(backoff, line_start, line)?,
            None => 0.0,
        };
        if word == "<unk>" {
            self.unknown = Some(prob);
        }
        self.unigrams.insert(vocab.word(word), (prob, backoff));
        Ok(())
    }

    fn parse_bigram(&mut self, line: &str, line_start: usize, vocab: &mut Vocab) -> Result<(), Diagnostic> {
        let tokens: Vec<_> = words_with_offsets(line).map(|(_, token)| token).collect();
        let [prob, first, second, ..] = tokens[..] else {
            return Err(bad(line_start, line, "expected a probability and two words"));
        };
        let prob = parse_log10(prob, line_start, line)?;
        self.bigrams
            .insert((vocab.word(first), vocab.word(second)), prob);
        Ok(())
    }

    /// The log-probability of a word without context.
    #[must_use]
    pub fn unigram(&self, word: Word) -> f32 {
        match self.unigrams.get(&word) {
            Some(&(prob, _)) => prob,
            None => self.unknown.unwrap_or(LOWEST_SCORE),
        }
    }

    /// The log-probability of `word` following `prev`, backing off to the
    /// unigram.
    #[must_use]
    pub fn bigram(&self, prev: Word, word: Word) -> f32 {
        if let Some(&prob) = self.bigrams.get(&(prev, word)) {
            return prob;
        }
        let backoff = self.unigrams.get(&prev).map_or(0.0, |&(_, backoff)| backoff);
        floor_score(backoff + self.unigram(word))
    }

    /// Number of unigrams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.unigrams.len()
    }

    /// Returns true if the model has no unigram.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::BigramModel;
    use crate::diag::{Diagnostic, SourceInfo};
    use crate::vocab::Vocab;
    use assert_matches::assert_matches;
    use std::f32::consts::LN_10;

    const ARPA: &str = "\
\\data\\
ngram 1=3
ngram 2=1

\\1-grams:
-1.0\tx\t-0.5
-0.5\ty
-2.0\t<unk>

\\2-grams:
-0.1\tx\ty

\\end\\
";

    fn parse(text: &str) -> (Result<BigramModel, Diagnostic>, Vocab) {
        let mut vocab = Vocab::new();
        let source = SourceInfo::new("test.arpa".to_owned(), text.into());
        (BigramModel::parse(&source, &mut vocab), vocab)
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn test_probabilities() {
        let (lm, mut vocab) = parse(ARPA);
        let lm = lm.unwrap();
        assert_eq!(lm.len(), 3);
        let (x, y, z) = (vocab.word("x"), vocab.word("y"), vocab.word("z"));
        assert_close(lm.unigram(x), -LN_10);
        assert_close(lm.bigram(x, y), -0.1 * LN_10);
        // backing off through the backoff weight of the context
        assert_close(lm.bigram(x, x), -1.5 * LN_10);
        assert_close(lm.bigram(y, x), -LN_10);
        // unseen words get the probability of <unk>
        assert_close(lm.unigram(z), -2.0 * LN_10);
    }

    #[test]
    fn test_unknown_without_unk() {
        let (lm, mut vocab) = parse("\\data\\\nngram 1=1\n\\1-grams:\n-1.0 x\n\\end\\\n");
        let lm = lm.unwrap();
        assert_eq!(lm.unigram(vocab.word("nowhere")), crate::LOWEST_SCORE);
    }

    #[test]
    fn test_bad_arpa() {
        assert_matches!(parse("\\data\\\nngram 1=1\n").0, Err(Diagnostic::BadArpa(_, _)));
        assert_matches!(
            parse("\\data\\\n\\1-grams:\nabc x\n").0,
            Err(Diagnostic::BadArpa(range, "invalid log-probability")) if range.start == 17
        );
        assert_matches!(parse("\\1-grams:\n-1.0\n").0, Err(Diagnostic::BadArpa(_, _)));
    }
}
