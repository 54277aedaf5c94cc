//! The interface between the decoder and the providers of rules.

use crate::active_chart::{ActiveChart, InputPath, InputPaths};
use crate::sentence::Sentence;
use crate::stack::Stacks;
use std::fmt::Debug;

/// What a rule source may read while matching a span: the input, the paths
/// of the spans matched before, and the stacks of the spans decoded before.
#[derive(Clone, Copy, Debug)]
pub struct MatchContext<'a> {
    /// The sentence being decoded.
    pub sentence: &'a Sentence,
    /// All input paths.  The path of the span being matched is detached
    /// while it is matched, and must not be read through this reference.
    pub paths: &'a InputPaths,
    /// All stacks; only those of spans strictly inside the span being matched
    /// are finalized.
    pub stacks: &'a Stacks,
}

/// A provider of matched rules, such as a grammar.
///
/// Rule sources are shared, read-only, between all the sentences decoded
/// in parallel; all per-sentence state lives in the active charts of the
/// input paths.  Each rule source is given a slot index, under which it
/// finds its own active charts.
pub trait RuleSource: Debug + Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Initializes the partial matches starting at one position, before any
    /// span starting there is matched.
    fn seed_active_chart(&self, chart: &mut ActiveChart);

    /// Matches the span of `path`: extends the partial matches of shorter
    /// spans with the same start into `path`'s active chart for `slot`, and
    /// adds the completed matches to `path`'s candidates.
    ///
    /// This is called exactly once per span, for spans of increasing lengths
    /// at each start position, after the sources of lower slots.
    fn match_span(&self, slot: usize, path: &mut InputPath, ctx: &MatchContext<'_>);
}
