//! A chart decoder for synchronous context-free grammars.
//!
//! A sentence is translated bottom-up over all of its spans: rule sources
//! (grammars) match their rules against each span, the matched rules are
//! combined with the best hypotheses of the sub-spans, and the resulting
//! hypotheses are recombined and pruned in one stack per span.  The entry
//! point is the [`decoder`] module; the decoding loop itself is in
//! [`manager`].

pub use fnv;

mod tree;
mod util;

pub mod active_chart;
pub mod decoder;
pub mod diag;
pub mod executor;
pub mod grammar;
pub mod hypothesis;
pub mod line_cache;
pub mod lm;
pub mod manager;
pub mod output;
pub mod phrase;
pub mod pool;
pub mod rule_source;
pub mod scorer;
pub mod sentence;
pub mod span;
pub mod stack;
pub mod unknown;
pub mod vocab;

pub use decoder::{Decoder, DecoderOptions, Model, ModelBuilder};
pub use diag::{Diagnostic, SourceInfo};
pub use output::Translation;
pub use util::{floor_score, transform_score, LOWEST_SCORE};



#[cfg(test)]
mod stack_tests;

#[cfg(test)]
mod manager_tests;
