//! Support functions that don't belong anywhere else.

use fnv::FnvHasher;
use std::collections;
use std::hash::BuildHasherDefault;

/// Type alias for hashmaps to allow swapping out the implementation.
pub(crate) type HashMap<K, V> = collections::HashMap<K, V, BuildHasherDefault<FnvHasher>>;
/// Type alias for hashsets to allow swapping out the implementation.
pub(crate) type HashSet<K> = collections::HashSet<K, BuildHasherDefault<FnvHasher>>;

/// Natural-log score used for impossible or unknown events.
pub const LOWEST_SCORE: f32 = -100.0;

/// Applies the score floor to a natural-log value.
#[inline]
#[must_use]
pub fn floor_score(score: f32) -> f32 {
    score.max(LOWEST_SCORE)
}

/// Converts a probability into a floored natural-log score.
#[inline]
#[must_use]
pub fn transform_score(prob: f32) -> f32 {
    floor_score(prob.ln())
}

/// Converts a base-10 logarithm, as found in ARPA files, to a natural-log score.
#[inline]
#[must_use]
pub fn transform_log10(value: f32) -> f32 {
    floor_score(value * std::f32::consts::LN_10)
}

/// Splits a line into fields separated by ` ||| `, trimming each field and
/// returning the byte offset of each field within the line.
pub(crate) fn split_fields(line: &str) -> Vec<(usize, &str)> {
    let mut fields = Vec::new();
    let mut offset = 0;
    for part in line.split("|||") {
        let lead = part.len() - part.trim_start().len();
        fields.push((offset + lead, part.trim()));
        offset += part.len() + 3;
    }
    fields
}

/// Iterates over the whitespace-separated words of a string along with their
/// byte offsets.
pub(crate) fn words_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_ascii_whitespace().map(move |word| {
        // `split_ascii_whitespace` yields subslices of `text`
        let offset = word.as_ptr() as usize - text.as_ptr() as usize;
        (offset, word)
    })
}
