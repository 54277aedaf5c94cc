//! Utilities for source-offset/line-number mapping.

use crate::util::HashMap;
use std::convert::TryFrom;

/// An object for efficient repeated byte offset to line conversions.
///
/// The first time a query is made for a given buffer, the offsets of all line
/// starts are recorded.  Subsequent queries binary-search that index.
///
/// Grammar files reported on are usually the size of a phrase table, so the
/// index is built lazily, only for buffers that actually received a
/// diagnostic.  The cache is keyed by buffer address, so it must not outlive
/// the buffers it has been queried against.
#[derive(Default, Debug)]
pub struct LineCache {
    map: HashMap<(usize, usize), Vec<usize>>,
}

fn make_index(buf: &[u8]) -> Vec<usize> {
    let mut out = vec![0];
    out.extend(
        buf.iter()
            .enumerate()
            .filter(|&(_, &ch)| ch == b'\n')
            .map(|(pos, _)| pos + 1),
    );
    out
}

impl LineCache {
    fn get_index(&mut self, buf: &[u8]) -> &Vec<usize> {
        self.map
            .entry((buf.as_ptr() as usize, buf.len()))
            .or_insert_with(|| make_index(buf))
    }

    /// Map a buffer index to a 1-based (line, column) pair.
    /// ## Panics
    /// Panics if the buffer has more than 4G lines or if offset is out of range.
    #[must_use]
    pub fn from_offset(&mut self, buf: &[u8], offset: usize) -> (u32, u32) {
        assert!(offset <= buf.len(), "offset out of range");
        let index = self.get_index(buf);
        let line = match index.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let col = offset - index[line];
        (
            u32::try_from(line + 1).unwrap(),
            u32::try_from(col + 1).unwrap(),
        )
    }

    /// Find the offset just after the end of the line (usually the
    /// location of a '\n', unless we are at the end of the file).
    #[must_use]
    pub fn line_end(buf: &[u8], offset: usize) -> usize {
        buf[offset..]
            .iter()
            .position(|&ch| ch == b'\n')
            .map_or(buf.len(), |pos| offset + pos)
    }
}

#[cfg(test)]
mod tests {
    use super::LineCache;

    #[test]
    fn test_from_offset() {
        let buf = b"one\ntwo\n\nfour";
        let mut lc = LineCache::default();
        assert_eq!(lc.from_offset(buf, 0), (1, 1));
        assert_eq!(lc.from_offset(buf, 2), (1, 3));
        assert_eq!(lc.from_offset(buf, 4), (2, 1));
        assert_eq!(lc.from_offset(buf, 8), (3, 1));
        assert_eq!(lc.from_offset(buf, 11), (4, 3));
        assert_eq!(LineCache::line_end(buf, 4), 7);
        assert_eq!(LineCache::line_end(buf, 10), buf.len());
    }
}
