//! The [`ArraySet`] bitset.

use crate::id::ArrayId;

/// A set of array ids backed by a growable bitset.
///
/// The scheduler keeps one per in-flight launch as an O(words) prefilter:
/// two launches whose array sets do not intersect cannot conflict, so the
/// per-requirement range checks are skipped.
#[derive(Clone, Debug, Default)]
pub struct ArraySet {
    words: Vec<u64>,
}

impl ArraySet {
    /// Insert an array id.
    pub fn insert(&mut self, id: ArrayId) {
        let idx = id.0 as usize;
        let word = idx / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (idx % 64);
    }

    /// Whether the two sets share any id.
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }
}
