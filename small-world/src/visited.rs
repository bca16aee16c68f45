//! Dense per-search visited-set, sized to the arena and cleared in O(touched words) instead of
//! O(capacity).

use crate::types::NodeId;

const WORD_BITS: usize = u64::BITS as usize;

/// Scratch visited-set owned by a single [`crate::search::LayerSearcher`] instance and reused
/// across calls. Never reallocated mid-search; `reserve` grows it when the arena grows.
#[derive(Debug, Default)]
pub struct VisitedBitSet {
    words: Vec<u64>,
    /// Indices into `words` touched since the last `clear`, so `clear` only has to zero those.
    dirty: Vec<usize>,
}

impl VisitedBitSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut set = Self::default();
        set.reserve(capacity);
        set
    }

    /// Grow backing storage so ids up to `capacity` (exclusive) can be recorded.
    pub fn reserve(&mut self, capacity: usize) {
        let words_needed = (capacity + WORD_BITS - 1) / WORD_BITS;
        if words_needed > self.words.len() {
            self.words.resize(words_needed, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was newly inserted (i.e. not already
    /// visited).
    pub fn insert(&mut self, id: NodeId) -> bool {
        let idx = usize::from(id);
        self.reserve(idx + 1);
        let word = idx / WORD_BITS;
        let bit = 1u64 << (idx % WORD_BITS);
        let was_dirty = self.words[word] != 0;
        let newly_visited = self.words[word] & bit == 0;
        self.words[word] |= bit;
        if !was_dirty {
            self.dirty.push(word);
        }
        newly_visited
    }

    pub fn contains(&self, id: NodeId) -> bool {
        let idx = usize::from(id);
        let word = idx / WORD_BITS;
        match self.words.get(word) {
            Some(w) => w & (1u64 << (idx % WORD_BITS)) != 0,
            None => false,
        }
    }

    /// Clear only the words touched since the last clear.
    pub fn clear(&mut self) {
        for word in self.dirty.drain(..) {
            self.words[word] = 0;
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            self.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut v = VisitedBitSet::with_capacity(8);
        assert!(!v.contains(NodeId(3)));
        assert!(v.insert(NodeId(3)));
        assert!(v.contains(NodeId(3)));
        assert!(!v.insert(NodeId(3)));
    }

    #[test]
    fn clear_only_touches_dirty_words() {
        let mut v = VisitedBitSet::with_capacity(256);
        v.insert(NodeId(5));
        v.insert(NodeId(200));
        v.clear();
        assert!(!v.contains(NodeId(5)));
        assert!(!v.contains(NodeId(200)));
        assert!(v.dirty.is_empty());
    }

    #[test]
    fn grows_beyond_initial_capacity() {
        let mut v = VisitedBitSet::with_capacity(1);
        v.insert(NodeId(1000));
        assert!(v.contains(NodeId(1000)));
    }
}
