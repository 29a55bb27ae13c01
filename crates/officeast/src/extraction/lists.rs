//! Outline-numbering counters.
//!
//! Lists in both Word and ODF are positional: the source stores the nesting
//! level of each item but not its ordinal. Counters are kept per list id and per
//! level. An item at level `n` discards every counter deeper than `n`, so the next
//! deeper item starts again at 0. Different list ids never affect each other.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct ListCounters {
    counters: HashMap<String, BTreeMap<usize, usize>>,
}

impl ListCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0-based index of the next item at `level` in `list_id`.
    pub fn next_index(&mut self, list_id: &str, level: usize) -> usize {
        let levels = self.counters.entry(list_id.to_string()).or_default();
        if let Some(deeper) = level.checked_add(1) {
            levels.split_off(&deeper);
        }
        let counter = levels.entry(level).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Forget all counters of `list_id` (restart numbering).
    pub fn restart(&mut self, list_id: &str) {
        self.counters.remove(list_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_items() {
        let mut counters = ListCounters::new();
        assert_eq!(counters.next_index("l1", 0), 0);
        assert_eq!(counters.next_index("l1", 0), 1);
        assert_eq!(counters.next_index("l1", 0), 2);
    }

    #[test]
    fn test_extreme_levels_are_stored_sparsely() {
        let mut counters = ListCounters::new();
        assert_eq!(counters.next_index("l1", usize::MAX), 0);
        assert_eq!(counters.next_index("l1", usize::MAX), 1);
        assert_eq!(counters.next_index("l1", 2_000_000_000), 0);
        assert_eq!(counters.next_index("l1", usize::MAX), 0);
        assert_eq!(counters.next_index("l1", 0), 0);
        assert_eq!(counters.next_index("l1", 2_000_000_000), 0);
    }

    #[test]
    fn test_shallower_item_resets_deeper_levels() {
        let mut counters = ListCounters::new();
        assert_eq!(counters.next_index("l1", 0), 0);
        assert_eq!(counters.next_index("l1", 1), 0);
        assert_eq!(counters.next_index("l1", 1), 1);
        assert_eq!(counters.next_index("l1", 0), 1);
        assert_eq!(counters.next_index("l1", 1), 0);
    }

    #[test]
    fn test_interleaved_lists_at_same_level_are_independent() {
        let mut counters = ListCounters::new();
        assert_eq!(counters.next_index("a", 0), 0);
        assert_eq!(counters.next_index("b", 0), 0);
        assert_eq!(counters.next_index("a", 0), 1);
        assert_eq!(counters.next_index("b", 1), 0);
        assert_eq!(counters.next_index("a", 1), 0);
        assert_eq!(counters.next_index("b", 0), 1);
        assert_eq!(counters.next_index("a", 1), 1);
    }

    #[test]
    fn test_restart() {
        let mut counters = ListCounters::new();
        counters.next_index("a", 0);
        counters.restart("a");
        assert_eq!(counters.next_index("a", 0), 0);
    }
}
