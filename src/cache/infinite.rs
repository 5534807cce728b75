use std::collections::BTreeMap;
use crate::cache::*;
use crate::word::Word;

/// An unbounded history cache with one entry per distinct key.
///
/// Entries are never evicted, which makes this an upper bound for any
/// realizable cache with the same history depth.
#[derive(Clone, Debug)]
pub struct InfiniteHistoryCache<T: Word> {
    entries: BTreeMap<T, HistoryCacheEntry<T>>,
    depth: usize,
    clk: u64,
}

impl<T: Word> InfiniteHistoryCache<T> {
    /// Create an empty cache whose entries hold `depth` history elements.
    pub fn new(depth: usize) -> Self {
        Self { entries: BTreeMap::new(), depth, clk: 0 }
    }

    /// Iterate over all (key, entry) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &HistoryCacheEntry<T>)> {
        self.entries.iter()
    }
}

impl<T: Word> HistoryCache<T> for InfiniteHistoryCache<T> {
    fn get_entry(&self, key: T) -> Option<&HistoryCacheEntry<T>> {
        self.entries.get(&key)
    }

    fn new_access(&mut self, key: T, value: T, item: T) -> bool {
        let now = self.clk;
        self.clk += 1;
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.record(value, item, now);
                true
            },
            None => {
                let mut entry = HistoryCacheEntry::new(self.depth);
                entry.install(key.to_key(), value, item, now);
                self.entries.insert(key, entry);
                false
            },
        }
    }

    fn num_entries(&self) -> usize { self.entries.len() }
    fn capacity(&self) -> Option<usize> { None }
    fn depth(&self) -> usize { self.depth }

    // The whole key is the tag: there are no index bits.
    fn tag_bits(&self) -> u32 { T::BITS }

    fn clock(&self) -> u64 { self.clk }

    fn clear(&mut self) {
        self.entries.clear();
        self.clk = 0;
    }
}
