use std::collections::VecDeque;
use crate::word::Word;

/// A single slot in a history cache.
///
/// Besides the tag and a bounded history of observations, every entry keeps
/// the last value observed for its key and the bookkeeping used by the
/// replacement policies: a logical timestamp of the last touch and a
/// frequency counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryCacheEntry<T: Word> {
    tag: u64,
    valid: bool,
    history: VecDeque<T>,
    depth: usize,
    last_value: T,
    last_access: u64,
    frequency: u32,
}

impl<T: Word> HistoryCacheEntry<T> {
    /// Create an invalid entry holding at most `depth` history elements.
    pub fn new(depth: usize) -> Self {
        Self {
            tag: 0,
            valid: false,
            history: VecDeque::with_capacity(depth),
            depth,
            last_value: T::zero(),
            last_access: 0,
            frequency: 0,
        }
    }

    pub fn is_valid(&self) -> bool { self.valid }
    pub fn tag(&self) -> u64 { self.tag }
    pub fn depth(&self) -> usize { self.depth }
    pub fn last_value(&self) -> T { self.last_value }
    pub fn last_access(&self) -> u64 { self.last_access }
    pub fn frequency(&self) -> u32 { self.frequency }

    /// The history, oldest element first.
    pub fn history(&self) -> &VecDeque<T> { &self.history }

    /// The most recently recorded history element.
    pub fn most_recent(&self) -> Option<T> { self.history.back().copied() }

    /// Returns true if this entry is valid and holds `tag`.
    pub fn tag_matches(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }

    /// (Re)install this entry for a new tag. The history is reset and seeded
    /// with `item`.
    pub fn install(&mut self, tag: u64, value: T, item: T, now: u64) {
        self.tag = tag;
        self.valid = true;
        self.history.clear();
        self.history.push_back(item);
        self.last_value = value;
        self.last_access = now;
        self.frequency = 1;
    }

    /// Record a new observation for the key held by this entry. When the
    /// history is full, the oldest element is discarded.
    pub fn record(&mut self, value: T, item: T, now: u64) {
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        self.history.push_back(item);
        self.last_value = value;
        self.last_access = now;
        self.frequency = self.frequency.saturating_add(1);
    }

    /// Invalidate this entry.
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.tag = 0;
        self.history.clear();
        self.last_value = T::zero();
        self.last_access = 0;
        self.frequency = 0;
    }
}
