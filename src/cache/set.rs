use crate::cache::entry::HistoryCacheEntry;
use crate::word::Word;

/// Strategy for selecting a victim way when a set is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReplacementPolicy {
    /// Evict the way with the oldest logical timestamp.
    #[default]
    LeastRecentlyUsed,

    /// Evict the way touched the fewest times since it was installed.
    LeastFrequentlyUsed,

    /// Evict ways in turn, starting from the head way.
    RoundRobin,
}

/// Outcome of writing an observation into a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// The tag was present and its entry was updated.
    Hit { way: usize },

    /// The tag was absent and was installed into an invalid way.
    Filled { way: usize },

    /// The tag was absent and replaced the valid entry holding `tag`.
    Evicted { way: usize, tag: u64 },
}
impl Access {
    pub fn is_hit(&self) -> bool { matches!(self, Self::Hit { .. }) }
    pub fn way(&self) -> usize {
        match self {
            Self::Hit { way } | Self::Filled { way } | Self::Evicted { way, .. } => *way,
        }
    }
}

/// A congruence class of `num_ways` entries sharing one set index.
///
/// At most one valid entry holds a given tag at any time.
#[derive(Clone, Debug)]
pub struct HistoryCacheSet<T: Word> {
    ways: Vec<HistoryCacheEntry<T>>,
    num_tag_bits: u32,
    head_way: usize,
    policy: ReplacementPolicy,
}

impl<T: Word> HistoryCacheSet<T> {
    pub fn new(num_ways: usize, num_tag_bits: u32, depth: usize,
        policy: ReplacementPolicy) -> Self
    {
        Self {
            ways: vec![HistoryCacheEntry::new(depth); num_ways],
            num_tag_bits,
            head_way: 0,
            policy,
        }
    }

    pub fn num_ways(&self) -> usize { self.ways.len() }
    pub fn num_tag_bits(&self) -> u32 { self.num_tag_bits }
    pub fn head_way(&self) -> usize { self.head_way }
    pub fn policy(&self) -> ReplacementPolicy { self.policy }

    /// Returns a reference to the entry in some way.
    pub fn way(&self, way: usize) -> &HistoryCacheEntry<T> { &self.ways[way] }

    /// Returns the way holding a valid entry for `tag`.
    pub fn find_way(&self, tag: u64) -> Option<usize> {
        self.ways.iter().position(|e| e.tag_matches(tag))
    }

    /// Returns the valid entry holding `tag`.
    pub fn get_entry(&self, tag: u64) -> Option<&HistoryCacheEntry<T>> {
        self.find_way(tag).map(|way| &self.ways[way])
    }

    /// Returns true if the entry in `way` was touched within the last
    /// `num_ways` ticks of the owning cache's clock.
    pub fn is_entry_recently_used(&self, way: usize, now: u64) -> bool {
        let entry = &self.ways[way];
        let window = self.ways.len() as u64;
        entry.is_valid() && now.saturating_sub(entry.last_access()) < window
    }

    fn first_invalid_way(&self) -> Option<usize> {
        self.ways.iter().position(|e| !e.is_valid())
    }

    /// The first invalid way, or else the way with the oldest timestamp.
    /// Ties go to the lowest way.
    pub fn get_least_recent_way(&self) -> usize {
        if let Some(way) = self.first_invalid_way() {
            return way;
        }
        // min_by_key keeps the first minimum
        self.ways.iter().enumerate()
            .min_by_key(|(_, e)| e.last_access())
            .map_or(0, |(way, _)| way)
    }

    /// The first invalid way, or else the way with the lowest frequency.
    /// Ties go to the lowest way.
    pub fn get_least_frequent_way(&self) -> usize {
        if let Some(way) = self.first_invalid_way() {
            return way;
        }
        self.ways.iter().enumerate()
            .min_by_key(|(_, e)| e.frequency())
            .map_or(0, |(way, _)| way)
    }

    /// Select the way to overwrite for a tag that is not present.
    pub fn victim_way(&self) -> usize {
        match self.policy {
            ReplacementPolicy::LeastRecentlyUsed => self.get_least_recent_way(),
            ReplacementPolicy::LeastFrequentlyUsed => self.get_least_frequent_way(),
            ReplacementPolicy::RoundRobin => {
                self.first_invalid_way().unwrap_or(self.head_way)
            },
        }
    }

    /// Write an observation for `tag`. On a miss, exactly one way is
    /// (re)installed.
    pub fn new_access(&mut self, tag: u64, value: T, item: T, now: u64) -> Access {
        if let Some(way) = self.find_way(tag) {
            self.ways[way].record(value, item, now);
            return Access::Hit { way };
        }

        let way = self.victim_way();
        let entry = &mut self.ways[way];
        let res = if entry.is_valid() {
            Access::Evicted { way, tag: entry.tag() }
        } else {
            Access::Filled { way }
        };
        entry.install(tag, value, item, now);
        self.head_way = (way + 1) % self.ways.len();
        res
    }

    /// Number of valid entries.
    pub fn num_valid(&self) -> usize {
        self.ways.iter().filter(|e| e.is_valid()).count()
    }

    /// Invalidate every way.
    pub fn clear(&mut self) {
        for entry in self.ways.iter_mut() {
            entry.invalidate();
        }
        self.head_way = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn set(policy: ReplacementPolicy) -> HistoryCacheSet<u64> {
        HistoryCacheSet::new(4, 16, 2, policy)
    }

    #[test]
    fn empty_set_finds_nothing() {
        let s = set(ReplacementPolicy::LeastRecentlyUsed);
        for tag in 0..16 {
            assert!(s.get_entry(tag).is_none());
        }
        assert_eq!(s.num_valid(), 0);
    }

    #[test]
    fn fills_invalid_ways_first() {
        let mut s = set(ReplacementPolicy::LeastRecentlyUsed);
        for (now, tag) in (10..14).enumerate() {
            let a = s.new_access(tag, 0, 0, now as u64);
            assert_eq!(a, Access::Filled { way: now });
        }
        assert_eq!(s.num_valid(), 4);
    }

    #[test]
    fn evicts_least_recent() {
        let mut s = set(ReplacementPolicy::LeastRecentlyUsed);
        for (now, tag) in (10..14).enumerate() {
            s.new_access(tag, 0, 0, now as u64);
        }
        // Touch tag 10 so tag 11 (way 1) becomes the oldest
        assert!(s.new_access(10, 1, 1, 4).is_hit());
        assert_eq!(s.get_least_recent_way(), 1);
        let a = s.new_access(20, 0, 0, 5);
        assert_eq!(a, Access::Evicted { way: 1, tag: 11 });
        assert!(s.get_entry(11).is_none());
        assert!(s.get_entry(20).is_some());
        assert_eq!(s.num_valid(), 4);
    }

    #[test]
    fn evicts_least_frequent_lowest_way_on_ties() {
        let mut s = set(ReplacementPolicy::LeastFrequentlyUsed);
        for (now, tag) in (10..14).enumerate() {
            s.new_access(tag, 0, 0, now as u64);
        }
        s.new_access(10, 0, 0, 4);
        s.new_access(12, 0, 0, 5);
        // Ways 1 and 3 are tied at one touch each
        assert_eq!(s.get_least_frequent_way(), 1);
        assert_eq!(s.new_access(30, 0, 0, 6), Access::Evicted { way: 1, tag: 11 });
    }

    #[test]
    fn round_robin_follows_head() {
        let mut s = set(ReplacementPolicy::RoundRobin);
        for (now, tag) in (10..14).enumerate() {
            s.new_access(tag, 0, 0, now as u64);
        }
        assert_eq!(s.head_way(), 0);
        assert_eq!(s.new_access(40, 0, 0, 4).way(), 0);
        assert_eq!(s.new_access(41, 0, 0, 5).way(), 1);
        assert_eq!(s.head_way(), 2);
    }

    #[test]
    fn recency_window_is_associativity() {
        let mut s = set(ReplacementPolicy::LeastRecentlyUsed);
        s.new_access(1, 0, 0, 10);
        assert!(s.is_entry_recently_used(0, 13));
        assert!(!s.is_entry_recently_used(0, 14));
        assert!(!s.is_entry_recently_used(1, 10));
    }
}
