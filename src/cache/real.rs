use crate::cache::*;
use crate::error::Result;
use crate::word::{ Word, low_mask };

/// A bounded, set-associative history cache.
///
/// The low `num_index_bits` bits of a key select one of `1 << num_index_bits`
/// sets, and the next `num_tag_bits` bits form the tag. When the tag is
/// narrower than the rest of the key, distinct keys can alias to the same
/// entry.
#[derive(Clone, Debug)]
pub struct RealHistoryCache<T: Word> {
    cfg: CacheParameters,
    num_tag_bits: u32,
    sets: Vec<HistoryCacheSet<T>>,
    clk: u64,
}

impl<T: Word> RealHistoryCache<T> {
    /// Create an empty cache. Fails when the parameters are invalid for
    /// `T`-sized keys.
    pub fn new(cfg: CacheParameters) -> Result<Self> {
        cfg.validate::<T>()?;
        let num_tag_bits = cfg.tag_bits::<T>();
        let sets = (0..cfg.num_sets())
            .map(|_| HistoryCacheSet::new(cfg.num_ways, num_tag_bits,
                cfg.num_sequence_accesses, cfg.policy))
            .collect();
        Ok(Self { cfg, num_tag_bits, sets, clk: 0 })
    }

    pub fn params(&self) -> &CacheParameters { &self.cfg }
    pub fn get_num_index_bits(&self) -> u32 { self.cfg.num_index_bits }
    pub fn get_num_tag_bits(&self) -> u32 { self.num_tag_bits }
    pub fn get_num_ways(&self) -> usize { self.cfg.num_ways }
    pub fn get_num_sets(&self) -> usize { self.sets.len() }

    /// The set selected by some key.
    pub fn set_index(&self, key: T) -> usize {
        (key.to_key() & low_mask(self.cfg.num_index_bits)) as usize
    }

    /// The tag stored for some key.
    pub fn tag_of(&self, key: T) -> u64 {
        let k = key.to_key().checked_shr(self.cfg.num_index_bits).unwrap_or(0);
        k & low_mask(self.num_tag_bits)
    }

    /// Returns a reference to a set.
    pub fn set(&self, idx: usize) -> &HistoryCacheSet<T> { &self.sets[idx] }

    /// Write an observation for `key`, reporting what happened in its set.
    pub fn access(&mut self, key: T, value: T, item: T) -> Access {
        let now = self.clk;
        self.clk += 1;
        let idx = self.set_index(key);
        let tag = self.tag_of(key);
        self.sets[idx].new_access(tag, value, item, now)
    }
}

impl<T: Word> HistoryCache<T> for RealHistoryCache<T> {
    fn get_entry(&self, key: T) -> Option<&HistoryCacheEntry<T>> {
        let idx = self.set_index(key);
        self.sets[idx].get_entry(self.tag_of(key))
    }

    fn new_access(&mut self, key: T, value: T, item: T) -> bool {
        self.access(key, value, item).is_hit()
    }

    fn num_entries(&self) -> usize {
        self.sets.iter().map(|s| s.num_valid()).sum()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.sets.len() * self.cfg.num_ways)
    }

    fn depth(&self) -> usize { self.cfg.num_sequence_accesses }
    fn tag_bits(&self) -> u32 { self.num_tag_bits }
    fn clock(&self) -> u64 { self.clk }

    fn clear(&mut self) {
        for set in self.sets.iter_mut() {
            set.clear();
        }
        self.clk = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn params(index_bits: u32, ways: usize) -> CacheParameters {
        CacheParameters {
            num_index_bits: index_bits,
            num_ways: ways,
            num_sequence_accesses: 1,
            ..Default::default()
        }
    }

    #[test]
    fn empty_cache_misses_everything() {
        let c = RealHistoryCache::<u64>::new(params(4, 2)).unwrap();
        for key in [0u64, 1, 0xdead_beef, u64::MAX] {
            assert!(c.get_entry(key).is_none());
        }
        assert_eq!(c.num_entries(), 0);
    }

    #[test]
    fn index_and_tag_split() {
        let c = RealHistoryCache::<u32>::new(params(4, 1)).unwrap();
        assert_eq!(c.get_num_sets(), 16);
        assert_eq!(c.get_num_tag_bits(), 28);
        assert_eq!(c.set_index(0x1234), 0x4);
        assert_eq!(c.tag_of(0x1234), 0x123);
    }

    #[test]
    fn narrow_tags_alias() {
        let mut cfg = params(2, 1);
        cfg.num_tag_bits = Some(2);
        let mut c = RealHistoryCache::<u64>::new(cfg).unwrap();
        // 0b0_01_00 and 0b1_01_00 share an index and a 2-bit tag
        c.new_access(0b00100, 7, 0);
        let e = c.get_entry(0b10100).unwrap();
        assert_eq!(e.last_value(), 7);
    }

    #[test]
    fn conflict_evicts_exactly_one() {
        let mut c = RealHistoryCache::<u64>::new(params(0, 2)).unwrap();
        assert_eq!(c.access(1, 0, 0), Access::Filled { way: 0 });
        assert_eq!(c.access(2, 0, 0), Access::Filled { way: 1 });
        assert_eq!(c.access(3, 0, 0), Access::Evicted { way: 0, tag: 1 });
        assert!(c.get_entry(1).is_none());
        assert!(c.get_entry(2).is_some());
        assert!(c.get_entry(3).is_some());
        assert_eq!(c.num_entries(), 2);
    }

    #[test]
    fn total_cost_is_capacity_based() {
        let c = RealHistoryCache::<u64>::new(params(3, 2)).unwrap();
        // 8 sets x 2 ways x (64 * 2 payload + 61 tag + 2) bits
        assert_eq!(c.total_memory_cost(), 16 * (128 + 61 + 2));
        assert_eq!(c.memory_cost(), 0);
    }

    proptest! {
        #[test]
        fn occupancy_is_bounded(
            index_bits in 0u32..4,
            ways in 1usize..5,
            keys in prop::collection::vec(any::<u64>(), 0..200),
        ) {
            let mut c = RealHistoryCache::<u64>::new(params(index_bits, ways)).unwrap();
            let cap = c.capacity().unwrap();
            for key in keys {
                let before = c.num_entries();
                let access = c.access(key, key, 0);
                let after = c.num_entries();
                prop_assert!(after <= cap);
                match access {
                    Access::Filled { .. } => prop_assert_eq!(after, before + 1),
                    _ => prop_assert_eq!(after, before),
                }
                prop_assert!(c.get_entry(key).is_some());
            }
        }

        #[test]
        fn total_cost_is_monotonic(
            index_bits in 0u32..8,
            ways in 1usize..8,
            depth in 1usize..8,
            tag_bits in 1u32..32,
        ) {
            let base = CacheParameters {
                num_index_bits: index_bits,
                num_ways: ways,
                num_sequence_accesses: depth,
                num_tag_bits: Some(tag_bits),
                ..Default::default()
            };
            let cost = |p: CacheParameters| {
                RealHistoryCache::<u64>::new(p).unwrap().total_memory_cost()
            };
            let c0 = cost(base);
            let more_sets = cost(CacheParameters { num_index_bits: index_bits + 1, ..base });
            let more_ways = cost(CacheParameters { num_ways: ways + 1, ..base });
            let deeper = cost(CacheParameters { num_sequence_accesses: depth + 1, ..base });
            let wider_tags = cost(CacheParameters { num_tag_bits: Some(tag_bits + 1), ..base });
            prop_assert!(more_sets >= c0);
            prop_assert!(more_ways >= c0);
            prop_assert!(deeper >= c0);
            prop_assert!(wider_tags >= c0);
        }
    }
}
