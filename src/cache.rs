//! History caches: associative storage of per-key observation history.
//!
//! Two realizations share the [`HistoryCache`] interface:
//!
//! - [`InfiniteHistoryCache`], an unbounded map used as an oracle, and;
//! - [`RealHistoryCache`], a set-associative structure with a fixed number
//!   of sets and ways and a configurable [`ReplacementPolicy`].
//!
//! Predictors pick one with [`HistoryCacheType`] and hold it as an
//! [`AnyHistoryCache`] for their whole lifetime.

pub mod entry;
pub mod set;
pub mod infinite;
pub mod real;

pub use entry::*;
pub use set::*;
pub use infinite::*;
pub use real::*;

use itertools::iproduct;
use crate::error::{ Error, Result };
use crate::word::Word;

/// Bits of structural overhead per entry besides the tag: one valid bit and
/// one replacement bit.
pub const ENTRY_STATE_BITS: usize = 2;

/// Interface to a history cache.
pub trait HistoryCache<T: Word> {
    /// Returns the valid entry associated with `key`, if any. A key never
    /// inserted (or since evicted) yields [`None`].
    fn get_entry(&self, key: T) -> Option<&HistoryCacheEntry<T>>;

    /// Record `value` as the last value for `key` and push `item` onto its
    /// history, installing a fresh entry if necessary. Advances the logical
    /// clock by one. Returns true if `key` was already present.
    fn new_access(&mut self, key: T, value: T, item: T) -> bool;

    /// Returns the number of valid entries.
    fn num_entries(&self) -> usize;

    /// Returns the declared number of entries, or [`None`] when unbounded.
    fn capacity(&self) -> Option<usize>;

    /// Returns the number of history elements held by each entry.
    fn depth(&self) -> usize;

    /// Returns the number of tag bits stored with each entry.
    fn tag_bits(&self) -> u32;

    /// Returns the current logical time.
    fn clock(&self) -> u64;

    /// Invalidate every entry and reset the clock.
    fn clear(&mut self);

    /// Bits of data per entry: the last value plus the history.
    fn payload_bits(&self) -> usize {
        T::BITS as usize * (1 + self.depth())
    }

    /// Bits of bookkeeping per entry: tag, valid bit and replacement bit.
    fn overhead_bits(&self) -> usize {
        self.tag_bits() as usize + ENTRY_STATE_BITS
    }

    /// Bits required to hold the entries that are currently populated.
    fn memory_cost(&self) -> usize {
        self.payload_bits() * self.num_entries()
    }

    /// Bits required by the structure when fully populated, including the
    /// per-entry bookkeeping. An unbounded cache is "full" at its current
    /// occupancy.
    fn total_memory_cost(&self) -> usize {
        let entries = self.capacity().unwrap_or_else(|| self.num_entries());
        (self.payload_bits() + self.overhead_bits()) * entries
    }
}

/// Selects a history cache realization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HistoryCacheType {
    #[default]
    Infinite,
    Real,
}

/// Dimensions of a history cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheParameters {
    /// Number of bits used to select a set (`1 << num_index_bits` sets)
    pub num_index_bits: u32,

    /// Number of ways per set
    pub num_ways: usize,

    /// Number of history elements per entry
    pub num_sequence_accesses: usize,

    /// Number of tag bits. When unset, the tag is the rest of the key.
    pub num_tag_bits: Option<u32>,

    /// Victim selection
    pub policy: ReplacementPolicy,
}
impl Default for CacheParameters {
    fn default() -> Self {
        Self {
            num_index_bits: 10,
            num_ways: 4,
            num_sequence_accesses: 1,
            num_tag_bits: None,
            policy: ReplacementPolicy::LeastRecentlyUsed,
        }
    }
}
impl CacheParameters {
    pub fn num_sets(&self) -> usize { 1 << self.num_index_bits }

    /// Number of entries at full occupancy.
    pub fn num_entries(&self) -> usize { self.num_sets() * self.num_ways }

    /// Number of tag bits for `T`-sized keys.
    pub fn tag_bits<T: Word>(&self) -> u32 {
        self.num_tag_bits
            .unwrap_or_else(|| T::BITS.saturating_sub(self.num_index_bits))
    }

    /// Number of key bits this cache distinguishes (index + tag).
    /// Saturates instead of overflowing for absurd tag widths.
    pub fn key_bits<T: Word>(&self) -> u32 {
        self.num_index_bits.saturating_add(self.tag_bits::<T>())
    }

    /// Check that these parameters describe a realizable cache for
    /// `T`-sized keys.
    pub fn validate<T: Word>(&self) -> Result<()> {
        if self.num_ways == 0 {
            return Err(Error::ZeroWays);
        }
        if self.num_sequence_accesses == 0 {
            return Err(Error::ZeroSequenceAccesses);
        }
        let tag_bits = self.tag_bits::<T>();
        if tag_bits == 0 {
            return Err(Error::ZeroTagBits);
        }
        let key_bits = self.num_index_bits.checked_add(tag_bits);
        if key_bits.map_or(true, |bits| bits > T::BITS) {
            return Err(Error::KeyWidth {
                index_bits: self.num_index_bits,
                tag_bits,
                word_bits: T::BITS,
            });
        }
        Ok(())
    }

    /// Use these parameters to create a history cache of some type.
    pub fn build<T: Word>(self, kind: HistoryCacheType)
        -> Result<AnyHistoryCache<T>>
    {
        match kind {
            HistoryCacheType::Infinite => {
                if self.num_sequence_accesses == 0 {
                    return Err(Error::ZeroSequenceAccesses);
                }
                Ok(AnyHistoryCache::Infinite(
                    InfiniteHistoryCache::new(self.num_sequence_accesses)
                ))
            },
            HistoryCacheType::Real => {
                Ok(AnyHistoryCache::Real(RealHistoryCache::new(self)?))
            },
        }
    }
}

/// A set of candidate values for each dimension of [`CacheParameters`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheParametersDomain {
    pub num_index_bits: Vec<u32>,
    pub num_ways: Vec<usize>,
    pub num_sequence_accesses: Vec<usize>,
    pub policy: Vec<ReplacementPolicy>,
}
impl CacheParametersDomain {
    /// Expand the domain into every combination of its values.
    pub fn decompose(&self) -> Vec<CacheParameters> {
        iproduct!(
            self.num_index_bits.iter(),
            self.num_ways.iter(),
            self.num_sequence_accesses.iter(),
            self.policy.iter()
        )
        .map(|(&num_index_bits, &num_ways, &num_sequence_accesses, &policy)| {
            CacheParameters {
                num_index_bits,
                num_ways,
                num_sequence_accesses,
                num_tag_bits: None,
                policy,
            }
        })
        .collect()
    }
}

/// A history cache whose realization is fixed at construction.
#[derive(Clone, Debug)]
pub enum AnyHistoryCache<T: Word> {
    Infinite(InfiniteHistoryCache<T>),
    Real(RealHistoryCache<T>),
}

impl<T: Word> AnyHistoryCache<T> {
    pub fn kind(&self) -> HistoryCacheType {
        match self {
            Self::Infinite(_) => HistoryCacheType::Infinite,
            Self::Real(_) => HistoryCacheType::Real,
        }
    }
}

impl<T: Word> HistoryCache<T> for AnyHistoryCache<T> {
    fn get_entry(&self, key: T) -> Option<&HistoryCacheEntry<T>> {
        match self {
            Self::Infinite(c) => c.get_entry(key),
            Self::Real(c) => c.get_entry(key),
        }
    }
    fn new_access(&mut self, key: T, value: T, item: T) -> bool {
        match self {
            Self::Infinite(c) => c.new_access(key, value, item),
            Self::Real(c) => c.new_access(key, value, item),
        }
    }
    fn num_entries(&self) -> usize {
        match self {
            Self::Infinite(c) => c.num_entries(),
            Self::Real(c) => c.num_entries(),
        }
    }
    fn capacity(&self) -> Option<usize> {
        match self {
            Self::Infinite(c) => c.capacity(),
            Self::Real(c) => c.capacity(),
        }
    }
    fn depth(&self) -> usize {
        match self {
            Self::Infinite(c) => c.depth(),
            Self::Real(c) => c.depth(),
        }
    }
    fn tag_bits(&self) -> u32 {
        match self {
            Self::Infinite(c) => c.tag_bits(),
            Self::Real(c) => c.tag_bits(),
        }
    }
    fn clock(&self) -> u64 {
        match self {
            Self::Infinite(c) => c.clock(),
            Self::Real(c) => c.clock(),
        }
    }
    fn clear(&mut self) {
        match self {
            Self::Infinite(c) => c.clear(),
            Self::Real(c) => c.clear(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_dimensions() {
        let p = CacheParameters { num_ways: 0, ..Default::default() };
        assert_eq!(p.validate::<u64>(), Err(Error::ZeroWays));

        let p = CacheParameters { num_sequence_accesses: 0, ..Default::default() };
        assert_eq!(p.validate::<u64>(), Err(Error::ZeroSequenceAccesses));

        let p = CacheParameters { num_tag_bits: Some(0), ..Default::default() };
        assert_eq!(p.validate::<u64>(), Err(Error::ZeroTagBits));

        let p = CacheParameters { num_index_bits: 32, ..Default::default() };
        assert_eq!(p.validate::<u32>(), Err(Error::ZeroTagBits));

        let p = CacheParameters { num_index_bits: 20, num_tag_bits: Some(20),
            ..Default::default() };
        assert!(matches!(p.validate::<u32>(), Err(Error::KeyWidth { .. })));
        assert!(p.validate::<u64>().is_ok());
    }

    #[test]
    fn huge_tag_widths_are_rejected() {
        let p = CacheParameters { num_tag_bits: Some(u32::MAX), ..Default::default() };
        assert_eq!(p.validate::<u64>(), Err(Error::KeyWidth {
            index_bits: 10,
            tag_bits: u32::MAX,
            word_bits: 64,
        }));
        assert_eq!(p.key_bits::<u64>(), u32::MAX);
        assert!(p.build::<u64>(HistoryCacheType::Real).is_err());

        let p = CacheParameters { num_tag_bits: Some(u32::MAX - 2), ..Default::default() };
        assert_eq!(p.key_bits::<u64>(), u32::MAX);
        assert!(matches!(p.validate::<u64>(), Err(Error::KeyWidth { .. })));
    }

    #[test]
    fn builds_requested_kind() {
        let p = CacheParameters::default();
        let c = p.build::<u64>(HistoryCacheType::Real).unwrap();
        assert_eq!(c.kind(), HistoryCacheType::Real);
        assert_eq!(c.capacity(), Some(4096));
        let c = p.build::<u64>(HistoryCacheType::Infinite).unwrap();
        assert_eq!(c.kind(), HistoryCacheType::Infinite);
        assert_eq!(c.capacity(), None);
    }

    #[test]
    fn domain_is_cartesian() {
        let d = CacheParametersDomain {
            num_index_bits: vec![4, 8],
            num_ways: vec![1, 2, 4],
            num_sequence_accesses: vec![1, 2],
            policy: vec![ReplacementPolicy::LeastRecentlyUsed],
        };
        let all = d.decompose();
        assert_eq!(all.len(), 12);
        assert!(all.contains(&CacheParameters {
            num_index_bits: 8,
            num_ways: 2,
            num_sequence_accesses: 1,
            num_tag_bits: None,
            policy: ReplacementPolicy::LeastRecentlyUsed,
        }));
    }
}
