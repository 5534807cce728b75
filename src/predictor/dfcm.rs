//! Pieces shared by the differential finite context method (DFCM) predictors.
//!
//! A DFCM predictor keeps two tables:
//!
//! - The `instr_hash_table`, keyed by instruction, holding the last value
//!   observed for each instruction plus some context derived from its recent
//!   deltas.
//! - The `hash_delta_table`, keyed by a hash of that context, holding the
//!   delta that last followed the context.
//!
//! A prediction is the last value plus the delta found for the current
//! context. The two flavors differ only in how the context is formed; see
//! [`crate::predictor::KOrderDFCM`] and [`crate::predictor::HashOnHashDFCM`].

use log::debug;
use crate::cache::*;
use crate::error::{ Error, Result };
use crate::stats::{ HitCounter, DFCMPredictResultsAndCosts };
use crate::trace::AccessesDataset;
use crate::word::{ Word, low_mask };

/// How the context of an instruction is hashed into a second-table key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContextHash {
    /// XOR of the recent deltas.
    #[default]
    FoldDeltas,

    /// XOR of the recent deltas and the instruction key.
    FoldDeltasWithKey,
}

/// Configuration shared by both DFCM flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DFCMConfig {
    /// Realization used for both tables
    pub history_cache_type: HistoryCacheType,

    /// Dimensions of the `instr_hash_table`
    pub first_table: CacheParameters,

    /// Dimensions of the `hash_delta_table`. The history depth is always 1.
    pub second_table: CacheParameters,

    /// Report the full structural cost instead of the populated payload
    pub count_total_memory_cost: bool,

    /// Context hash used by [`crate::predictor::KOrderDFCM`]
    pub context_hash: ContextHash,

    /// When set, context hashes are XOR-folded down to this many bits
    pub context_hash_bits: Option<u32>,

    /// Number of progress reports emitted while replaying a dataset
    pub progress_parts: usize,
}
impl Default for DFCMConfig {
    fn default() -> Self {
        Self {
            history_cache_type: HistoryCacheType::Infinite,
            first_table: CacheParameters::default(),
            second_table: CacheParameters::default(),
            count_total_memory_cost: false,
            context_hash: ContextHash::FoldDeltas,
            context_hash_bits: None,
            progress_parts: 10,
        }
    }
}
impl DFCMConfig {
    /// Width of the keys that the first table produces for the second.
    pub fn produced_key_bits<T: Word>(&self) -> u32 {
        self.context_hash_bits.unwrap_or(T::BITS)
    }

    /// Check that both tables are realizable for `T`-sized words and that the
    /// second table can be keyed by the first table's output.
    pub fn validate<T: Word>(&self) -> Result<()> {
        if let Some(bits) = self.context_hash_bits {
            if bits == 0 || bits > T::BITS {
                return Err(Error::InvalidModelParameter("context_hash_bits"));
            }
        }
        match self.history_cache_type {
            HistoryCacheType::Infinite => {
                if self.first_table.num_sequence_accesses == 0 {
                    return Err(Error::ZeroSequenceAccesses);
                }
            },
            HistoryCacheType::Real => {
                self.first_table.validate::<T>()?;
                self.second_table.validate::<T>()?;
                let first_bits = self.produced_key_bits::<T>();
                let second_bits = self.second_table.key_bits::<T>();
                if second_bits > first_bits {
                    return Err(Error::IncompatibleTables {
                        first_bits, second_bits
                    });
                }
            },
        }
        Ok(())
    }
}

/// XOR-fold a key down to `bits` bits.
pub fn fold_bits(key: u64, bits: u32) -> u64 {
    if bits >= 64 {
        return key;
    }
    let mut res = 0;
    let mut k = key;
    while k != 0 {
        res ^= k & low_mask(bits);
        k >>= bits;
    }
    res
}

/// The outcome of a DFCM lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DFCMPrediction<T: Word> {
    /// Both tables hit.
    Predicted { value: T, delta: T },

    /// The instruction is not in the first table. The second table is not
    /// consulted.
    FirstTableMiss,

    /// The context of the instruction is not in the second table.
    SecondTableMiss,
}
impl<T: Word> DFCMPrediction<T> {
    /// The predicted value, if any.
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Predicted { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Per-table memory costs in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DFCMMemoryCosts {
    pub first_table: f64,
    pub second_table: f64,
}
impl DFCMMemoryCosts {
    pub fn total(&self) -> f64 { self.first_table + self.second_table }
}

/// The two tables owned by a DFCM predictor.
#[derive(Clone, Debug)]
pub struct DFCMTables<T: Word> {
    pub instr_hash_table: AnyHistoryCache<T>,
    pub hash_delta_table: AnyHistoryCache<T>,
}
impl<T: Word> DFCMTables<T> {
    /// Populated payload bits of both tables. A delta table entry only stores
    /// its delta.
    fn memory_cost_bits(&self) -> (usize, usize) {
        let second = T::BITS as usize * self.hash_delta_table.num_entries();
        (self.instr_hash_table.memory_cost(), second)
    }

    /// Structural bits of both tables when full.
    fn total_memory_cost_bits(&self) -> (usize, usize) {
        let t = &self.hash_delta_table;
        let entries = t.capacity().unwrap_or_else(|| t.num_entries());
        let second = (T::BITS as usize + t.overhead_bits()) * entries;
        (self.instr_hash_table.total_memory_cost(), second)
    }
}

fn to_bytes((first, second): (usize, usize)) -> DFCMMemoryCosts {
    DFCMMemoryCosts {
        first_table: first as f64 / 8.0,
        second_table: second as f64 / 8.0,
    }
}

/// State shared by the DFCM flavors: configuration, tables and counters.
#[derive(Clone, Debug)]
pub struct DFCMState<T: Word> {
    cfg: DFCMConfig,
    first_depth: usize,
    tables: Option<DFCMTables<T>>,
    counter: HitCounter,
    first_table_misses: usize,
    second_table_misses: usize,
}
impl<T: Word> DFCMState<T> {
    /// Create uninitialized state. Every entry of the first table holds
    /// `first_depth` history elements.
    pub fn new(cfg: DFCMConfig, first_depth: usize) -> Result<Self> {
        let mut checked = cfg;
        checked.first_table.num_sequence_accesses = first_depth;
        checked.second_table.num_sequence_accesses = 1;
        checked.validate::<T>()?;
        Ok(Self {
            cfg,
            first_depth,
            tables: None,
            counter: HitCounter::new(),
            first_table_misses: 0,
            second_table_misses: 0,
        })
    }

    pub fn config(&self) -> &DFCMConfig { &self.cfg }
    pub fn first_depth(&self) -> usize { self.first_depth }
    pub fn counter(&self) -> &HitCounter { &self.counter }
    pub fn is_initialized(&self) -> bool { self.tables.is_some() }

    /// Build empty tables and reset all counters.
    pub fn initialize(&mut self) -> Result<()> {
        let kind = self.cfg.history_cache_type;
        let first = CacheParameters {
            num_sequence_accesses: self.first_depth,
            ..self.cfg.first_table
        };
        let second = CacheParameters {
            num_sequence_accesses: 1,
            ..self.cfg.second_table
        };
        self.tables = Some(DFCMTables {
            instr_hash_table: first.build(kind)?,
            hash_delta_table: second.build(kind)?,
        });
        self.reset_counters();
        Ok(())
    }

    pub fn tables(&self) -> Result<&DFCMTables<T>> {
        self.tables.as_ref().ok_or(Error::Uninitialized("DFCM predictor"))
    }

    pub fn tables_mut(&mut self) -> Result<&mut DFCMTables<T>> {
        self.tables.as_mut().ok_or(Error::Uninitialized("DFCM predictor"))
    }

    pub fn reset_counters(&mut self) {
        self.counter.reset();
        self.first_table_misses = 0;
        self.second_table_misses = 0;
    }

    /// Invalidate every entry in both tables. Counters are untouched.
    pub fn clear_tables(&mut self) {
        if let Some(t) = self.tables.as_mut() {
            t.instr_hash_table.clear();
            t.hash_delta_table.clear();
        }
    }

    /// Account for the outcome of one prediction.
    pub fn record(&mut self, prediction: &DFCMPrediction<T>, hit: bool) {
        match prediction {
            DFCMPrediction::FirstTableMiss => self.first_table_misses += 1,
            DFCMPrediction::SecondTableMiss => self.second_table_misses += 1,
            DFCMPrediction::Predicted { .. } => {},
        }
        self.counter.record(hit);
    }

    pub fn first_table_miss_rate(&self) -> f64 {
        self.counter.rate_of(self.first_table_misses)
    }
    pub fn second_table_miss_rate(&self) -> f64 {
        self.counter.rate_of(self.second_table_misses)
    }

    /// Fold a context hash to the configured width.
    pub fn fold_context(&self, hash: T) -> T {
        match self.cfg.context_hash_bits {
            Some(bits) => T::from_key(fold_bits(hash.to_key(), bits)),
            None => hash,
        }
    }

    /// Number of accesses between two progress reports.
    pub fn progress_interval(&self, len: usize) -> usize {
        (len / self.cfg.progress_parts.max(1)).max(1)
    }

    pub fn memory_costs(&self) -> Result<DFCMMemoryCosts> {
        Ok(to_bytes(self.tables()?.memory_cost_bits()))
    }

    pub fn total_memory_costs(&self) -> Result<DFCMMemoryCosts> {
        Ok(to_bytes(self.tables()?.total_memory_cost_bits()))
    }

    /// Summarize the accesses processed since the counters were reset.
    pub fn results(&self) -> Result<DFCMPredictResultsAndCosts> {
        let costs = if self.cfg.count_total_memory_cost {
            self.total_memory_costs()?
        } else {
            self.memory_costs()?
        };
        Ok(DFCMPredictResultsAndCosts {
            hit_rate: self.counter.hit_rate(),
            first_table_miss_rate: self.first_table_miss_rate(),
            second_table_miss_rate: self.second_table_miss_rate(),
            first_table_memory_cost: costs.first_table,
            second_table_memory_cost: costs.second_table,
            total_memory_cost: costs.total(),
        })
    }
}

/// Interface to a DFCM predictor.
///
/// Implementors only decide how a context is derived from the first table
/// ([`DFCMPredictor::predict`]) and how the tables are updated
/// ([`DFCMPredictor::fit`]). Replay and accounting are shared.
pub trait DFCMPredictor<T: Word> {
    fn name(&self) -> &'static str;
    fn state(&self) -> &DFCMState<T>;
    fn state_mut(&mut self) -> &mut DFCMState<T>;

    /// Predict the next value for instruction `key`.
    fn predict(&self, key: T) -> Result<DFCMPrediction<T>>;

    /// Update both tables with the observed `value` for instruction `key`.
    fn fit(&mut self, key: T, value: T) -> Result<()>;

    /// Reset the predictor to empty tables and zeroed counters.
    fn initialize_predictor(&mut self) -> Result<()> {
        self.state_mut().initialize()?;
        let costs = self.state().total_memory_costs()?;
        debug!("{}: initialized, {:.1}B + {:.1}B when full",
            self.name(), costs.first_table, costs.second_table);
        Ok(())
    }

    /// Predict, account and fit one access. Returns true on a hit.
    fn process(&mut self, key: T, value: T) -> Result<bool> {
        let prediction = self.predict(key)?;
        let hit = prediction.value() == Some(value);
        self.state_mut().record(&prediction, hit);
        self.fit(key, value)?;
        Ok(hit)
    }

    /// Replay a dataset through the predictor and report the results for
    /// this dataset alone. Table contents carry over from earlier calls.
    fn import_data(&mut self, data: &AccessesDataset<T>)
        -> Result<DFCMPredictResultsAndCosts>
    {
        self.state().tables()?;
        self.state_mut().reset_counters();
        let interval = self.state().progress_interval(data.len());
        for (idx, r) in data.iter().enumerate() {
            self.process(r.key, r.value)?;
            if (idx + 1) % interval == 0 {
                debug!("{}: {}/{} accesses, hit rate {:.4}",
                    self.name(), idx + 1, data.len(),
                    self.state().counter().hit_rate());
            }
        }
        self.state().results()
    }

    /// Optionally reinitialize, then replay a dataset.
    fn simulate(&mut self, data: &AccessesDataset<T>, initialize: bool)
        -> Result<DFCMPredictResultsAndCosts>
    {
        if initialize {
            self.initialize_predictor()?;
        }
        self.import_data(data)
    }

    fn hit_rate(&self) -> f64 { self.state().counter().hit_rate() }

    fn memory_costs(&self) -> Result<DFCMMemoryCosts> {
        self.state().memory_costs()
    }

    fn total_memory_costs(&self) -> Result<DFCMMemoryCosts> {
        self.state().total_memory_costs()
    }

    /// Invalidate every entry of both tables.
    fn clean(&mut self) { self.state_mut().clear_tables(); }
}

#[cfg(test)]
mod test {
    use super::*;

    fn real(index_bits: u32, ways: usize) -> CacheParameters {
        CacheParameters {
            num_index_bits: index_bits,
            num_ways: ways,
            ..Default::default()
        }
    }

    #[test]
    fn fold() {
        assert_eq!(fold_bits(0xabcd, 64), 0xabcd);
        assert_eq!(fold_bits(0xabcd, 8), 0xab ^ 0xcd);
        assert_eq!(fold_bits(0, 4), 0);
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = DFCMConfig::default();
        assert!(cfg.validate::<u64>().is_ok());
        let cfg = DFCMConfig {
            history_cache_type: HistoryCacheType::Real,
            ..Default::default()
        };
        assert!(cfg.validate::<u32>().is_ok());
    }

    #[test]
    fn second_table_wider_than_context() {
        let cfg = DFCMConfig {
            history_cache_type: HistoryCacheType::Real,
            first_table: real(4, 2),
            second_table: real(4, 2),
            context_hash_bits: Some(12),
            ..Default::default()
        };
        assert_eq!(cfg.validate::<u64>(), Err(Error::IncompatibleTables {
            first_bits: 12, second_bits: 64,
        }));

        let cfg = DFCMConfig {
            second_table: CacheParameters { num_tag_bits: Some(8), ..real(4, 2) },
            ..cfg
        };
        assert!(cfg.validate::<u64>().is_ok());
    }

    #[test]
    fn context_hash_width_is_checked() {
        let cfg = DFCMConfig { context_hash_bits: Some(0), ..Default::default() };
        assert!(matches!(cfg.validate::<u32>(),
            Err(Error::InvalidModelParameter(_))));
        let cfg = DFCMConfig { context_hash_bits: Some(33), ..Default::default() };
        assert!(cfg.validate::<u32>().is_err());
        assert!(cfg.validate::<u64>().is_ok());
    }

    #[test]
    fn state_requires_initialization() {
        let mut s = DFCMState::<u64>::new(DFCMConfig::default(), 2).unwrap();
        assert!(!s.is_initialized());
        assert_eq!(s.tables().err(), Some(Error::Uninitialized("DFCM predictor")));
        assert!(s.memory_costs().is_err());
        s.initialize().unwrap();
        assert!(s.is_initialized());
        assert_eq!(s.tables().unwrap().instr_hash_table.depth(), 2);
        assert_eq!(s.tables().unwrap().hash_delta_table.depth(), 1);
    }

    #[test]
    fn real_costs_in_bytes() {
        let cfg = DFCMConfig {
            history_cache_type: HistoryCacheType::Real,
            first_table: real(2, 2),
            second_table: real(3, 1),
            ..Default::default()
        };
        let mut s = DFCMState::<u32>::new(cfg, 1).unwrap();
        s.initialize().unwrap();
        assert_eq!(s.memory_costs().unwrap(), DFCMMemoryCosts::default());
        let c = s.total_memory_costs().unwrap();
        // 8 entries x (2 * 32 payload + 30 tag + 2) bits
        assert_eq!(c.first_table, (8 * (64 + 30 + 2)) as f64 / 8.0);
        // 8 entries x (32 delta + 29 tag + 2) bits
        assert_eq!(c.second_table, (8 * (32 + 29 + 2)) as f64 / 8.0);
    }
}
