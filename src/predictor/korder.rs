use crate::cache::HistoryCache;
use crate::error::Result;
use crate::predictor::dfcm::*;
use crate::word::Word;

/// A k-order DFCM predictor.
///
/// The first table keeps the last `k` deltas of every instruction, where `k`
/// is `first_table.num_sequence_accesses`. Their XOR (see [`ContextHash`])
/// keys the second table, which holds the delta that followed that context
/// last time.
#[derive(Clone, Debug)]
pub struct KOrderDFCM<T: Word> {
    state: DFCMState<T>,
}

impl<T: Word> KOrderDFCM<T> {
    /// Create an uninitialized predictor. Call
    /// [`DFCMPredictor::initialize_predictor`] before use.
    pub fn new(cfg: DFCMConfig) -> Result<Self> {
        let k = cfg.first_table.num_sequence_accesses;
        Ok(Self { state: DFCMState::new(cfg, k)? })
    }

    /// Number of deltas forming a context.
    pub fn order(&self) -> usize { self.state.first_depth() }

    fn context_hash(&self, deltas: impl Iterator<Item = T>, key: T) -> T {
        let hash = deltas.fold(T::zero(), |acc, d| acc ^ d);
        let hash = match self.state.config().context_hash {
            ContextHash::FoldDeltas => hash,
            ContextHash::FoldDeltasWithKey => hash ^ key,
        };
        self.state.fold_context(hash)
    }
}

impl<T: Word> DFCMPredictor<T> for KOrderDFCM<T> {
    fn name(&self) -> &'static str { "KOrderDFCM" }
    fn state(&self) -> &DFCMState<T> { &self.state }
    fn state_mut(&mut self) -> &mut DFCMState<T> { &mut self.state }

    fn predict(&self, key: T) -> Result<DFCMPrediction<T>> {
        let tables = self.state.tables()?;
        let first = match tables.instr_hash_table.get_entry(key) {
            Some(e) => e,
            None => return Ok(DFCMPrediction::FirstTableMiss),
        };
        let hash = self.context_hash(first.history().iter().copied(), key);
        let res = match tables.hash_delta_table.get_entry(hash) {
            Some(second) => {
                let delta = second.last_value();
                DFCMPrediction::Predicted {
                    value: first.last_value().wrapping_add(delta),
                    delta,
                }
            },
            None => DFCMPrediction::SecondTableMiss,
        };
        Ok(res)
    }

    fn fit(&mut self, key: T, value: T) -> Result<()> {
        let seen = {
            let tables = self.state.tables()?;
            tables.instr_hash_table.get_entry(key).map(|e| {
                let hash = self.context_hash(e.history().iter().copied(), key);
                (hash, e.last_value())
            })
        };
        match seen {
            // The context of a new instruction is a single zero delta
            None => {
                let hash = self.context_hash(std::iter::once(T::zero()), key);
                let tables = self.state.tables_mut()?;
                tables.instr_hash_table.new_access(key, value, T::zero());
                tables.hash_delta_table.new_access(hash, T::zero(), T::zero());
            },
            Some((hash, last)) => {
                let delta = value.wrapping_sub(last);
                let tables = self.state.tables_mut()?;
                tables.hash_delta_table.new_access(hash, delta, delta);
                tables.instr_hash_table.new_access(key, value, delta);
            },
        }
        Ok(())
    }
}
