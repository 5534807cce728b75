use crate::cache::HistoryCache;
use crate::error::Result;
use crate::predictor::dfcm::*;
use crate::word::Word;

/// A DFCM predictor whose first table keeps a running hash of each
/// instruction's deltas instead of the deltas themselves.
///
/// Every entry in the first table holds a single element: the hash that keys
/// the second table. After an access with delta `d`, the hash `h` becomes
/// `h ^ d`. The first table only stores one word of context per instruction,
/// at the price of more aliasing in the second table.
#[derive(Clone, Debug)]
pub struct HashOnHashDFCM<T: Word> {
    state: DFCMState<T>,
}

impl<T: Word> HashOnHashDFCM<T> {
    /// Create an uninitialized predictor. The history depth configured for
    /// the first table is ignored.
    pub fn new(cfg: DFCMConfig) -> Result<Self> {
        Ok(Self { state: DFCMState::new(cfg, 1)? })
    }
}

impl<T: Word> DFCMPredictor<T> for HashOnHashDFCM<T> {
    fn name(&self) -> &'static str { "HashOnHashDFCM" }
    fn state(&self) -> &DFCMState<T> { &self.state }
    fn state_mut(&mut self) -> &mut DFCMState<T> { &mut self.state }

    fn predict(&self, key: T) -> Result<DFCMPrediction<T>> {
        let tables = self.state.tables()?;
        let first = match tables.instr_hash_table.get_entry(key) {
            Some(e) => e,
            None => return Ok(DFCMPrediction::FirstTableMiss),
        };
        let hash = self.state.fold_context(
            first.most_recent().unwrap_or_else(T::zero)
        );
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
        let seen = self.state.tables()?.instr_hash_table.get_entry(key)
            .map(|e| (e.most_recent().unwrap_or_else(T::zero), e.last_value()));
        match seen {
            None => {
                let tables = self.state.tables_mut()?;
                tables.instr_hash_table.new_access(key, value, T::zero());
            },
            Some((hash, last)) => {
                let delta = value.wrapping_sub(last);
                let folded = self.state.fold_context(hash);
                let tables = self.state.tables_mut()?;
                tables.hash_delta_table.new_access(folded, delta, delta);
                tables.instr_hash_table.new_access(key, value, hash ^ delta);
            },
        }
        Ok(())
    }
}
