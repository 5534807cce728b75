//! Helpers for collecting statistics and reporting results.

use std::fmt;

/// Hit/miss accumulator for a predictor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitCounter {
    /// Number of correct predictions
    pub hits: usize,

    /// Number of incorrect or unavailable predictions
    pub misses: usize,
}
impl HitCounter {
    pub fn new() -> Self { Self::default() }

    /// Record the outcome of one access.
    pub fn record(&mut self, hit: bool) {
        if hit { self.hits += 1; } else { self.misses += 1; }
    }

    /// Number of accesses seen.
    pub fn total(&self) -> usize { self.hits + self.misses }

    /// Returns `hits / (hits + misses)`, or NaN when nothing was recorded.
    pub fn hit_rate(&self) -> f64 {
        self.hits as f64 / self.total() as f64
    }

    /// Returns `count / total`, or NaN when nothing was recorded.
    pub fn rate_of(&self, count: usize) -> f64 {
        count as f64 / self.total() as f64
    }

    pub fn reset(&mut self) { *self = Self::default(); }
}

/// The numeric contract shared by all result objects.
pub trait PredictResultsAndCosts: fmt::Debug {
    /// Fraction of accesses predicted correctly.
    fn hit_rate(&self) -> f64;

    /// Memory cost of the predictor in bytes.
    fn total_memory_cost(&self) -> f64;
}

/// Results of replaying a trace through a DFCM predictor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DFCMPredictResultsAndCosts {
    pub hit_rate: f64,

    /// Fraction of accesses whose instruction missed in the first table
    pub first_table_miss_rate: f64,

    /// Fraction of accesses whose context missed in the second table
    pub second_table_miss_rate: f64,

    /// Costs in bytes
    pub first_table_memory_cost: f64,
    pub second_table_memory_cost: f64,
    pub total_memory_cost: f64,
}
impl PredictResultsAndCosts for DFCMPredictResultsAndCosts {
    fn hit_rate(&self) -> f64 { self.hit_rate }
    fn total_memory_cost(&self) -> f64 { self.total_memory_cost }
}
impl fmt::Display for DFCMPredictResultsAndCosts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "hit rate {:.2}% (1st miss {:.2}%, 2nd miss {:.2}%), \
            cost {:.1}B ({:.1}B + {:.1}B)",
            self.hit_rate * 100.0,
            self.first_table_miss_rate * 100.0,
            self.second_table_miss_rate * 100.0,
            self.total_memory_cost,
            self.first_table_memory_cost,
            self.second_table_memory_cost,
        )
    }
}

/// Results of running the SVM predictor over a buffers dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuffersSVMPredictResultsAndCosts {
    pub hit_rate: f64,

    /// Fraction of accesses that missed in the class dictionary
    pub dictionary_miss_rate: f64,

    /// Fraction of accesses that missed in the history cache
    pub cache_miss_rate: f64,

    /// Bytes of model weights
    pub model_memory_cost: f64,
}
impl PredictResultsAndCosts for BuffersSVMPredictResultsAndCosts {
    fn hit_rate(&self) -> f64 { self.hit_rate }
    fn total_memory_cost(&self) -> f64 { self.model_memory_cost }
}
impl fmt::Display for BuffersSVMPredictResultsAndCosts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "hit rate {:.2}% (dict miss {:.2}%, cache miss {:.2}%), \
            model {:.1}B",
            self.hit_rate * 100.0,
            self.dictionary_miss_rate * 100.0,
            self.cache_miss_rate * 100.0,
            self.model_memory_cost,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_counter_is_nan() {
        let c = HitCounter::new();
        assert!(c.hit_rate().is_nan());
        assert!(c.rate_of(0).is_nan());
    }

    #[test]
    fn hit_rate() {
        let mut c = HitCounter::new();
        for hit in [true, false, true, true] {
            c.record(hit);
        }
        assert_eq!(c.total(), 4);
        assert_eq!(c.hit_rate(), 0.75);
        c.reset();
        assert_eq!(c.total(), 0);
    }
}
