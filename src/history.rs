
use bitvec::prelude::*;

/// A shift register recording whether each of the most recent accesses
/// missed in the buffers. Bit 0 is the newest access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissHistoryRegister {
    data: BitVec<usize, Lsb0>,
    len: usize,
}

// NOTE: This *reverses* the bits so that the leftmost character is the
// oldest access and the rightmost character is the newest.
impl std::fmt::Display for MissHistoryRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let x: String = self.data.as_bitslice().iter().by_vals()
            .map(|b| if b { '1' } else { '0' })
            .rev()
            .collect();
        write!(f, "{}", x)
    }
}

impl MissHistoryRegister {
    /// Create a register with the specified length in bits.
    /// All bits in the register are initialized to zero (no misses).
    pub fn new(len: usize) -> Self {
        Self {
            data: bitvec![usize, Lsb0; 0; len],
            len,
        }
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn data(&self) -> &BitSlice<usize, Lsb0> { self.data.as_bitslice() }

    /// Shift in the outcome of the newest access. The oldest outcome is
    /// discarded.
    pub fn push(&mut self, miss: bool) {
        if self.len == 0 {
            return;
        }
        self.data.shift_right(1);
        self.data.set(0, miss);
    }

    /// Number of misses currently recorded.
    pub fn count_misses(&self) -> usize { self.data.count_ones() }

    /// Clear all recorded outcomes.
    pub fn reset(&mut self) { self.data.fill(false); }

    /// Append the register to a feature vector as +1.0 (miss) / -1.0 (hit).
    pub fn extend_features(&self, features: &mut Vec<f64>) {
        features.extend(self.data.iter().by_vals()
            .map(|b| if b { 1.0 } else { -1.0 }));
    }
}
