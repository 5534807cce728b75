//! Fixed-width words used for addresses, deltas and keys.

use std::fmt::{Debug, Display, LowerHex};
use std::hash::Hash;
use std::ops::BitXor;

/// A machine word stored by the history caches.
///
/// Deltas between consecutive values are wrapping differences in the same
/// word type, so a predicted value is always `last + delta` (wrapping).
pub trait Word:
    Copy + Default + Eq + Ord + Hash + Debug + Display + LowerHex
    + BitXor<Output = Self>
{
    /// Width of the word in bits.
    const BITS: u32;

    fn zero() -> Self { Self::default() }
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Zero-extend into a 64-bit key.
    fn to_key(self) -> u64;

    /// Truncate a 64-bit value into this word.
    fn from_key(key: u64) -> Self;
}

macro_rules! impl_word {
    ($($ty:ty),*) => { $(
        impl Word for $ty {
            const BITS: u32 = <$ty>::BITS;
            fn wrapping_add(self, rhs: Self) -> Self { <$ty>::wrapping_add(self, rhs) }
            fn wrapping_sub(self, rhs: Self) -> Self { <$ty>::wrapping_sub(self, rhs) }
            fn to_key(self) -> u64 { self as u64 }
            fn from_key(key: u64) -> Self { key as $ty }
        }
    )* };
}

impl_word!(u32, u64);

/// A mask with the low `bits` bits set.
pub fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}
