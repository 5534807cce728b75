//! Value predictors built on top of the history caches, and the miss
//! classifier used alongside them.

pub mod dfcm;
pub mod korder;
pub mod hash_on_hash;
pub mod svm;

pub use dfcm::*;
pub use korder::*;
pub use hash_on_hash::*;
pub use svm::*;
