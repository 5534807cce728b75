
pub mod cache;
pub mod error;
pub mod history;
pub mod predictor;
pub mod stats;
pub mod trace;
pub mod word;

pub use cache::*;
pub use error::*;
pub use history::*;
pub use predictor::*;
pub use stats::*;
pub use trace::*;
pub use word::*;
