//! Missing-value imputation strategies.

mod statistical;

pub use statistical::{MedianImputer, MostFrequentImputer};
