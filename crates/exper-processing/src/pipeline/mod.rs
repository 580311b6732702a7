//! Column-wise preprocessing pipeline.
//!
//! [`ColumnTransformer`] is the bundled [`Preprocessor`]: an ordered set of
//! named sub-transforms plus a remainder policy, fitted once on training
//! data and then applied unchanged to every other split.

mod builder;
mod executor;
mod preprocessor;

pub use builder::{
    ColumnSelection, ColumnTransformer, ColumnTransformerBuilder, REMAINDER_NAME, Remainder,
    TransformerSpec,
};
pub use executor::{FittedColumnTransformer, FittedStep};
pub use preprocessor::Preprocessor;
