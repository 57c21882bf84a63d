//! Filter stages.

mod range;

pub use self::range::{DimensionRange, RangeFilter};
