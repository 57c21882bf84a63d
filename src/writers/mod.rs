//! Stages that write points out.

mod las;
mod null;

pub use self::las::LasWriter;
pub use self::null::NullWriter;
