//! Reader stages.

mod las;
mod raster;

pub use self::las::LasReader;
pub use self::raster::{RasterOpener, RasterReader, RasterSource, COLUMN, EASTING, NORTHING, ROW};
