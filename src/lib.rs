//! Composable point cloud pipelines over a typed point schema, with an
//! [ASPRS LAS](https://www.asprs.org/committee-general/laser-las-file-format-exchange-activities.html)
//! decoder.
//!
//! # Points
//!
//! Per-point attributes are [dimensions](dimension). Each has a name, a stable id from a
//! process-wide registry, and a native type. The stages of a pipeline each declare the dimensions
//! they need; the union becomes the [PointLayout], and points are stored in [PointBuffer]s against
//! that layout:
//!
//! ```
//! use las_pipeline::{dimension::{standard, DimensionType}, PointBuffer, PointTable};
//! let mut table = PointTable::new();
//! let intensity = table
//!     .layout_mut()
//!     .register(standard::INTENSITY, DimensionType::U16)
//!     .unwrap();
//! let mut buffer = PointBuffer::new(table.finalize(), 10);
//! buffer.set(intensity, 0, 100u16).unwrap();
//! assert_eq!(100u16, buffer.get(intensity, 0).unwrap());
//! ```
//!
//! # Pipelines
//!
//! A [Pipeline] strings [Stage]s together. Stages are looked up by type name in a
//! [StageFactory], so a pipeline can be assembled from configuration:
//!
//! ```no_run
//! use las_pipeline::{Options, Pipeline, StageFactory};
//! let mut pipeline = Pipeline::new(StageFactory::new());
//! let reader = pipeline.make_reader("in.las", None, Options::new()).unwrap();
//! let filter = pipeline
//!     .make_filter("filters.range", &reader, Options::new().with("limits", "Classification[2:2]"))
//!     .unwrap();
//! let writer = pipeline.make_writer("out.las", &filter, None, Options::new()).unwrap();
//! pipeline.prepare(&writer).unwrap();
//! let views = pipeline.execute().unwrap();
//! ```
//!
//! Preparing a stage prepares everything upstream of it first. Executing always releases every
//! stage afterwards, even if a stage fails partway.
//!
//! # Built-in stages
//!
//! | Name | Stage |
//! | --- | --- |
//! | `readers.las` | [readers::LasReader] |
//! | `readers.raster` | [readers::RasterReader], registered with a source opener |
//! | `filters.range` | [filters::RangeFilter] |
//! | `writers.las` | [writers::LasWriter] |
//! | `writers.null` | [writers::NullWriter] |

#![deny(unsafe_code, unstable_features, unused_import_braces)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    unused_qualifications
)]

pub mod dimension;
pub mod filters;
pub mod point;
pub mod raw;
pub mod readers;
pub mod stage;
pub mod utils;
pub mod writers;

mod bounds;
mod buffer;
mod error;
mod header;
mod kernel;
mod layout;
mod options;
mod pipeline;
mod transform;
mod vector;
mod version;
mod vlr;

pub use crate::bounds::Bounds;
pub use crate::buffer::{PointBuffer, PointViewSet};
pub use crate::error::{Error, ErrorKind};
pub use crate::header::Header;
pub use crate::kernel::GroundKernel;
pub use crate::layout::{DimensionDetail, PointLayout, PointTable};
pub use crate::options::{OptionValue, Options};
pub use crate::pipeline::Pipeline;
pub use crate::point::Color;
pub use crate::stage::{QuickInfo, Stage, StageFactory, StageKind, StageRef, StageState};
pub use crate::transform::Transform;
pub use crate::vector::Vector;
pub use crate::version::Version;
pub use crate::vlr::Vlr;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
