//! Ground classification as a ready-made pipeline.

use crate::{Options, Pipeline, PointViewSet, Result, StageFactory};
use log::info;

const KNOWN_OPTIONS: &[&str] = &[
    "input",
    "output",
    "max_window_size",
    "slope",
    "max_distance",
    "initial_distance",
    "cell_size",
    "extract",
];

/// Classifies ground points with a progressive morphological filter.
///
/// Builds `reader → filters.pmf → writer`, with a `filters.range` keeping only class 2 between
/// the ground filter and the writer when `extract` is set. Readers and writers are picked from
/// the file names.
///
/// The crate doesn't implement `filters.pmf`; register it with the factory before executing.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundKernel {
    /// The file to read.
    pub input: String,
    /// The file to write.
    pub output: String,
    /// Largest window, in cells.
    pub max_window_size: f64,
    /// Terrain slope.
    pub slope: f64,
    /// Largest height above the surface that still counts as ground.
    pub max_distance: f64,
    /// Starting height threshold.
    pub initial_distance: f64,
    /// Cell size.
    pub cell_size: f64,
    /// Write only the ground points?
    pub extract: bool,
}

impl GroundKernel {
    /// The kernel name.
    pub const NAME: &'static str = "kernels.ground";

    /// Creates a kernel with the default parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::GroundKernel;
    /// let kernel = GroundKernel::new("in.las", "out.las");
    /// assert_eq!(33., kernel.max_window_size);
    /// assert!(!kernel.extract);
    /// ```
    pub fn new(input: &str, output: &str) -> GroundKernel {
        GroundKernel {
            input: input.to_string(),
            output: output.to_string(),
            max_window_size: 33.,
            slope: 1.,
            max_distance: 2.5,
            initial_distance: 0.15,
            cell_size: 1.,
            extract: false,
        }
    }

    /// Creates a kernel from options.
    ///
    /// `input` and `output` are required; every parameter falls back to its default.
    pub fn from_options(options: &Options) -> Result<GroundKernel> {
        options.check_known(GroundKernel::NAME, KNOWN_OPTIONS)?;
        let defaults = GroundKernel::new(options.get_str("input")?, options.get_str("output")?);
        Ok(GroundKernel {
            max_window_size: options
                .opt_f64("max_window_size")?
                .unwrap_or(defaults.max_window_size),
            slope: options.opt_f64("slope")?.unwrap_or(defaults.slope),
            max_distance: options
                .opt_f64("max_distance")?
                .unwrap_or(defaults.max_distance),
            initial_distance: options
                .opt_f64("initial_distance")?
                .unwrap_or(defaults.initial_distance),
            cell_size: options.opt_f64("cell_size")?.unwrap_or(defaults.cell_size),
            extract: options.opt_bool("extract")?.unwrap_or(defaults.extract),
            ..defaults
        })
    }

    /// The options handed to `filters.pmf`.
    pub fn ground_options(&self) -> Options {
        Options::new()
            .with("max_window_size", self.max_window_size)
            .with("slope", self.slope)
            .with("max_distance", self.max_distance)
            .with("initial_distance", self.initial_distance)
            .with("cell_size", self.cell_size)
    }

    /// Builds the pipeline, runs it, and returns what the writer wrote.
    pub fn execute(&self, factory: StageFactory) -> Result<PointViewSet> {
        let mut pipeline = Pipeline::new(factory);
        let reader = pipeline.make_reader(&self.input, None, Options::new())?;
        let mut last = pipeline.make_filter("filters.pmf", &reader, self.ground_options())?;
        if self.extract {
            let range = Options::new().with("limits", "Classification[2:2]");
            last = pipeline.make_filter("filters.range", &last, range)?;
        }
        let writer = pipeline.make_writer(&self.output, &last, None, Options::new())?;
        pipeline.prepare(&writer)?;
        let views = pipeline.execute()?;
        info!("ground kernel wrote {}", self.output);
        Ok(views)
    }
}
