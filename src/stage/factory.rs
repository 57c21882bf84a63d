use super::{Stage, StageRef};
use crate::{
    filters::RangeFilter,
    readers::LasReader,
    writers::{LasWriter, NullWriter},
    Error, Options, Result,
};
use std::{collections::HashMap, fmt, path::Path};

/// Builds a stage from its options.
pub type StageConstructor = Box<dyn Fn(&Options) -> Result<Box<dyn Stage>>>;

/// Resolves stage type names to constructors.
///
/// A new factory knows the built-in stages: `readers.las`, `filters.range`, `writers.las` and
/// `writers.null`. Anything else, such as a raster reader backed by an external library, is added
/// with [StageFactory::register].
///
/// # Examples
///
/// ```
/// use las_pipeline::{Options, StageFactory};
/// let factory = StageFactory::new();
/// let writer = factory.create("writers.null", &Options::new()).unwrap();
/// assert_eq!("writers.null", writer.name());
/// assert!(factory.create("filters.nope", &Options::new()).is_err());
/// ```
pub struct StageFactory {
    constructors: HashMap<String, StageConstructor>,
}

impl StageFactory {
    /// Creates a factory with the built-in stages registered.
    pub fn new() -> StageFactory {
        let mut factory = StageFactory::empty();
        factory.register(LasReader::NAME, |options| {
            Ok(Box::new(LasReader::from_options(options)?))
        });
        factory.register(RangeFilter::NAME, |options| {
            Ok(Box::new(RangeFilter::new(options)?))
        });
        factory.register(LasWriter::NAME, |options| {
            Ok(Box::new(LasWriter::from_options(options)?))
        });
        factory.register(NullWriter::NAME, |options| {
            Ok(Box::new(NullWriter::new(options)?))
        });
        factory
    }

    /// Creates a factory with nothing registered.
    pub fn empty() -> StageFactory {
        StageFactory {
            constructors: HashMap::new(),
        }
    }

    /// Registers a constructor, replacing any constructor with the same name.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Options) -> Result<Box<dyn Stage>> + 'static,
    {
        let _ = self
            .constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    /// Returns true if a stage type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Builds a stage.
    ///
    /// Fails with [Error::UnknownStageType] if nothing is registered under `name`. Errors from the
    /// constructor are tagged with the stage name.
    pub fn create(&self, name: &str, options: &Options) -> Result<Box<dyn Stage>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::UnknownStageType(name.to_string()))?;
        constructor(options).map_err(|err| err.in_stage(name))
    }

    /// Builds a stage and wires it to its upstream stages.
    pub fn make(&self, name: &str, options: &Options, upstream: Vec<StageRef>) -> Result<StageRef> {
        StageRef::new(self.create(name, options)?, upstream)
    }

    /// Picks a reader for a file name by its extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::StageFactory;
    /// assert_eq!("readers.las", StageFactory::infer_reader_driver("points.LAS").unwrap());
    /// assert!(StageFactory::infer_reader_driver("points.txt").is_err());
    /// ```
    pub fn infer_reader_driver(filename: &str) -> Result<&'static str> {
        match extension(filename).as_deref() {
            Some("las") => Ok(LasReader::NAME),
            _ => Err(Error::NoDriver(filename.to_string())),
        }
    }

    /// Picks a writer for a file name by its extension.
    pub fn infer_writer_driver(filename: &str) -> Result<&'static str> {
        match extension(filename).as_deref() {
            Some("las") => Ok(LasWriter::NAME),
            _ => Err(Error::NoDriver(filename.to_string())),
        }
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
}

impl Default for StageFactory {
    fn default() -> StageFactory {
        StageFactory::new()
    }
}

impl fmt::Debug for StageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("StageFactory")
            .field("stages", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins() {
        let factory = StageFactory::new();
        for name in ["readers.las", "filters.range", "writers.las", "writers.null"] {
            assert!(factory.contains(name), "{} is not registered", name);
        }
    }

    #[test]
    fn unknown_stage_type() {
        assert!(matches!(
            StageFactory::new().create("filters.pmf", &Options::new()),
            Err(Error::UnknownStageType(name)) if name == "filters.pmf"
        ));
    }

    #[test]
    fn constructor_errors_are_tagged() {
        let error = StageFactory::new()
            .create("readers.las", &Options::new())
            .unwrap_err();
        assert!(matches!(error, Error::Stage { ref stage, .. } if stage == "readers.las"));
        assert!(matches!(error.root(), Error::MissingOption(name) if name == "filename"));
    }

    #[test]
    fn no_driver() {
        assert!(matches!(
            StageFactory::infer_writer_driver("out"),
            Err(Error::NoDriver(_))
        ));
        assert_eq!("writers.las", StageFactory::infer_writer_driver("a/b.las").unwrap());
    }
}
