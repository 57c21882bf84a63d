//! Assembles and runs a stage graph.

use crate::{
    stage::{Stage, StageRef, StageState},
    Error, Options, PointTable, PointViewSet, Result, StageFactory,
};
use log::{debug, info, warn};

/// A stage graph with the table it runs against.
///
/// Stages are built through the pipeline's [StageFactory] or added directly. The last stage made
/// is the root: [Pipeline::prepare] and [Pipeline::execute] work from it upstream.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use las_pipeline::{readers::LasReader, Header, Options, Pipeline, StageFactory};
///
/// let mut cursor = Cursor::new(Vec::new());
/// Header::default().write_to(&mut cursor).unwrap();
/// cursor.set_position(0);
///
/// let mut pipeline = Pipeline::new(StageFactory::new());
/// let reader = LasReader::new(cursor, Options::new()).unwrap();
/// let reader = pipeline.add_stage(Box::new(reader), Vec::new()).unwrap();
/// let writer = pipeline.make_writer("", &reader, Some("writers.null"), Options::new()).unwrap();
/// pipeline.prepare(&writer).unwrap();
/// let views = pipeline.execute().unwrap();
/// assert_eq!(0, views[0].len());
/// ```
#[derive(Debug)]
pub struct Pipeline {
    factory: StageFactory,
    table: PointTable,
    root: Option<StageRef>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new(factory: StageFactory) -> Pipeline {
        Pipeline {
            factory,
            table: PointTable::new(),
            root: None,
        }
    }

    /// Makes a reader for a file.
    ///
    /// Without a driver, one is inferred from the file name. The file name is added to the
    /// options as `filename`.
    pub fn make_reader(
        &mut self,
        filename: &str,
        driver: Option<&str>,
        mut options: Options,
    ) -> Result<StageRef> {
        let driver = match driver {
            Some(driver) if !driver.is_empty() => driver,
            _ => StageFactory::infer_reader_driver(filename)?,
        };
        let _ = options.insert("filename", filename);
        let stage = self.factory.make(driver, &options, Vec::new())?;
        debug!("made {} for {}", driver, filename);
        Ok(self.set_root(stage))
    }

    /// Makes a filter fed by one upstream stage.
    pub fn make_filter(
        &mut self,
        name: &str,
        upstream: &StageRef,
        options: Options,
    ) -> Result<StageRef> {
        let stage = self.factory.make(name, &options, vec![upstream.clone()])?;
        Ok(self.set_root(stage))
    }

    /// Makes a writer for a file, fed by one upstream stage.
    ///
    /// Without a driver, one is inferred from the file name. A non-empty file name is added to the
    /// options as `filename`. If the upstream stage is already this writer, with the same
    /// options, it's returned as is and no stage is added.
    pub fn make_writer(
        &mut self,
        filename: &str,
        upstream: &StageRef,
        driver: Option<&str>,
        mut options: Options,
    ) -> Result<StageRef> {
        let driver = match driver {
            Some(driver) if !driver.is_empty() => driver,
            _ => StageFactory::infer_writer_driver(filename)?,
        };
        if !filename.is_empty() {
            let _ = options.insert("filename", filename);
        }
        if upstream.name() == driver && upstream.options()? == options {
            debug!("{} already ends the pipeline", driver);
            return Ok(self.set_root(upstream.clone()));
        }
        let stage = self.factory.make(driver, &options, vec![upstream.clone()])?;
        Ok(self.set_root(stage))
    }

    /// Adds a stage built outside the factory.
    pub fn add_stage(
        &mut self,
        stage: Box<dyn Stage>,
        upstream: Vec<StageRef>,
    ) -> Result<StageRef> {
        let stage = StageRef::new(stage, upstream)?;
        Ok(self.set_root(stage))
    }

    /// Prepares a stage and everything upstream of it, and makes it the root.
    ///
    /// If preparation fails every stage is released before the error is returned.
    pub fn prepare(&mut self, stage: &StageRef) -> Result<()> {
        let _ = self.set_root(stage.clone());
        if let Err(err) = stage.prepare(self.table.layout_mut()) {
            if let Err(done) = stage.done() {
                warn!("error while releasing after a failed prepare: {}", done);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Runs the prepared root stage, returning its points.
    ///
    /// The layout is finalized first. Every stage is released afterwards, whether or not the run
    /// succeeded; a release error is only returned if the run itself succeeded.
    pub fn execute(&mut self) -> Result<PointViewSet> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| Error::InvalidUpstream {
                stage: "pipeline".to_string(),
                count: 0,
            })?;
        let state = root.state();
        if state != StageState::Prepared {
            return Err(Error::InvalidStageState {
                stage: root.name().to_string(),
                state,
                action: "execute",
            });
        }
        let layout = self.table.finalize();
        info!(
            "executing {} with {} dimensions",
            root.name(),
            layout.dimensions().len()
        );
        let result = root.execute(&layout);
        let done = root.done();
        let views = result?;
        done?;
        info!(
            "{} points out of {}",
            views.iter().map(|view| view.len()).sum::<usize>(),
            root.name()
        );
        Ok(views)
    }

    /// Returns the root stage.
    pub fn root(&self) -> Option<&StageRef> {
        self.root.as_ref()
    }

    /// Returns the point table.
    pub fn table(&self) -> &PointTable {
        &self.table
    }

    /// Returns the factory, for registering more stages.
    pub fn factory_mut(&mut self) -> &mut StageFactory {
        &mut self.factory
    }

    fn set_root(&mut self, stage: StageRef) -> StageRef {
        self.root = Some(stage.clone());
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::tests::Counter;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn done_after_failed_execute() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut counter = Counter::new(2, &log);
        counter.fail_run = true;
        let mut pipeline = Pipeline::new(StageFactory::new());
        let reader = pipeline.add_stage(Box::new(counter), Vec::new()).unwrap();
        let writer = pipeline
            .make_writer("", &reader, Some("writers.null"), Options::new())
            .unwrap();
        pipeline.prepare(&writer).unwrap();
        let error = pipeline.execute().unwrap_err();
        assert!(matches!(error, Error::Stage { ref stage, .. } if stage == "readers.counter"));
        assert_eq!(StageState::Done, reader.state());
        assert_eq!(Some(&"counter done".to_string()), log.borrow().last());
    }

    #[test]
    fn execute_requires_prepare() {
        let log = Rc::default();
        let mut pipeline = Pipeline::new(StageFactory::new());
        let _ = pipeline
            .add_stage(Box::new(Counter::new(2, &log)), Vec::new())
            .unwrap();
        assert!(matches!(
            pipeline.execute(),
            Err(Error::InvalidStageState {
                state: StageState::Constructed,
                ..
            })
        ));
        assert!(matches!(
            Pipeline::new(StageFactory::new()).execute(),
            Err(Error::InvalidUpstream { .. })
        ));
    }

    #[test]
    fn writer_passthrough() {
        let log = Rc::default();
        let mut pipeline = Pipeline::new(StageFactory::new());
        let reader = pipeline
            .add_stage(Box::new(Counter::new(2, &log)), Vec::new())
            .unwrap();
        let writer = pipeline
            .make_writer("", &reader, Some("writers.null"), Options::new())
            .unwrap();
        let again = pipeline
            .make_writer("", &writer, Some("writers.null"), Options::new())
            .unwrap();
        assert!(again.ptr_eq(&writer));
        let filtered = pipeline
            .make_filter(
                "filters.range",
                &writer,
                Options::new().with("limits", "X[1:]"),
            )
            .unwrap();
        let last = pipeline
            .make_writer("", &filtered, Some("writers.null"), Options::new())
            .unwrap();
        assert!(!last.ptr_eq(&filtered));
        pipeline.prepare(&last).unwrap();
        let views = pipeline.execute().unwrap();
        assert_eq!(1, views[0].len());
    }

    #[test]
    fn reader_driver_inference() {
        let mut pipeline = Pipeline::new(StageFactory::new());
        assert!(matches!(
            pipeline.make_reader("points.xyz", None, Options::new()),
            Err(Error::NoDriver(_))
        ));
    }
}
