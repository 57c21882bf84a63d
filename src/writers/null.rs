use crate::{
    stage::{Stage, StageKind},
    Options, PointLayout, PointViewSet, Result,
};
use std::sync::Arc;

/// Discards nothing and writes nothing.
///
/// Used to terminate a pipeline whose output is consumed in memory. Takes no options.
#[derive(Debug)]
pub struct NullWriter {
    options: Options,
}

impl NullWriter {
    /// The stage type name.
    pub const NAME: &'static str = "writers.null";

    /// Creates a null writer.
    pub fn new(options: &Options) -> Result<NullWriter> {
        options.check_known(NullWriter::NAME, &[])?;
        Ok(NullWriter {
            options: options.clone(),
        })
    }
}

impl Stage for NullWriter {
    fn name(&self) -> &str {
        NullWriter::NAME
    }

    fn kind(&self) -> StageKind {
        StageKind::Writer
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn run(&mut self, views: PointViewSet, _: &Arc<PointLayout>) -> Result<PointViewSet> {
        Ok(views)
    }
}
