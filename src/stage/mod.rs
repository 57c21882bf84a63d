//! The stage graph.
//!
//! A pipeline is a graph of [Stage]s: readers produce points, filters transform them, writers
//! consume them. Stages are wrapped in [StageRef]s, which carry the upstream links and the
//! lifecycle state:
//!
//! 1. **Constructed**: the stage exists, options are parsed.
//! 2. **Prepared**: every upstream stage has been prepared, then this stage initialized and
//!    declared its dimensions.
//! 3. **Executing**: the layout is finalized and points have flowed through the stage.
//! 4. **Done**: resources are released.
//!
//! An upstream stage can feed more than one downstream stage. It's prepared and executed once, and
//! every consumer gets the same points.

mod factory;

pub use self::factory::{StageConstructor, StageFactory};

use crate::{Bounds, Error, Options, PointLayout, PointViewSet, Result};
use log::{debug, warn};
use std::{
    cell::{RefCell, RefMut},
    fmt,
    rc::Rc,
    sync::Arc,
};

/// What a stage does with points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// Produces points and takes no upstream stages.
    Reader,
    /// Transforms points from one or more upstream stages.
    Filter,
    /// Consumes points from one or more upstream stages.
    Writer,
}

/// Where a stage is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StageState {
    Constructed,
    Prepared,
    Executing,
    Done,
}

/// What a reader knows about its points before reading any of them.
#[derive(Clone, Debug, PartialEq)]
pub struct QuickInfo {
    /// The number of points the reader will produce.
    pub point_count: u64,
    /// Where the points are, if that's known up front.
    pub bounds: Option<Bounds>,
    /// The names of the dimensions the reader declares.
    pub dimensions: Vec<String>,
}

/// A pipeline node.
///
/// Only [Stage::name], [Stage::kind], [Stage::options] and [Stage::run] are required; the
/// lifecycle hooks default to doing nothing. [StageRef] calls the hooks in order and never calls
/// one twice.
pub trait Stage: fmt::Debug {
    /// The stage type name, e.g. `readers.las`.
    fn name(&self) -> &str;

    /// Is this a reader, filter or writer?
    fn kind(&self) -> StageKind;

    /// The options this stage was built with.
    fn options(&self) -> &Options;

    /// Acquires whatever the stage needs before declaring dimensions.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Declares the dimensions this stage reads or writes.
    ///
    /// Called after every upstream stage has declared its own, so a filter can look up what its
    /// readers provide.
    fn add_dimensions(&mut self, _layout: &mut PointLayout) -> Result<()> {
        Ok(())
    }

    /// Called once with the finalized layout, right before the first [Stage::run].
    fn ready(&mut self, _layout: &Arc<PointLayout>) -> Result<()> {
        Ok(())
    }

    /// Moves points through this stage.
    ///
    /// `views` holds everything the upstream stages produced, in upstream order. Readers get an
    /// empty set.
    fn run(&mut self, views: PointViewSet, layout: &Arc<PointLayout>) -> Result<PointViewSet>;

    /// Releases resources.
    fn done(&mut self) -> Result<()> {
        Ok(())
    }

    /// Summarizes the points without reading them.
    ///
    /// Only readers know this much ahead of time; everything else returns `None`.
    fn inspect(&self) -> Result<Option<QuickInfo>> {
        Ok(None)
    }
}

/// A shared handle to a stage and its upstream links.
///
/// Cloning a `StageRef` shares the stage; it never copies it.
#[derive(Clone)]
pub struct StageRef(Rc<StageCell>);

struct StageCell {
    name: String,
    node: RefCell<StageNode>,
}

#[derive(Debug)]
struct StageNode {
    stage: Box<dyn Stage>,
    upstream: Vec<StageRef>,
    state: StageState,
    consumers: usize,
    pending: usize,
    output: Option<PointViewSet>,
}

impl StageRef {
    /// Wraps a stage, wiring it to its upstream stages.
    ///
    /// Readers take no upstream stages; filters and writers take at least one.
    pub fn new(stage: Box<dyn Stage>, upstream: Vec<StageRef>) -> Result<StageRef> {
        let valid = match stage.kind() {
            StageKind::Reader => upstream.is_empty(),
            StageKind::Filter | StageKind::Writer => !upstream.is_empty(),
        };
        if !valid {
            return Err(Error::InvalidUpstream {
                stage: stage.name().to_string(),
                count: upstream.len(),
            });
        }
        for upstream_stage in &upstream {
            upstream_stage.node()?.consumers += 1;
        }
        Ok(StageRef(Rc::new(StageCell {
            name: stage.name().to_string(),
            node: RefCell::new(StageNode {
                stage,
                upstream,
                state: StageState::Constructed,
                consumers: 0,
                pending: 0,
                output: None,
            }),
        })))
    }

    /// Returns the stage type name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> StageState {
        self.0
            .node
            .try_borrow()
            .map(|node| node.state)
            .unwrap_or(StageState::Executing)
    }

    /// Returns the stage kind.
    pub fn kind(&self) -> Result<StageKind> {
        Ok(self.node()?.stage.kind())
    }

    /// Returns a copy of the stage's options.
    pub fn options(&self) -> Result<Options> {
        Ok(self.node()?.stage.options().clone())
    }

    /// Returns the upstream stages.
    pub fn upstream(&self) -> Result<Vec<StageRef>> {
        Ok(self.node()?.upstream.clone())
    }

    /// Summarizes the stage's points without reading them, see [Stage::inspect].
    pub fn inspect(&self) -> Result<Option<QuickInfo>> {
        self.node()?
            .stage
            .inspect()
            .map_err(|err| err.in_stage(self.name()))
    }

    /// Returns true if both handles point to the same stage.
    pub fn ptr_eq(&self, other: &StageRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Prepares every upstream stage, then this one.
    ///
    /// A stage that's already prepared is skipped, so a shared upstream stage is only prepared
    /// once.
    pub fn prepare(&self, layout: &mut PointLayout) -> Result<()> {
        let mut node = self.node()?;
        match node.state {
            StageState::Constructed => {}
            StageState::Prepared => return Ok(()),
            state => return Err(self.invalid_state(state, "prepare")),
        }
        for upstream in node.upstream.clone() {
            upstream.prepare(layout)?;
        }
        let name = self.name();
        node.stage.initialize().map_err(|err| err.in_stage(name))?;
        node.stage
            .add_dimensions(layout)
            .map_err(|err| err.in_stage(name))?;
        node.state = StageState::Prepared;
        debug!("prepared {}", name);
        Ok(())
    }

    /// Runs the graph up to and including this stage.
    ///
    /// Every stage must have been prepared and the layout finalized. Upstream stages are executed
    /// first; a stage feeding several consumers runs once and hands each consumer the same views.
    pub fn execute(&self, layout: &Arc<PointLayout>) -> Result<PointViewSet> {
        let mut node = self.node()?;
        let name = self.name();
        match node.state {
            StageState::Prepared => {}
            StageState::Executing if node.output.is_some() => return Ok(node.take_output()),
            state => return Err(self.invalid_state(state, "execute")),
        }
        node.stage.ready(layout).map_err(|err| err.in_stage(name))?;
        node.state = StageState::Executing;
        debug!("executing {}", name);
        let mut views = PointViewSet::new();
        for upstream in node.upstream.clone() {
            views.extend(upstream.execute(layout)?);
        }
        let output = node
            .stage
            .run(views, layout)
            .map_err(|err| err.in_stage(name))?;
        node.pending = node.consumers.max(1);
        node.output = Some(output);
        Ok(node.take_output())
    }

    /// Releases this stage, then every upstream stage.
    ///
    /// Every prepared stage is released even if an earlier release fails; the first failure is
    /// returned. Calling this on a stage that's already done does nothing.
    pub fn done(&self) -> Result<()> {
        let mut node = self.node()?;
        let name = self.name();
        let mut result = match node.state {
            StageState::Prepared | StageState::Executing => {
                node.state = StageState::Done;
                node.output = None;
                debug!("done with {}", name);
                node.stage.done().map_err(|err| err.in_stage(name))
            }
            StageState::Constructed => Ok(()),
            StageState::Done => return Ok(()),
        };
        for upstream in node.upstream.clone() {
            if let Err(err) = upstream.done() {
                if result.is_ok() {
                    result = Err(err);
                } else {
                    warn!("error while releasing {}: {}", upstream.name(), err);
                }
            }
        }
        result
    }

    fn node(&self) -> Result<RefMut<'_, StageNode>> {
        self.0
            .node
            .try_borrow_mut()
            .map_err(|_| Error::CyclicUpstream(self.name().to_string()))
    }

    fn invalid_state(&self, state: StageState, action: &'static str) -> Error {
        Error::InvalidStageState {
            stage: self.name().to_string(),
            state,
            action,
        }
    }
}

impl StageNode {
    fn take_output(&mut self) -> PointViewSet {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.output.take().unwrap_or_default()
        } else {
            self.output.clone().unwrap_or_default()
        }
    }
}

impl fmt::Debug for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRef")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
