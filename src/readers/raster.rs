use crate::{
    dimension::{DimensionId, DimensionType},
    stage::{QuickInfo, Stage, StageKind},
    Bounds, Error, Options, PointBuffer, PointLayout, PointViewSet, Result, StageFactory, Vector,
};
use log::debug;
use std::{fmt, ops::Range, sync::Arc};

/// The column index of a cell.
pub const COLUMN: &str = "Column";
/// The row index of a cell.
pub const ROW: &str = "Row";
/// The world x of a cell's center.
pub const EASTING: &str = "Easting";
/// The world y of a cell's center.
pub const NORTHING: &str = "Northing";

/// Rows are read this many at a time.
const ROWS_PER_READ: usize = 64;

/// A gridded, multi-band data source, such as a raster opened by an external library.
///
/// Decoding the raster is the source's business; the reader only asks for whole rows of one band
/// at a time.
pub trait RasterSource: fmt::Debug {
    /// Returns the number of bands.
    fn band_count(&self) -> usize;

    /// Returns the number of columns.
    fn width(&self) -> usize;

    /// Returns the number of rows.
    fn height(&self) -> usize;

    /// Returns the affine transform from pixel to world coordinates.
    ///
    /// In the usual order: origin x, pixel width, row rotation, origin y, column rotation, pixel
    /// height.
    fn geo_transform(&self) -> [f64; 6] {
        [0., 1., 0., 0., 0., 1.]
    }

    /// Reads one band for a range of rows, row by row, as `width() * rows.len()` samples.
    ///
    /// Bands are counted from zero.
    fn read_band(&mut self, band: usize, rows: Range<usize>) -> Result<Vec<f64>>;

    /// Releases the source.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens a raster source from a file name.
pub type RasterOpener = Box<dyn Fn(&str) -> Result<Box<dyn RasterSource>>>;

/// Turns every cell of a raster into a point.
///
/// Each point gets its `Column` and `Row` (u32), the world coordinates of the cell center as
/// `Easting` and `Northing` (f64), and one f64 dimension per band, `Band1` through `BandN`.
/// Points come out row by row.
///
/// # Options
///
/// - `filename`: the raster to open, required when built through the factory.
///
/// Any other option is rejected.
pub struct RasterReader {
    options: Options,
    source: Option<Box<dyn RasterSource>>,
    dimensions: Option<RasterDimensions>,
    row: usize,
}

#[derive(Clone, Debug)]
struct RasterDimensions {
    column: DimensionId,
    row: DimensionId,
    easting: DimensionId,
    northing: DimensionId,
    bands: Vec<DimensionId>,
}

impl RasterReader {
    /// The stage type name.
    pub const NAME: &'static str = "readers.raster";

    /// Wraps an open source.
    pub fn new(source: Box<dyn RasterSource>, options: Options) -> Result<RasterReader> {
        options.check_known(RasterReader::NAME, &["filename"])?;
        debug!(
            "raster source: {} x {}, {} bands",
            source.width(),
            source.height(),
            source.band_count()
        );
        Ok(RasterReader {
            options,
            source: Some(source),
            dimensions: None,
            row: 0,
        })
    }

    /// Registers `readers.raster` with a factory, opening sources with `open`.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{readers::RasterReader, Error, StageFactory};
    /// let mut factory = StageFactory::new();
    /// RasterReader::register(&mut factory, |filename| Err(Error::NoDriver(filename.to_string())));
    /// assert!(factory.contains("readers.raster"));
    /// ```
    pub fn register<F>(factory: &mut StageFactory, open: F)
    where
        F: Fn(&str) -> Result<Box<dyn RasterSource>> + 'static,
    {
        let open: RasterOpener = Box::new(open);
        factory.register(RasterReader::NAME, move |options| {
            options.check_known(RasterReader::NAME, &["filename"])?;
            let source = open(options.get_str("filename")?)?;
            Ok(Box::new(RasterReader::new(source, options.clone())?))
        });
    }

    /// Reads up to `max` points, in whole rows, onto the end of the buffer.
    ///
    /// At least one row is read per call while rows remain. Returns zero when every row has been
    /// read.
    pub fn read(&mut self, buffer: &mut PointBuffer, max: u64) -> Result<u64> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::StreamClosed(RasterReader::NAME.to_string()))?;
        let dimensions = self
            .dimensions
            .as_ref()
            .ok_or_else(|| Error::InvalidStageState {
                stage: RasterReader::NAME.to_string(),
                state: crate::stage::StageState::Constructed,
                action: "read",
            })?;
        let (width, height) = (source.width(), source.height());
        if self.row >= height || width == 0 {
            return Ok(0);
        }
        let max_rows = usize::try_from(max / width as u64).unwrap_or(usize::MAX);
        let rows = self.row..height.min(self.row + max_rows.clamp(1, ROWS_PER_READ));

        let mut samples = Vec::with_capacity(dimensions.bands.len());
        for band in 0..dimensions.bands.len() {
            let band_samples = source.read_band(band, rows.clone())?;
            let expected = width * rows.len();
            if band_samples.len() != expected {
                return Err(Error::RasterSampleCount {
                    band,
                    expected,
                    found: band_samples.len(),
                });
            }
            samples.push(band_samples);
        }

        let gt = source.geo_transform();
        let mut count = 0;
        for (i, row) in rows.clone().enumerate() {
            for column in 0..width {
                let index = buffer.len();
                let (easting, northing) = world(&gt, column as f64 + 0.5, row as f64 + 0.5);
                buffer.set(dimensions.column, index, column as u32)?;
                buffer.set(dimensions.row, index, row as u32)?;
                buffer.set(dimensions.easting, index, easting)?;
                buffer.set(dimensions.northing, index, northing)?;
                for (&id, band_samples) in dimensions.bands.iter().zip(&samples) {
                    buffer.set(id, index, band_samples[i * width + column])?;
                }
                count += 1;
            }
        }
        self.row = rows.end;
        Ok(count)
    }
}

impl Stage for RasterReader {
    fn name(&self) -> &str {
        RasterReader::NAME
    }

    fn kind(&self) -> StageKind {
        StageKind::Reader
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn add_dimensions(&mut self, layout: &mut PointLayout) -> Result<()> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::StreamClosed(RasterReader::NAME.to_string()))?;
        let bands = (1..=source.band_count())
            .map(|n| layout.register(&format!("Band{}", n), DimensionType::F64))
            .collect::<Result<Vec<_>>>()?;
        self.dimensions = Some(RasterDimensions {
            column: layout.register(COLUMN, DimensionType::U32)?,
            row: layout.register(ROW, DimensionType::U32)?,
            easting: layout.register(EASTING, DimensionType::F64)?,
            northing: layout.register(NORTHING, DimensionType::F64)?,
            bands,
        });
        Ok(())
    }

    fn run(&mut self, _: PointViewSet, layout: &Arc<PointLayout>) -> Result<PointViewSet> {
        let capacity = self
            .source
            .as_ref()
            .map_or(0, |source| source.width() * source.height());
        let mut buffer = PointBuffer::new(Arc::clone(layout), capacity);
        while self.read(&mut buffer, capacity as u64)? > 0 {}
        Ok(vec![buffer])
    }

    fn done(&mut self) -> Result<()> {
        match self.source.take() {
            Some(mut source) => {
                debug!("closing raster source after {} rows", self.row);
                source.close()
            }
            None => Ok(()),
        }
    }

    /// The bounds are the raster's outer cell corners, at zero height.
    fn inspect(&self) -> Result<Option<QuickInfo>> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::StreamClosed(RasterReader::NAME.to_string()))?;
        let (width, height) = (source.width(), source.height());
        let gt = source.geo_transform();
        let bounds = (width > 0 && height > 0).then(|| {
            let mut bounds = Bounds::default();
            for (column, row) in [(0, 0), (width, 0), (0, height), (width, height)] {
                let (x, y) = world(&gt, column as f64, row as f64);
                bounds.grow(Vector { x, y, z: 0. });
            }
            bounds
        });
        let mut dimensions: Vec<String> = [COLUMN, ROW, EASTING, NORTHING]
            .iter()
            .map(|name| name.to_string())
            .collect();
        dimensions.extend((1..=source.band_count()).map(|n| format!("Band{}", n)));
        Ok(Some(QuickInfo {
            point_count: (width * height) as u64,
            bounds,
            dimensions,
        }))
    }
}

/// Pixel to world coordinates through a geo-transform.
fn world(gt: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (gt[0] + x * gt[1] + y * gt[2], gt[3] + x * gt[4] + y * gt[5])
}

impl fmt::Debug for RasterReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterReader")
            .field("source", &self.source)
            .field("row", &self.row)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointTable;
    use std::{cell::Cell, rc::Rc};

    #[derive(Debug)]
    struct Grid {
        width: usize,
        height: usize,
        closed: Rc<Cell<usize>>,
    }

    impl RasterSource for Grid {
        fn band_count(&self) -> usize {
            2
        }
        fn width(&self) -> usize {
            self.width
        }
        fn height(&self) -> usize {
            self.height
        }
        fn geo_transform(&self) -> [f64; 6] {
            [100., 2., 0., 50., 0., -2.]
        }
        fn read_band(&mut self, band: usize, rows: Range<usize>) -> Result<Vec<f64>> {
            let width = self.width;
            Ok(rows
                .flat_map(|row| {
                    (0..width).map(move |column| (band * 100 + row * 10 + column) as f64)
                })
                .collect())
        }
        fn close(&mut self) -> Result<()> {
            self.closed.set(self.closed.get() + 1);
            Ok(())
        }
    }

    fn reader(closed: &Rc<Cell<usize>>) -> RasterReader {
        let grid = Grid {
            width: 3,
            height: 2,
            closed: Rc::clone(closed),
        };
        RasterReader::new(Box::new(grid), Options::new()).unwrap()
    }

    #[test]
    fn cells_become_points() {
        let closed = Rc::default();
        let mut reader = reader(&closed);
        let mut table = PointTable::new();
        reader.add_dimensions(table.layout_mut()).unwrap();
        let layout = table.finalize();
        let views = reader.run(Vec::new(), &layout).unwrap();
        let buffer = &views[0];
        assert_eq!(6, buffer.len());

        let id = |name: &str| layout.find(name).unwrap().id;
        assert_eq!(2u32, buffer.get(id(COLUMN), 5).unwrap());
        assert_eq!(1u32, buffer.get(id(ROW), 5).unwrap());
        assert_eq!(105., buffer.get::<f64>(id(EASTING), 5).unwrap());
        assert_eq!(47., buffer.get::<f64>(id(NORTHING), 5).unwrap());
        assert_eq!(12., buffer.get::<f64>(id("Band1"), 5).unwrap());
        assert_eq!(112., buffer.get::<f64>(id("Band2"), 5).unwrap());
    }

    #[test]
    fn reads_whole_rows() {
        let closed = Rc::default();
        let mut reader = reader(&closed);
        let mut table = PointTable::new();
        reader.add_dimensions(table.layout_mut()).unwrap();
        let mut buffer = PointBuffer::new(table.finalize(), 6);
        assert_eq!(3, reader.read(&mut buffer, 1).unwrap());
        assert_eq!(3, reader.read(&mut buffer, 100).unwrap());
        assert_eq!(0, reader.read(&mut buffer, 100).unwrap());
    }

    #[test]
    fn inspect() {
        let closed = Rc::default();
        let mut reader = reader(&closed);
        let info = reader.inspect().unwrap().unwrap();
        assert_eq!(6, info.point_count);
        let bounds = info.bounds.unwrap();
        assert_eq!(Vector { x: 100., y: 46., z: 0. }, bounds.min);
        assert_eq!(Vector { x: 106., y: 50., z: 0. }, bounds.max);
        assert_eq!(
            vec!["Column", "Row", "Easting", "Northing", "Band1", "Band2"],
            info.dimensions
        );
        reader.done().unwrap();
        assert!(matches!(reader.inspect(), Err(Error::StreamClosed(_))));
    }

    #[test]
    fn closes_once() {
        let closed = Rc::default();
        let mut reader = reader(&closed);
        reader.done().unwrap();
        reader.done().unwrap();
        assert_eq!(1, closed.get());
    }
}
