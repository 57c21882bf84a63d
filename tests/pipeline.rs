//! Assembling pipelines through the factory.

use las_pipeline::{
    dimension::{self, standard, DimensionId, DimensionType},
    point::{Format, LasDimensions},
    raw,
    readers::{LasReader, RasterReader, RasterSource},
    Error, ErrorKind, GroundKernel, Options, Pipeline, PointLayout, PointViewSet, Stage,
    StageFactory, StageKind,
};
use std::{
    fs,
    io::Cursor,
    ops::Range,
    path::PathBuf,
    sync::Arc,
};

fn las(format: u8, points: &[raw::Point]) -> Vec<u8> {
    let format = Format::new(format).unwrap();
    let mut bytes = Vec::new();
    raw::Header {
        point_data_record_format: format.code(),
        point_data_record_length: format.len(),
        number_of_point_records: points.len() as u32,
        ..Default::default()
    }
    .write_to(&mut bytes)
    .unwrap();
    for point in points {
        point.write_to(&mut bytes, format, 0).unwrap();
    }
    bytes
}

fn point(x: i32, z: i32) -> raw::Point {
    raw::Point {
        x,
        y: x * 2,
        z,
        flags: raw::Point::pack_flags(1, 1, 0, 0),
        gps_time: Some(f64::from(x) / 10.),
        ..Default::default()
    }
}

/// A file in the temp directory, removed on drop.
struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> TempFile {
        TempFile(std::env::temp_dir().join(format!(
            "las-pipeline-{}-{}.las",
            std::process::id(),
            name
        )))
    }

    fn path(&self) -> &str {
        self.0.to_str().unwrap()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn id(name: &str) -> DimensionId {
    dimension::id_of(name).unwrap()
}

#[test]
fn unknown_stage_type() {
    let mut pipeline = Pipeline::new(StageFactory::new());
    let reader = LasReader::new(Cursor::new(las(0, &[])), Options::new()).unwrap();
    let reader = pipeline.add_stage(Box::new(reader), Vec::new()).unwrap();
    let error = pipeline
        .make_filter("filters.outlier", &reader, Options::new())
        .unwrap_err();
    assert_eq!(ErrorKind::Assembly, error.kind());
    assert!(matches!(error, Error::UnknownStageType(name) if name == "filters.outlier"));
}

#[test]
fn layout_is_the_union_of_declared_dimensions() {
    let mut pipeline = Pipeline::new(StageFactory::new());
    let reader = LasReader::new(Cursor::new(las(0, &[point(1, 1)])), Options::new()).unwrap();
    let reader = pipeline.add_stage(Box::new(reader), Vec::new()).unwrap();
    let filter = pipeline
        .make_filter(
            "filters.range",
            &reader,
            Options::new().with("limits", "Intensity[0:10]"),
        )
        .unwrap();
    let writer = pipeline
        .make_writer("", &filter, Some("writers.null"), Options::new())
        .unwrap();
    pipeline.prepare(&writer).unwrap();
    let _ = pipeline.execute().unwrap();

    let mut expected = LasDimensions::register(Format::new(0).unwrap(), &mut PointLayout::new())
        .unwrap()
        .ids();
    expected.sort();
    let actual: Vec<_> = pipeline
        .table()
        .layout()
        .dimensions()
        .iter()
        .map(|detail| detail.id)
        .collect();
    assert_eq!(expected, actual);
    assert!(pipeline.table().layout().is_finalized());
}

#[test]
fn write_then_read() {
    let file = TempFile::new("write_then_read");
    let source = las(1, &[point(100, 5), point(300, -5), point(200, 0)]);

    let mut pipeline = Pipeline::new(StageFactory::new());
    let reader = LasReader::new(Cursor::new(source), Options::new()).unwrap();
    let reader = pipeline.add_stage(Box::new(reader), Vec::new()).unwrap();
    let writer = pipeline
        .make_writer(file.path(), &reader, None, Options::new())
        .unwrap();
    assert_eq!("writers.las", writer.name());
    pipeline.prepare(&writer).unwrap();
    assert_eq!(3, pipeline.execute().unwrap()[0].len());

    let reader = LasReader::from_options(&Options::new().with("filename", file.path())).unwrap();
    let header = reader.header();
    assert_eq!(3, header.point_format.code());
    assert_eq!(3, header.number_of_points);
    assert_eq!([3, 0, 0, 0, 0], header.number_of_points_by_return);
    assert_eq!(1., header.bounds.min.x);
    assert_eq!(3., header.bounds.max.x);
    assert!((header.bounds.min.z + 0.05).abs() < 1e-9);
    drop(reader);

    let mut pipeline = Pipeline::new(StageFactory::new());
    let reader = pipeline
        .make_reader(file.path(), None, Options::new())
        .unwrap();
    let filter = pipeline
        .make_filter(
            "filters.range",
            &reader,
            Options::new().with("limits", "X[150:]"),
        )
        .unwrap();
    let writer = pipeline
        .make_writer("", &filter, Some("writers.null"), Options::new())
        .unwrap();
    pipeline.prepare(&writer).unwrap();
    let views = pipeline.execute().unwrap();
    let view = &views[0];
    assert_eq!(2, view.len());
    assert_eq!(300, view.get::<i32>(id(standard::X), 0).unwrap());
    assert_eq!(600, view.get::<i32>(id(standard::Y), 0).unwrap());
    assert_eq!(20., view.get::<f64>(id(standard::GPS_TIME), 1).unwrap());
    assert_eq!(0u16, view.get(id(standard::RED), 1).unwrap());
}

#[test]
fn missing_file() {
    let mut pipeline = Pipeline::new(StageFactory::new());
    let error = pipeline
        .make_reader("/this/does/not/exist.las", None, Options::new())
        .unwrap_err();
    assert_eq!(ErrorKind::Resource, error.kind());
}

#[derive(Debug)]
struct Ramp;

impl RasterSource for Ramp {
    fn band_count(&self) -> usize {
        1
    }

    fn width(&self) -> usize {
        4
    }

    fn height(&self) -> usize {
        3
    }

    fn read_band(&mut self, _: usize, rows: Range<usize>) -> las_pipeline::Result<Vec<f64>> {
        Ok(rows
            .flat_map(|row| (0..4).map(move |column| (row * 4 + column) as f64))
            .collect())
    }
}

#[test]
fn raster_through_the_factory() {
    let mut factory = StageFactory::new();
    RasterReader::register(&mut factory, |filename| {
        assert_eq!("dem.tif", filename);
        Ok(Box::new(Ramp))
    });
    let mut pipeline = Pipeline::new(factory);
    let reader = pipeline
        .make_reader("dem.tif", Some("readers.raster"), Options::new())
        .unwrap();
    let filter = pipeline
        .make_filter(
            "filters.range",
            &reader,
            Options::new().with("limits", "Band1[6:]"),
        )
        .unwrap();
    let writer = pipeline
        .make_writer("", &filter, Some("writers.null"), Options::new())
        .unwrap();
    let info = reader.inspect().unwrap().unwrap();
    assert_eq!(12, info.point_count);
    assert_eq!(5, info.dimensions.len());
    assert!(writer.inspect().unwrap().is_none());
    pipeline.prepare(&writer).unwrap();
    let views = pipeline.execute().unwrap();
    let view = &views[0];
    assert_eq!(6, view.len());
    let layout = view.layout();
    let column = layout.find("Column").unwrap().id;
    let row = layout.find("Row").unwrap().id;
    assert_eq!(2u32, view.get(column, 0).unwrap());
    assert_eq!(1u32, view.get(row, 0).unwrap());
}

/// Marks points at or below `max_distance` as ground.
#[derive(Debug)]
struct Pmf {
    options: Options,
    max_distance: f64,
    z: Option<DimensionId>,
    classification: Option<DimensionId>,
}

impl Stage for Pmf {
    fn name(&self) -> &str {
        "filters.pmf"
    }

    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn add_dimensions(&mut self, layout: &mut PointLayout) -> las_pipeline::Result<()> {
        self.z = Some(layout.register(standard::Z, DimensionType::I32)?);
        self.classification = Some(layout.register(standard::CLASSIFICATION, DimensionType::U8)?);
        Ok(())
    }

    fn run(
        &mut self,
        mut views: PointViewSet,
        _: &Arc<PointLayout>,
    ) -> las_pipeline::Result<PointViewSet> {
        let (z, classification) = (self.z.unwrap(), self.classification.unwrap());
        for view in &mut views {
            for index in 0..view.len() {
                let height = f64::from(view.get::<i32>(z, index)?);
                let class = if height <= self.max_distance { 2u8 } else { 1 };
                view.set(classification, index, class)?;
            }
        }
        Ok(views)
    }
}

fn factory_with_pmf() -> StageFactory {
    let mut factory = StageFactory::new();
    factory.register("filters.pmf", |options| {
        options.check_known(
            "filters.pmf",
            &[
                "max_window_size",
                "slope",
                "max_distance",
                "initial_distance",
                "cell_size",
            ],
        )?;
        Ok(Box::new(Pmf {
            options: options.clone(),
            max_distance: options.get_f64("max_distance")?,
            z: None,
            classification: None,
        }))
    });
    factory
}

#[test]
fn ground_kernel() {
    let input = TempFile::new("ground_input");
    let points: Vec<_> = [0, 1, 2, 5, 10].into_iter().map(|z| point(z, z)).collect();
    fs::write(&input.0, las(0, &points)).unwrap();

    let output = TempFile::new("ground_all");
    let kernel = GroundKernel::new(input.path(), output.path());
    let views = kernel.execute(factory_with_pmf()).unwrap();
    assert_eq!(5, views[0].len());
    assert_eq!(2u8, views[0].get(id(standard::CLASSIFICATION), 2).unwrap());
    assert_eq!(1u8, views[0].get(id(standard::CLASSIFICATION), 3).unwrap());

    let extracted = TempFile::new("ground_extracted");
    let kernel = GroundKernel {
        extract: true,
        ..GroundKernel::new(input.path(), extracted.path())
    };
    assert_eq!(3, kernel.execute(factory_with_pmf()).unwrap()[0].len());
    let reader =
        LasReader::from_options(&Options::new().with("filename", extracted.path())).unwrap();
    assert_eq!(3, reader.header().number_of_points);
}

#[test]
fn ground_kernel_needs_pmf() {
    let input = TempFile::new("ground_needs_pmf");
    fs::write(&input.0, las(0, &[point(0, 0)])).unwrap();
    let kernel = GroundKernel::new(input.path(), "out.las");
    assert!(matches!(
        kernel.execute(StageFactory::new()),
        Err(Error::UnknownStageType(name)) if name == "filters.pmf"
    ));
}
