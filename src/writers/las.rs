use crate::{
    point::{Format, LasDimensions, PointCodec},
    stage::{Stage, StageKind},
    Bounds, Error, Header, Options, PointLayout, PointViewSet, Result, Transform, Vector, Version,
};
use log::debug;
use std::{
    fmt,
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::PathBuf,
    sync::Arc,
};

const KNOWN_OPTIONS: &[&str] = &[
    "filename",
    "minor_version",
    "format",
    "scale_x",
    "scale_y",
    "scale_z",
    "offset_x",
    "offset_y",
    "offset_z",
];

trait WriteSeek: Write + Seek {}

impl<W: Write + Seek> WriteSeek for W {}

enum Sink {
    Path(PathBuf),
    Open { write: Box<dyn WriteSeek>, start: u64 },
    Closed,
}

/// Writes points to a las stream.
///
/// The header is written when the stage becomes ready and written again, with the final point
/// count and bounds, when the stage is done. Points pass through unchanged, so a writer can feed
/// further stages.
///
/// # Options
///
/// - `filename`: the file to write, required when built from options.
/// - `minor_version`: las 1.x, default 2.
/// - `format`: the point format, default 3.
/// - `scale_x`, `scale_y`, `scale_z`: default 0.01.
/// - `offset_x`, `offset_y`, `offset_z`: default 0.
///
/// Any other option is rejected.
pub struct LasWriter {
    options: Options,
    header: Header,
    sink: Sink,
    codec: Option<PointCodec>,
}

impl LasWriter {
    /// The stage type name.
    pub const NAME: &'static str = "writers.las";

    /// Creates a writer for the `filename` option.
    ///
    /// The file isn't created until the pipeline executes.
    pub fn from_options(options: &Options) -> Result<LasWriter> {
        let filename = PathBuf::from(options.get_str("filename")?);
        LasWriter::with_sink(Sink::Path(filename), options.clone())
    }

    /// Creates a writer for an open stream.
    pub fn new<W: Write + Seek + 'static>(write: W, options: Options) -> Result<LasWriter> {
        LasWriter::with_sink(
            Sink::Open {
                write: Box::new(write),
                start: 0,
            },
            options,
        )
    }

    fn with_sink(sink: Sink, options: Options) -> Result<LasWriter> {
        options.check_known(LasWriter::NAME, KNOWN_OPTIONS)?;
        let minor = options.opt_u64("minor_version")?.unwrap_or(2);
        let version = u8::try_from(minor)
            .map(|minor| Version::new(1, minor))
            .ok()
            .filter(Version::is_supported)
            .ok_or_else(|| Error::InvalidOption {
                option: "minor_version".to_string(),
                reason: format!("las 1.{} is not supported", minor),
            })?;
        let code = options.opt_u64("format")?.unwrap_or(3);
        let point_format = u8::try_from(code)
            .map_err(|_| Error::UnsupportedPointFormat(u8::MAX))
            .and_then(Format::new)?;
        let transform = |axis: &str| -> Result<Transform> {
            Ok(Transform {
                scale: options.opt_f64(&format!("scale_{}", axis))?.unwrap_or(0.01),
                offset: options.opt_f64(&format!("offset_{}", axis))?.unwrap_or(0.),
            })
        };
        let transforms = Vector {
            x: transform("x")?,
            y: transform("y")?,
            z: transform("z")?,
        };
        let header = Header {
            version,
            point_format,
            point_data_record_length: point_format.len(),
            transforms,
            offset_to_point_data: u64::from(version.header_size()),
            date: Some(chrono::Utc::now().date_naive()),
            ..Default::default()
        };
        Ok(LasWriter {
            options,
            header,
            sink,
            codec: None,
        })
    }

    /// Returns the header as it stands: final once the writer is done.
    pub fn header(&self) -> &Header {
        &self.header
    }

    fn open(&mut self) -> Result<&mut Box<dyn WriteSeek>> {
        if let Sink::Path(path) = &self.sink {
            let file = File::create(path)?;
            debug!("created {}", path.display());
            self.sink = Sink::Open {
                write: Box::new(BufWriter::new(file)),
                start: 0,
            };
        }
        match &mut self.sink {
            Sink::Open { write, .. } => Ok(write),
            _ => Err(Error::StreamClosed(LasWriter::NAME.to_string())),
        }
    }
}

impl Stage for LasWriter {
    fn name(&self) -> &str {
        LasWriter::NAME
    }

    fn kind(&self) -> StageKind {
        StageKind::Writer
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn add_dimensions(&mut self, layout: &mut PointLayout) -> Result<()> {
        let dimensions = LasDimensions::register(self.header.point_format, layout)?;
        self.codec = Some(PointCodec::new(
            self.header.point_format,
            self.header.point_data_record_length,
            dimensions,
        )?);
        Ok(())
    }

    fn ready(&mut self, _: &Arc<PointLayout>) -> Result<()> {
        let header = self.header.clone();
        let write = self.open()?;
        let start = write.stream_position()?;
        header.write_to(&mut *write)?;
        if let Sink::Open { start: s, .. } = &mut self.sink {
            *s = start;
        }
        Ok(())
    }

    fn run(&mut self, views: PointViewSet, _: &Arc<PointLayout>) -> Result<PointViewSet> {
        let codec = self.codec.ok_or_else(|| Error::InvalidStageState {
            stage: LasWriter::NAME.to_string(),
            state: crate::stage::StageState::Constructed,
            action: "write",
        })?;
        let dimensions = codec.dimensions();
        let transforms = self.header.transforms;
        let mut bounds = Bounds::default();
        let mut count = 0;
        let mut by_return = [0; 5];
        {
            let write = self.open()?;
            for view in &views {
                for index in 0..view.len() {
                    codec.encode(view, index, &mut *write)?;
                    bounds.grow(Vector {
                        x: transforms.x.direct(view.get(dimensions.x, index)?),
                        y: transforms.y.direct(view.get(dimensions.y, index)?),
                        z: transforms.z.direct(view.get(dimensions.z, index)?),
                    });
                    let return_number: u8 = view.get(dimensions.return_number, index)?;
                    if (1..=5).contains(&return_number) {
                        by_return[usize::from(return_number) - 1] += 1;
                    }
                    count += 1;
                }
            }
        }
        self.header.number_of_points += count;
        for (total, n) in self.header.number_of_points_by_return.iter_mut().zip(by_return) {
            *total += n;
        }
        if !bounds.is_empty() {
            let header_bounds = &mut self.header.bounds;
            header_bounds.grow(bounds.min);
            header_bounds.grow(bounds.max);
        }
        debug!("wrote {} points", count);
        Ok(views)
    }

    fn done(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.sink, Sink::Closed) {
            Sink::Open { mut write, start } => {
                let _ = write.seek(SeekFrom::Start(start))?;
                self.header.to_raw()?.write_to(&mut write)?;
                write.flush()?;
                debug!(
                    "closed las writer with {} points",
                    self.header.number_of_points
                );
                Ok(())
            }
            Sink::Path(_) | Sink::Closed => Ok(()),
        }
    }
}

impl fmt::Debug for LasWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match &self.sink {
            Sink::Path(path) => format!("{}", path.display()),
            Sink::Open { .. } => "open".to_string(),
            Sink::Closed => "closed".to_string(),
        };
        f.debug_struct("LasWriter")
            .field("header", &self.header)
            .field("sink", &sink)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let writer = LasWriter::from_options(&Options::new().with("filename", "out.las")).unwrap();
        assert_eq!(Version::new(1, 2), writer.header().version);
        assert_eq!(3, writer.header().point_format.code());
        assert_eq!(0.01, writer.header().transforms.z.scale);
    }

    #[test]
    fn bad_options() {
        let options = Options::new().with("filename", "out.las");
        assert!(matches!(
            LasWriter::from_options(&options.clone().with("format", 6)),
            Err(Error::UnsupportedPointFormat(6))
        ));
        assert!(matches!(
            LasWriter::from_options(&options.clone().with("minor_version", 9)),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            LasWriter::from_options(&options.with("compression", true)),
            Err(Error::UnknownOption { .. })
        ));
    }
}
