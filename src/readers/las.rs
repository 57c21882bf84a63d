use crate::{
    point::{LasDimensions, PointCodec},
    stage::{QuickInfo, Stage, StageKind},
    Error, Header, Options, PointBuffer, PointLayout, PointViewSet, Result,
};
use log::debug;
use std::{
    fmt,
    fs::File,
    io::{BufReader, Read, Seek},
    sync::Arc,
};

/// Points are decoded this many at a time.
const CHUNK_SIZE: u64 = 64 * 1024;

trait ReadSeek: Read + Seek {}

impl<R: Read + Seek> ReadSeek for R {}

/// Reads points from a las stream.
///
/// The header and vlrs are parsed when the reader is built, so a bad signature or an unsupported
/// point format fails before the pipeline is even prepared. The stream is held until
/// [Stage::done], which drops it exactly once.
///
/// # Options
///
/// - `filename`: the file to read, required when built from options.
/// - `count`: read at most this many points.
///
/// Any other option is rejected.
pub struct LasReader {
    options: Options,
    header: Header,
    stream: Option<Box<dyn ReadSeek>>,
    codec: Option<PointCodec>,
    limit: u64,
    index: u64,
}

impl LasReader {
    /// The stage type name.
    pub const NAME: &'static str = "readers.las";

    /// Opens the `filename` option as a buffered file and reads its header.
    pub fn from_options(options: &Options) -> Result<LasReader> {
        options.check_known(LasReader::NAME, &["filename", "count"])?;
        let filename = options.get_str("filename")?;
        let file = File::open(filename)?;
        debug!("opened {}", filename);
        LasReader::new(BufReader::new(file), options.clone())
    }

    /// Reads the header from a stream.
    ///
    /// The stream must be positioned at the start of the las data.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use las_pipeline::{readers::LasReader, Header, Options};
    /// let mut cursor = Cursor::new(Vec::new());
    /// Header::default().write_to(&mut cursor).unwrap();
    /// cursor.set_position(0);
    /// let reader = LasReader::new(cursor, Options::new()).unwrap();
    /// assert_eq!(0, reader.header().number_of_points);
    /// ```
    pub fn new<R: Read + Seek + 'static>(mut read: R, options: Options) -> Result<LasReader> {
        options.check_known(LasReader::NAME, &["filename", "count"])?;
        let header = Header::read_from(&mut read)?;
        let limit = match options.opt_u64("count")? {
            Some(count) => count.min(header.number_of_points),
            None => header.number_of_points,
        };
        Ok(LasReader {
            options,
            header,
            stream: Some(Box::new(read)),
            codec: None,
            limit,
            index: 0,
        })
    }

    /// Returns the parsed header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the number of points this reader will produce.
    pub fn point_count(&self) -> u64 {
        self.limit
    }

    /// Reads up to `max` points onto the end of the buffer, returning how many were read.
    ///
    /// Returns zero once every point has been read. Fails with [Error::StreamClosed] after
    /// [Stage::done], and with [Error::UnexpectedEndOfStream] if the stream is shorter than the
    /// header promised.
    pub fn read(&mut self, buffer: &mut PointBuffer, max: u64) -> Result<u64> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::StreamClosed(LasReader::NAME.to_string()))?;
        let codec = self.codec.as_ref().ok_or_else(|| Error::InvalidStageState {
            stage: LasReader::NAME.to_string(),
            state: crate::stage::StageState::Constructed,
            action: "read",
        })?;
        let count = max.min(self.limit - self.index);
        if count == 0 {
            return Ok(0);
        }
        let count = codec.read_points(&mut **stream, buffer, self.index, count)?;
        self.index += count;
        Ok(count)
    }
}

impl Stage for LasReader {
    fn name(&self) -> &str {
        LasReader::NAME
    }

    fn kind(&self) -> StageKind {
        StageKind::Reader
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

    fn run(&mut self, _: PointViewSet, layout: &Arc<PointLayout>) -> Result<PointViewSet> {
        let capacity = usize::try_from(self.limit - self.index).unwrap_or(usize::MAX);
        let mut buffer = PointBuffer::new(Arc::clone(layout), capacity);
        while self.read(&mut buffer, CHUNK_SIZE)? > 0 {}
        debug!("read {} points", buffer.len());
        Ok(vec![buffer])
    }

    fn done(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("closed las stream after {} points", self.index);
        }
        Ok(())
    }

    /// The point count honors the `count` option; the bounds are the header's.
    fn inspect(&self) -> Result<Option<QuickInfo>> {
        let mut layout = PointLayout::new();
        let _ = LasDimensions::register(self.header.point_format, &mut layout)?;
        Ok(Some(QuickInfo {
            point_count: self.limit,
            bounds: Some(self.header.bounds),
            dimensions: layout
                .dimensions()
                .iter()
                .map(|detail| detail.name.clone())
                .collect(),
        }))
    }
}

impl fmt::Debug for LasReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LasReader")
            .field("header", &self.header)
            .field("open", &self.stream.is_some())
            .field("limit", &self.limit)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{point::Format, raw, PointTable};
    use std::io::Cursor;

    fn las(format: u8, points: u32, record_bytes: usize) -> Cursor<Vec<u8>> {
        let format = Format::new(format).unwrap();
        let header = raw::Header {
            point_data_record_format: format.code(),
            point_data_record_length: format.len(),
            number_of_point_records: points,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        for x in 0..points {
            raw::Point {
                x: x as i32,
                ..Default::default()
            }
            .write_to(&mut bytes, format, 0)
            .unwrap();
        }
        bytes.truncate(227 + record_bytes);
        Cursor::new(bytes)
    }

    fn prepared(reader: &mut LasReader) -> Arc<PointLayout> {
        let mut table = PointTable::new();
        reader.add_dimensions(table.layout_mut()).unwrap();
        table.finalize()
    }

    #[test]
    fn reads_in_chunks() {
        let mut reader = LasReader::new(las(0, 5, 100), Options::new()).unwrap();
        let layout = prepared(&mut reader);
        let mut buffer = PointBuffer::new(Arc::clone(&layout), 5);
        assert_eq!(2, reader.read(&mut buffer, 2).unwrap());
        assert_eq!(3, reader.read(&mut buffer, 10).unwrap());
        assert_eq!(0, reader.read(&mut buffer, 10).unwrap());
        assert_eq!(5, buffer.len());
    }

    #[test]
    fn count_option() {
        let mut reader = LasReader::new(las(1, 5, 140), Options::new().with("count", 2)).unwrap();
        assert_eq!(2, reader.point_count());
        let layout = prepared(&mut reader);
        let views = reader.run(Vec::new(), &layout).unwrap();
        assert_eq!(2, views[0].len());
    }

    #[test]
    fn truncated() {
        let mut reader = LasReader::new(las(0, 3, 50), Options::new()).unwrap();
        let layout = prepared(&mut reader);
        let error = reader.run(Vec::new(), &layout).unwrap_err();
        assert!(matches!(error, Error::UnexpectedEndOfStream { point: 2 }));
    }

    #[test]
    fn closed() {
        let mut reader = LasReader::new(las(0, 3, 60), Options::new()).unwrap();
        let layout = prepared(&mut reader);
        reader.done().unwrap();
        reader.done().unwrap();
        let mut buffer = PointBuffer::new(layout, 3);
        assert!(matches!(
            reader.read(&mut buffer, 1),
            Err(Error::StreamClosed(_))
        ));
    }

    #[test]
    fn inspect() {
        let header = Header {
            point_format: Format::new(3).unwrap(),
            point_data_record_length: 34,
            number_of_points: 5,
            bounds: crate::Bounds {
                min: crate::Vector { x: 1., y: 2., z: 3. },
                max: crate::Vector { x: 4., y: 5., z: 6. },
            },
            ..Default::default()
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        let reader = LasReader::new(Cursor::new(bytes), Options::new().with("count", 2)).unwrap();

        let info = reader.inspect().unwrap().unwrap();
        assert_eq!(2, info.point_count);
        assert_eq!(Some(header.bounds), info.bounds);
        assert_eq!(16, info.dimensions.len());
        assert_eq!("X", info.dimensions[0]);
        assert!(info.dimensions.iter().any(|name| name == "GpsTime"));
        assert!(info.dimensions.iter().any(|name| name == "Blue"));
    }

    #[test]
    fn unknown_option() {
        assert!(matches!(
            LasReader::new(las(0, 0, 0), Options::new().with("colour", true)),
            Err(Error::UnknownOption { .. })
        ));
    }
}
