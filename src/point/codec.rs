use super::Format;
use crate::{
    buffer::absent,
    dimension::{standard, DimensionId, DimensionType},
    raw, Color, Error, PointBuffer, PointLayout, Result,
};
use std::io::{ErrorKind, Read, Write};

/// The dimension ids a las point format writes to.
///
/// Resolved once per reader, so the per-record decode loop never looks anything up by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LasDimensions {
    pub x: DimensionId,
    pub y: DimensionId,
    pub z: DimensionId,
    pub intensity: DimensionId,
    pub return_number: DimensionId,
    pub number_of_returns: DimensionId,
    pub scan_direction_flag: DimensionId,
    pub edge_of_flight_line: DimensionId,
    pub classification: DimensionId,
    pub scan_angle_rank: DimensionId,
    pub user_data: DimensionId,
    pub point_source_id: DimensionId,
    /// Only for formats with gps time.
    pub gps_time: Option<DimensionId>,
    /// Red, green and blue, only for formats with color.
    pub color: Option<[DimensionId; 3]>,
}

impl LasDimensions {
    /// Registers every dimension the format carries and adds them to the layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{point::{Format, LasDimensions}, PointLayout};
    /// let mut layout = PointLayout::new();
    /// let dimensions = LasDimensions::register(Format::new(1).unwrap(), &mut layout).unwrap();
    /// assert!(dimensions.gps_time.is_some());
    /// assert!(dimensions.color.is_none());
    /// assert_eq!(13, layout.dimensions().len());
    /// ```
    pub fn register(format: Format, layout: &mut PointLayout) -> Result<LasDimensions> {
        use DimensionType::*;
        let gps_time = if format.has_gps_time() {
            Some(layout.register(standard::GPS_TIME, F64)?)
        } else {
            None
        };
        let color = if format.has_color() {
            Some([
                layout.register(standard::RED, U16)?,
                layout.register(standard::GREEN, U16)?,
                layout.register(standard::BLUE, U16)?,
            ])
        } else {
            None
        };
        Ok(LasDimensions {
            x: layout.register(standard::X, I32)?,
            y: layout.register(standard::Y, I32)?,
            z: layout.register(standard::Z, I32)?,
            intensity: layout.register(standard::INTENSITY, U16)?,
            return_number: layout.register(standard::RETURN_NUMBER, U8)?,
            number_of_returns: layout.register(standard::NUMBER_OF_RETURNS, U8)?,
            scan_direction_flag: layout.register(standard::SCAN_DIRECTION_FLAG, U8)?,
            edge_of_flight_line: layout.register(standard::EDGE_OF_FLIGHT_LINE, U8)?,
            classification: layout.register(standard::CLASSIFICATION, U8)?,
            scan_angle_rank: layout.register(standard::SCAN_ANGLE_RANK, I8)?,
            user_data: layout.register(standard::USER_DATA, U8)?,
            point_source_id: layout.register(standard::POINT_SOURCE_ID, U16)?,
            gps_time,
            color,
        })
    }

    /// Returns every id, in no particular order.
    pub fn ids(&self) -> Vec<DimensionId> {
        self.typed().into_iter().map(|(id, _)| id).collect()
    }

    /// Returns every id with the type the codec reads and writes it as.
    pub fn typed(&self) -> Vec<(DimensionId, DimensionType)> {
        use DimensionType::*;
        let mut typed = vec![
            (self.x, I32),
            (self.y, I32),
            (self.z, I32),
            (self.intensity, U16),
            (self.return_number, U8),
            (self.number_of_returns, U8),
            (self.scan_direction_flag, U8),
            (self.edge_of_flight_line, U8),
            (self.classification, U8),
            (self.scan_angle_rank, I8),
            (self.user_data, U8),
            (self.point_source_id, U16),
        ];
        typed.extend(self.gps_time.map(|id| (id, F64)));
        if let Some(color) = self.color {
            typed.extend(color.map(|id| (id, U16)));
        }
        typed
    }
}

/// Decodes and encodes fixed-size las point records against a point buffer.
#[derive(Clone, Copy, Debug)]
pub struct PointCodec {
    format: Format,
    record_length: u16,
    dimensions: LasDimensions,
}

impl PointCodec {
    /// Creates a codec.
    ///
    /// `record_length` is the header's point data record length. It may be longer than the
    /// format's nominal length; the surplus extra bytes are skipped on read and zero-filled on
    /// write.
    pub fn new(
        format: Format,
        record_length: u16,
        dimensions: LasDimensions,
    ) -> Result<PointCodec> {
        if record_length < format.len() {
            return Err(Error::InvalidPointDataRecordLength {
                format,
                len: record_length,
            });
        }
        if format.has_gps_time() != dimensions.gps_time.is_some()
            || format.has_color() != dimensions.color.is_some()
        {
            return Err(Error::DimensionAbsent(format!("the optional fields of {}", format)));
        }
        Ok(PointCodec {
            format,
            record_length,
            dimensions,
        })
    }

    /// Returns the point format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the record length, including extra bytes.
    pub fn record_length(&self) -> u16 {
        self.record_length
    }

    /// Returns the dimension ids this codec reads and writes.
    pub fn dimensions(&self) -> &LasDimensions {
        &self.dimensions
    }

    /// Returns the number of extra bytes at the end of each record.
    pub fn extra_bytes(&self) -> u16 {
        self.record_length - self.format.len()
    }

    /// Checks that the layout holds every dimension this codec writes, with the right type.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{point::{Format, LasDimensions, PointCodec}, PointLayout};
    /// let format = Format::new(0).unwrap();
    /// let mut layout = PointLayout::new();
    /// let dimensions = LasDimensions::register(format, &mut layout).unwrap();
    /// let codec = PointCodec::new(format, format.len(), dimensions).unwrap();
    /// assert!(codec.check_layout(&layout).is_ok());
    /// assert!(codec.check_layout(&PointLayout::new()).is_err());
    /// ```
    pub fn check_layout(&self, layout: &PointLayout) -> Result<()> {
        for (id, ty) in self.dimensions.typed() {
            let detail = layout.dimension(id).ok_or_else(|| absent(id))?;
            if detail.ty != ty {
                return Err(Error::TypeMismatch {
                    name: detail.name.clone(),
                    existing: detail.ty,
                    requested: ty,
                });
            }
        }
        Ok(())
    }

    /// Reads `count` records and appends them to the buffer.
    ///
    /// `first` is the file index of the first record, used for error reporting. If the stream
    /// runs out partway through a record this fails with [Error::UnexpectedEndOfStream]; every
    /// record before that one has been appended, and nothing after it. The buffer's layout is
    /// checked before anything is read, so a layout missing one of the codec's dimensions leaves
    /// the buffer untouched.
    pub fn read_points<R: Read>(
        &self,
        mut read: R,
        buffer: &mut PointBuffer,
        first: u64,
        count: u64,
    ) -> Result<u64> {
        self.check_layout(buffer.layout())?;
        let mut record = vec![0; usize::from(self.record_length)];
        for n in 0..count {
            if let Err(err) = read.read_exact(&mut record) {
                return Err(if err.kind() == ErrorKind::UnexpectedEof {
                    Error::UnexpectedEndOfStream { point: first + n }
                } else {
                    err.into()
                });
            }
            let index = buffer.len();
            self.decode_checked(&record, buffer, index)?;
        }
        Ok(count)
    }

    /// Decodes one record into the buffer at `index`.
    ///
    /// When `index == buffer.len()` the point is appended. The record and the buffer's layout are
    /// both checked before the first field is written, so a failure never leaves a half-written
    /// point behind.
    pub fn decode(&self, record: &[u8], buffer: &mut PointBuffer, index: usize) -> Result<()> {
        self.check_layout(buffer.layout())?;
        self.decode_checked(record, buffer, index)
    }

    fn decode_checked(&self, record: &[u8], buffer: &mut PointBuffer, index: usize) -> Result<()> {
        let point = raw::Point::decode(record, self.format)?;
        let (len, capacity) = (buffer.len(), buffer.capacity());
        if index >= capacity && index >= len {
            return Err(Error::CapacityExceeded { index, capacity });
        } else if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let d = &self.dimensions;
        buffer.set(d.x, index, point.x)?;
        buffer.set(d.y, index, point.y)?;
        buffer.set(d.z, index, point.z)?;
        buffer.set(d.intensity, index, point.intensity)?;
        buffer.set(d.return_number, index, point.return_number())?;
        buffer.set(d.number_of_returns, index, point.number_of_returns())?;
        buffer.set(d.scan_direction_flag, index, point.scan_direction_flag())?;
        buffer.set(d.edge_of_flight_line, index, point.edge_of_flight_line())?;
        buffer.set(d.classification, index, point.classification)?;
        buffer.set(d.scan_angle_rank, index, point.scan_angle_rank)?;
        buffer.set(d.user_data, index, point.user_data)?;
        buffer.set(d.point_source_id, index, point.point_source_id)?;
        if let (Some(id), Some(gps_time)) = (d.gps_time, point.gps_time) {
            buffer.set(id, index, gps_time)?;
        }
        if let (Some([red, green, blue]), Some(color)) = (d.color, point.color) {
            buffer.set(red, index, color.red)?;
            buffer.set(green, index, color.green)?;
            buffer.set(blue, index, color.blue)?;
        }
        Ok(())
    }

    /// Encodes the point at `index` as one record.
    pub fn encode<W: Write>(&self, buffer: &PointBuffer, index: usize, write: W) -> Result<()> {
        let d = &self.dimensions;
        let gps_time = d.gps_time.map(|id| buffer.get(id, index)).transpose()?;
        let color = match d.color {
            Some([red, green, blue]) => Some(Color::new(
                buffer.get(red, index)?,
                buffer.get(green, index)?,
                buffer.get(blue, index)?,
            )),
            None => None,
        };
        let point = raw::Point {
            x: buffer.get(d.x, index)?,
            y: buffer.get(d.y, index)?,
            z: buffer.get(d.z, index)?,
            intensity: buffer.get(d.intensity, index)?,
            flags: raw::Point::pack_flags(
                buffer.get(d.return_number, index)?,
                buffer.get(d.number_of_returns, index)?,
                buffer.get(d.scan_direction_flag, index)?,
                buffer.get(d.edge_of_flight_line, index)?,
            ),
            classification: buffer.get(d.classification, index)?,
            scan_angle_rank: buffer.get(d.scan_angle_rank, index)?,
            user_data: buffer.get(d.user_data, index)?,
            point_source_id: buffer.get(d.point_source_id, index)?,
            gps_time,
            color,
        };
        point.write_to(write, self.format, self.extra_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointTable;
    use std::io::Cursor;

    fn setup(code: u8, capacity: usize) -> (PointCodec, PointBuffer) {
        let format = Format::new(code).unwrap();
        let mut table = PointTable::new();
        let dimensions = LasDimensions::register(format, table.layout_mut()).unwrap();
        let codec = PointCodec::new(format, format.len(), dimensions).unwrap();
        (codec, PointBuffer::new(table.finalize(), capacity))
    }

    fn record(code: u8) -> Vec<u8> {
        let format = Format::new(code).unwrap();
        let point = raw::Point {
            x: -1,
            y: 2,
            z: i32::MAX,
            intensity: 300,
            flags: raw::Point::pack_flags(2, 3, 1, 0),
            classification: 2,
            scan_angle_rank: -90,
            user_data: 7,
            point_source_id: 42,
            gps_time: Some(123.25),
            color: Some(Color::new(1, 2, u16::MAX)),
        };
        let mut bytes = Vec::new();
        point.write_to(&mut bytes, format, 0).unwrap();
        bytes
    }

    #[test]
    fn packed_flags_roundtrip_every_combination() {
        let (codec, mut buffer) = setup(0, 8 * 8 * 2 * 2);
        let d = codec.dimensions;
        let mut combinations = Vec::new();
        for return_number in 0..8u8 {
            for number_of_returns in 0..8u8 {
                for scan_direction_flag in 0..2u8 {
                    for edge in 0..2u8 {
                        combinations.push((
                            return_number,
                            number_of_returns,
                            scan_direction_flag,
                            edge,
                        ));
                    }
                }
            }
        }
        for (i, &(r, n, s, e)) in combinations.iter().enumerate() {
            buffer.set(d.x, i, i as i32).unwrap();
            buffer.set(d.return_number, i, r).unwrap();
            buffer.set(d.number_of_returns, i, n).unwrap();
            buffer.set(d.scan_direction_flag, i, s).unwrap();
            buffer.set(d.edge_of_flight_line, i, e).unwrap();
        }
        let mut bytes = Vec::new();
        for i in 0..buffer.len() {
            codec.encode(&buffer, i, &mut bytes).unwrap();
        }
        assert_eq!(combinations.len() * 20, bytes.len());

        let mut decoded = PointBuffer::new(buffer.layout().clone(), combinations.len());
        let count = codec
            .read_points(Cursor::new(bytes), &mut decoded, 0, combinations.len() as u64)
            .unwrap();
        assert_eq!(combinations.len() as u64, count);
        for (i, &(r, n, s, e)) in combinations.iter().enumerate() {
            assert_eq!(i as i32, decoded.get::<i32>(d.x, i).unwrap());
            assert_eq!(r, decoded.get::<u8>(d.return_number, i).unwrap());
            assert_eq!(n, decoded.get::<u8>(d.number_of_returns, i).unwrap());
            assert_eq!(s, decoded.get::<u8>(d.scan_direction_flag, i).unwrap());
            assert_eq!(e, decoded.get::<u8>(d.edge_of_flight_line, i).unwrap());
        }
    }

    #[test]
    fn format_3_and_format_0_share_fields() {
        let (codec3, mut buffer3) = setup(3, 1);
        let (codec0, mut buffer0) = setup(0, 1);
        codec3.decode(&record(3), &mut buffer3, 0).unwrap();
        codec0.decode(&record(0), &mut buffer0, 0).unwrap();
        let d = codec3.dimensions;
        for id in codec0.dimensions.ids() {
            assert_eq!(buffer0.get_f64(id, 0).unwrap(), buffer3.get_f64(id, 0).unwrap());
        }
        assert_eq!(-1, buffer3.get::<i32>(d.x, 0).unwrap());
        assert_eq!(i32::MAX, buffer3.get::<i32>(d.z, 0).unwrap());
        assert_eq!(-90, buffer3.get::<i8>(d.scan_angle_rank, 0).unwrap());
        assert_eq!(123.25, buffer3.get::<f64>(d.gps_time.unwrap(), 0).unwrap());
        let [red, green, blue] = d.color.unwrap();
        assert_eq!(1, buffer3.get::<u16>(red, 0).unwrap());
        assert_eq!(2, buffer3.get::<u16>(green, 0).unwrap());
        assert_eq!(u16::MAX, buffer3.get::<u16>(blue, 0).unwrap());
    }

    #[test]
    fn extra_bytes_are_skipped() {
        let format = Format::new(1).unwrap();
        let mut table = PointTable::new();
        let dimensions = LasDimensions::register(format, table.layout_mut()).unwrap();
        let codec = PointCodec::new(format, format.len() + 5, dimensions).unwrap();
        let mut buffer = PointBuffer::new(table.finalize(), 2);
        let mut bytes = Vec::new();
        for x in [10, 20] {
            raw::Point {
                x,
                gps_time: Some(f64::from(x)),
                ..Default::default()
            }
            .write_to(&mut bytes, format, 5)
            .unwrap();
        }
        let _ = codec.read_points(&bytes[..], &mut buffer, 0, 2).unwrap();
        assert_eq!(20, buffer.get::<i32>(dimensions.x, 1).unwrap());
        assert_eq!(20., buffer.get::<f64>(dimensions.gps_time.unwrap(), 1).unwrap());
    }

    #[test]
    fn short_read_stops_at_the_truncated_record() {
        let (codec, mut buffer) = setup(3, 3);
        let mut bytes = Vec::new();
        for _ in 0..3 {
            bytes.extend(record(3));
        }
        bytes.truncate(bytes.len() - 5);
        let error = codec.read_points(&bytes[..], &mut buffer, 10, 3).unwrap_err();
        assert!(matches!(error, Error::UnexpectedEndOfStream { point: 12 }));
        assert_eq!(2, buffer.len());
    }

    #[test]
    fn layout_missing_a_dimension_appends_nothing() {
        let format = Format::new(0).unwrap();
        let mut layout = PointLayout::new();
        let dimensions = LasDimensions::register(format, &mut layout).unwrap();
        let codec = PointCodec::new(format, format.len(), dimensions).unwrap();
        let mut table = PointTable::new();
        let _ = table.layout_mut().add(dimensions.x).unwrap();
        let mut buffer = PointBuffer::new(table.finalize(), 2);

        let error = codec.read_points(&record(0)[..], &mut buffer, 0, 1).unwrap_err();
        assert!(matches!(error, Error::DimensionAbsent(name) if name == "Y"));
        assert_eq!(0, buffer.len());
        assert!(codec.decode(&record(0), &mut buffer, 0).is_err());
        assert_eq!(0, buffer.len());
    }

    #[test]
    fn full_buffer_is_left_alone() {
        let (codec, mut buffer) = setup(0, 1);
        codec.decode(&record(0), &mut buffer, 0).unwrap();
        assert!(matches!(
            codec.decode(&record(0), &mut buffer, 1),
            Err(Error::CapacityExceeded { index: 1, capacity: 1 })
        ));
        assert_eq!(1, buffer.len());

        let (codec, mut buffer) = setup(0, 4);
        assert!(matches!(
            codec.decode(&record(0), &mut buffer, 2),
            Err(Error::IndexOutOfRange { index: 2, len: 0 })
        ));
        assert_eq!(0, buffer.len());
    }

    #[test]
    fn record_length_too_short() {
        let format = Format::new(3).unwrap();
        let mut layout = PointLayout::new();
        let dimensions = LasDimensions::register(format, &mut layout).unwrap();
        assert!(matches!(
            PointCodec::new(format, 30, dimensions),
            Err(Error::InvalidPointDataRecordLength { len: 30, .. })
        ));
    }
}
