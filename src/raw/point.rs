//! Raw point records for point formats zero through three.

use crate::{point::Format, Color, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const RETURN_NUMBER_MASK: u8 = 0b0000_0111;
const NUMBER_OF_RETURNS_MASK: u8 = 0b0011_1000;
const SCAN_DIRECTION_MASK: u8 = 0b0100_0000;
const EDGE_OF_FLIGHT_LINE_MASK: u8 = 0b1000_0000;

/// A raw point record.
///
/// Coordinates are the unscaled record integers; applying the header's scale and offset is left
/// to whoever consumes them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    /// Raw x record value.
    pub x: i32,
    #[allow(missing_docs)]
    pub y: i32,
    #[allow(missing_docs)]
    pub z: i32,

    /// Pulse return magnitude, normalized to 16 bits.
    pub intensity: u16,

    /// Return number, number of returns, scan direction and edge of flight line, packed.
    ///
    /// | Bits | Field |
    /// | ---- | ----- |
    /// | 0:2 | Return number |
    /// | 3:5 | Number of returns |
    /// | 6 | Scan direction flag |
    /// | 7 | Edge of flight line |
    pub flags: u8,

    /// The ASPRS class, plus the synthetic, key-point and withheld bits.
    pub classification: u8,

    /// Scan angle rounded to whole degrees, -90 to 90.
    pub scan_angle_rank: i8,

    /// Free for the user.
    pub user_data: u8,

    /// The file source id this point came from.
    pub point_source_id: u16,

    /// Present for point formats one and three.
    pub gps_time: Option<f64>,

    /// Present for point formats two and three.
    pub color: Option<Color>,
}

impl Point {
    /// Decodes a point from the front of a record.
    ///
    /// Fields are taken in file order from a cursor over the record bytes, so a record that is
    /// too short fails instead of reading past its end. Any bytes past the format's fields are
    /// extra bytes and are left alone.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{point::Format, raw::Point};
    /// let record = [0u8; 20];
    /// let point = Point::decode(&record, Format::new(0).unwrap()).unwrap();
    /// assert_eq!(Point::default(), point);
    /// assert!(Point::decode(&record, Format::new(1).unwrap()).is_err());
    /// ```
    pub fn decode(record: &[u8], format: Format) -> Result<Point> {
        let mut cursor = record;
        Point::read_from(&mut cursor, format)
    }

    /// Reads a point's fields from a `Read`.
    pub fn read_from<R: Read>(mut read: R, format: Format) -> Result<Point> {
        let x = read.read_i32::<LittleEndian>()?;
        let y = read.read_i32::<LittleEndian>()?;
        let z = read.read_i32::<LittleEndian>()?;
        let intensity = read.read_u16::<LittleEndian>()?;
        let flags = read.read_u8()?;
        let classification = read.read_u8()?;
        let scan_angle_rank = read.read_i8()?;
        let user_data = read.read_u8()?;
        let point_source_id = read.read_u16::<LittleEndian>()?;
        let gps_time = if format.has_gps_time() {
            Some(read.read_f64::<LittleEndian>()?)
        } else {
            None
        };
        let color = if format.has_color() {
            let red = read.read_u16::<LittleEndian>()?;
            let green = read.read_u16::<LittleEndian>()?;
            let blue = read.read_u16::<LittleEndian>()?;
            Some(Color::new(red, green, blue))
        } else {
            None
        };
        Ok(Point {
            x,
            y,
            z,
            intensity,
            flags,
            classification,
            scan_angle_rank,
            user_data,
            point_source_id,
            gps_time,
            color,
        })
    }

    /// Writes a point, followed by `extra_bytes` zeros.
    ///
    /// Missing gps time or color is written as zeros when the format has them.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{point::Format, raw::Point};
    /// let mut bytes = Vec::new();
    /// Point::default().write_to(&mut bytes, Format::new(3).unwrap(), 2).unwrap();
    /// assert_eq!(36, bytes.len());
    /// ```
    pub fn write_to<W: Write>(&self, mut write: W, format: Format, extra_bytes: u16) -> Result<()> {
        write.write_i32::<LittleEndian>(self.x)?;
        write.write_i32::<LittleEndian>(self.y)?;
        write.write_i32::<LittleEndian>(self.z)?;
        write.write_u16::<LittleEndian>(self.intensity)?;
        write.write_u8(self.flags)?;
        write.write_u8(self.classification)?;
        write.write_i8(self.scan_angle_rank)?;
        write.write_u8(self.user_data)?;
        write.write_u16::<LittleEndian>(self.point_source_id)?;
        if format.has_gps_time() {
            write.write_f64::<LittleEndian>(self.gps_time.unwrap_or(0.))?;
        }
        if format.has_color() {
            let color = self.color.unwrap_or_default();
            write.write_u16::<LittleEndian>(color.red)?;
            write.write_u16::<LittleEndian>(color.green)?;
            write.write_u16::<LittleEndian>(color.blue)?;
        }
        write.write_all(&vec![0; usize::from(extra_bytes)])?;
        Ok(())
    }

    /// Returns the return number, bits 0 through 2 of the flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::raw::Point;
    /// let point = Point { flags: 0b1001_0011, ..Default::default() };
    /// assert_eq!(3, point.return_number());
    /// assert_eq!(2, point.number_of_returns());
    /// assert_eq!(0, point.scan_direction_flag());
    /// assert_eq!(1, point.edge_of_flight_line());
    /// ```
    pub fn return_number(&self) -> u8 {
        self.flags & RETURN_NUMBER_MASK
    }

    /// Returns the number of returns, bits 3 through 5 of the flags.
    pub fn number_of_returns(&self) -> u8 {
        (self.flags & NUMBER_OF_RETURNS_MASK) >> 3
    }

    /// Returns the scan direction flag, bit 6 of the flags.
    pub fn scan_direction_flag(&self) -> u8 {
        (self.flags & SCAN_DIRECTION_MASK) >> 6
    }

    /// Returns the edge of flight line flag, bit 7 of the flags.
    pub fn edge_of_flight_line(&self) -> u8 {
        (self.flags & EDGE_OF_FLIGHT_LINE_MASK) >> 7
    }

    /// Packs the four flag fields back into a byte.
    ///
    /// Each field is masked to its width.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::raw::Point;
    /// assert_eq!(0b1001_0011, Point::pack_flags(3, 2, 0, 1));
    /// ```
    pub fn pack_flags(
        return_number: u8,
        number_of_returns: u8,
        scan_direction_flag: u8,
        edge_of_flight_line: u8,
    ) -> u8 {
        (return_number & RETURN_NUMBER_MASK)
            | ((number_of_returns << 3) & NUMBER_OF_RETURNS_MASK)
            | ((scan_direction_flag << 6) & SCAN_DIRECTION_MASK)
            | ((edge_of_flight_line << 7) & EDGE_OF_FLIGHT_LINE_MASK)
    }
}
