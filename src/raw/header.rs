//! Raw file metadata.

use crate::{Result, Version};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// A raw las header.
///
/// Fields are in file order. Fields that only exist in later versions are `Option`s, and are read
/// and written only when the version has them.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    /// Must be "LASF".
    pub file_signature: [u8; 4],

    /// The flight line or other source identifier, zero if unassigned.
    pub file_source_id: u16,

    /// Global bit flags; bit 0 selects standard gps time.
    pub global_encoding: u16,

    /// The project id.
    pub guid: [u8; 16],

    /// The format version.
    pub version: Version,

    /// The hardware or operation that produced the file, nul filled.
    pub system_identifier: [u8; 32],

    /// The software that produced the file, nul filled.
    pub generating_software: [u8; 32],

    /// GMT day of year, January 1 is day 1.
    pub file_creation_day_of_year: u16,

    /// Four digit year.
    pub file_creation_year: u16,

    /// The size of the public header block, including any trailing user bytes.
    pub header_size: u16,

    /// Bytes from the beginning of the file to the first point record.
    pub offset_to_point_data: u32,

    /// The number of vlrs between the header and the points.
    pub number_of_variable_length_records: u32,

    /// The point data record format.
    pub point_data_record_format: u8,

    /// The size of a point record, including any extra bytes.
    pub point_data_record_length: u16,

    /// The number of point records, or zero if the count only fits in the las 1.4 field.
    pub number_of_point_records: u32,

    /// Point counts for returns one through five.
    pub number_of_points_by_return: [u32; 5],

    #[allow(missing_docs)]
    pub x_scale_factor: f64,
    #[allow(missing_docs)]
    pub y_scale_factor: f64,
    #[allow(missing_docs)]
    pub z_scale_factor: f64,
    #[allow(missing_docs)]
    pub x_offset: f64,
    #[allow(missing_docs)]
    pub y_offset: f64,
    #[allow(missing_docs)]
    pub z_offset: f64,
    #[allow(missing_docs)]
    pub max_x: f64,
    #[allow(missing_docs)]
    pub min_x: f64,
    #[allow(missing_docs)]
    pub max_y: f64,
    #[allow(missing_docs)]
    pub min_y: f64,
    #[allow(missing_docs)]
    pub max_z: f64,
    #[allow(missing_docs)]
    pub min_z: f64,

    /// **las 1.3 and 1.4**: byte offset to the waveform data packet record.
    pub start_of_waveform_data_packet_record: Option<u64>,

    /// **las 1.4**: extended vlr location.
    pub evlr: Option<Evlr>,

    /// **las 1.4**: 64-bit point counts.
    pub large_file: Option<LargeFile>,

    /// Bytes past the version's nominal header size, up to `header_size`.
    pub padding: Vec<u8>,
}

/// Where the extended variable length records live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Evlr {
    /// Byte offset to the first evlr.
    pub start_of_first_evlr: u64,
    /// Number of evlrs.
    pub number_of_evlrs: u32,
}

/// 64-bit point counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LargeFile {
    /// Total number of point records.
    pub number_of_point_records: u64,
    /// Point counts for returns one through fifteen.
    pub number_of_points_by_return: [u64; 15],
}

impl Header {
    /// Reads a raw header from a `Read`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use las_pipeline::raw::Header;
    /// let mut cursor = Cursor::new(Vec::new());
    /// Header::default().write_to(&mut cursor).unwrap();
    /// cursor.set_position(0);
    /// let header = Header::read_from(cursor).unwrap();
    /// ```
    pub fn read_from<R: Read>(mut read: R) -> Result<Header> {
        let mut file_signature = [0; 4];
        read.read_exact(&mut file_signature)?;
        let file_source_id = read.read_u16::<LittleEndian>()?;
        let global_encoding = read.read_u16::<LittleEndian>()?;
        let mut guid = [0; 16];
        read.read_exact(&mut guid)?;
        let version_major = read.read_u8()?;
        let version_minor = read.read_u8()?;
        let version = Version::new(version_major, version_minor);
        let mut system_identifier = [0; 32];
        read.read_exact(&mut system_identifier)?;
        let mut generating_software = [0; 32];
        read.read_exact(&mut generating_software)?;
        let file_creation_day_of_year = read.read_u16::<LittleEndian>()?;
        let file_creation_year = read.read_u16::<LittleEndian>()?;
        let header_size = read.read_u16::<LittleEndian>()?;
        let offset_to_point_data = read.read_u32::<LittleEndian>()?;
        let number_of_variable_length_records = read.read_u32::<LittleEndian>()?;
        let point_data_record_format = read.read_u8()?;
        let point_data_record_length = read.read_u16::<LittleEndian>()?;
        let number_of_point_records = read.read_u32::<LittleEndian>()?;
        let mut number_of_points_by_return = [0; 5];
        for n in &mut number_of_points_by_return {
            *n = read.read_u32::<LittleEndian>()?;
        }
        let mut floats = [0.; 12];
        read.read_f64_into::<LittleEndian>(&mut floats)?;
        let [
            x_scale_factor,
            y_scale_factor,
            z_scale_factor,
            x_offset,
            y_offset,
            z_offset,
            max_x,
            min_x,
            max_y,
            min_y,
            max_z,
            min_z,
        ] = floats;
        let start_of_waveform_data_packet_record = if version.has_waveforms() {
            Some(read.read_u64::<LittleEndian>()?)
        } else {
            None
        };
        let (evlr, large_file) = if version.has_large_files() {
            let evlr = Evlr {
                start_of_first_evlr: read.read_u64::<LittleEndian>()?,
                number_of_evlrs: read.read_u32::<LittleEndian>()?,
            };
            (Some(evlr), Some(LargeFile::read_from(&mut read)?))
        } else {
            (None, None)
        };
        let padding = if header_size > version.header_size() {
            let mut bytes = vec![0; usize::from(header_size - version.header_size())];
            read.read_exact(&mut bytes)?;
            bytes
        } else {
            Vec::new()
        };
        Ok(Header {
            file_signature,
            file_source_id,
            global_encoding,
            guid,
            version,
            system_identifier,
            generating_software,
            file_creation_day_of_year,
            file_creation_year,
            header_size,
            offset_to_point_data,
            number_of_variable_length_records,
            point_data_record_format,
            point_data_record_length,
            number_of_point_records,
            number_of_points_by_return,
            x_scale_factor,
            y_scale_factor,
            z_scale_factor,
            x_offset,
            y_offset,
            z_offset,
            max_x,
            min_x,
            max_y,
            min_y,
            max_z,
            min_z,
            start_of_waveform_data_packet_record,
            evlr,
            large_file,
            padding,
        })
    }

    /// Writes a raw header to a `Write`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use las_pipeline::raw::Header;
    /// let mut cursor = Cursor::new(Vec::new());
    /// Header::default().write_to(&mut cursor).unwrap();
    /// assert_eq!(227, cursor.into_inner().len());
    /// ```
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_all(&self.file_signature)?;
        write.write_u16::<LittleEndian>(self.file_source_id)?;
        write.write_u16::<LittleEndian>(self.global_encoding)?;
        write.write_all(&self.guid)?;
        write.write_u8(self.version.major)?;
        write.write_u8(self.version.minor)?;
        write.write_all(&self.system_identifier)?;
        write.write_all(&self.generating_software)?;
        write.write_u16::<LittleEndian>(self.file_creation_day_of_year)?;
        write.write_u16::<LittleEndian>(self.file_creation_year)?;
        write.write_u16::<LittleEndian>(self.header_size)?;
        write.write_u32::<LittleEndian>(self.offset_to_point_data)?;
        write.write_u32::<LittleEndian>(self.number_of_variable_length_records)?;
        write.write_u8(self.point_data_record_format)?;
        write.write_u16::<LittleEndian>(self.point_data_record_length)?;
        write.write_u32::<LittleEndian>(self.number_of_point_records)?;
        for n in &self.number_of_points_by_return {
            write.write_u32::<LittleEndian>(*n)?;
        }
        for n in [
            self.x_scale_factor,
            self.y_scale_factor,
            self.z_scale_factor,
            self.x_offset,
            self.y_offset,
            self.z_offset,
            self.max_x,
            self.min_x,
            self.max_y,
            self.min_y,
            self.max_z,
            self.min_z,
        ] {
            write.write_f64::<LittleEndian>(n)?;
        }
        if self.version.has_waveforms() {
            write.write_u64::<LittleEndian>(
                self.start_of_waveform_data_packet_record.unwrap_or(0),
            )?;
        }
        if self.version.has_large_files() {
            let evlr = self.evlr.unwrap_or_default();
            write.write_u64::<LittleEndian>(evlr.start_of_first_evlr)?;
            write.write_u32::<LittleEndian>(evlr.number_of_evlrs)?;
            let large_file = self.large_file.unwrap_or_default();
            write.write_u64::<LittleEndian>(large_file.number_of_point_records)?;
            for n in &large_file.number_of_points_by_return {
                write.write_u64::<LittleEndian>(*n)?;
            }
        }
        write.write_all(&self.padding)?;
        Ok(())
    }
}

impl Default for Header {
    fn default() -> Header {
        let version = Version::new(1, 2);
        Header {
            file_signature: super::LASF,
            file_source_id: 0,
            global_encoding: 0,
            guid: [0; 16],
            version,
            system_identifier: [0; 32],
            generating_software: [0; 32],
            file_creation_day_of_year: 0,
            file_creation_year: 0,
            header_size: version.header_size(),
            offset_to_point_data: u32::from(version.header_size()),
            number_of_variable_length_records: 0,
            point_data_record_format: 0,
            point_data_record_length: 20,
            number_of_point_records: 0,
            number_of_points_by_return: [0; 5],
            x_scale_factor: 0.01,
            y_scale_factor: 0.01,
            z_scale_factor: 0.01,
            x_offset: 0.,
            y_offset: 0.,
            z_offset: 0.,
            max_x: 0.,
            min_x: 0.,
            max_y: 0.,
            min_y: 0.,
            max_z: 0.,
            min_z: 0.,
            start_of_waveform_data_packet_record: None,
            evlr: None,
            large_file: None,
            padding: Vec::new(),
        }
    }
}

impl LargeFile {
    fn read_from<R: Read>(mut read: R) -> Result<LargeFile> {
        let number_of_point_records = read.read_u64::<LittleEndian>()?;
        let mut number_of_points_by_return = [0; 15];
        read.read_u64_into::<LittleEndian>(&mut number_of_points_by_return)?;
        Ok(LargeFile {
            number_of_point_records,
            number_of_points_by_return,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    macro_rules! roundtrip {
        ($name:ident, $minor:expr) => {
            #[test]
            fn $name() {
                let version = Version::new(1, $minor);
                let mut header = Header {
                    version,
                    header_size: version.header_size(),
                    ..Default::default()
                };
                if version.has_waveforms() {
                    header.start_of_waveform_data_packet_record = Some(0);
                }
                if version.has_large_files() {
                    header.evlr = Some(Evlr::default());
                    header.large_file = Some(LargeFile {
                        number_of_point_records: 42,
                        ..Default::default()
                    });
                }
                let mut cursor = Cursor::new(Vec::new());
                header.write_to(&mut cursor).unwrap();
                assert_eq!(u64::from(version.header_size()), cursor.position());
                cursor.set_position(0);
                assert_eq!(header, Header::read_from(cursor).unwrap());
            }
        };
    }

    roundtrip!(las_1_0, 0);
    roundtrip!(las_1_1, 1);
    roundtrip!(las_1_2, 2);
    roundtrip!(las_1_3, 3);
    roundtrip!(las_1_4, 4);

    #[test]
    fn header_padding() {
        let header = Header {
            header_size: 230,
            padding: vec![1, 2, 3],
            ..Default::default()
        };
        let mut cursor = Cursor::new(Vec::new());
        header.write_to(&mut cursor).unwrap();
        cursor.set_position(0);
        assert_eq!(vec![1, 2, 3], Header::read_from(cursor).unwrap().padding);
    }
}
