//! Parse and build las headers.
//!
//! A [Header] is read once, from the start of a seekable stream, and then describes everything the
//! point codec needs: the point format, record length, point count and where the points begin.
//!
//! ```
//! use std::io::Cursor;
//! use las_pipeline::Header;
//!
//! let mut cursor = Cursor::new(Vec::new());
//! Header::default().write_to(&mut cursor).unwrap();
//! cursor.set_position(0);
//! let header = Header::read_from(&mut cursor).unwrap();
//! assert_eq!(0, header.number_of_points);
//! assert_eq!(227, cursor.position());
//! ```

use crate::{
    point::Format, raw, utils::AsLasStr, Bounds, Error, Result, Transform, Vector, Version, Vlr,
};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom, Write};
use uuid::Uuid;

/// Metadata describing the layout, source and interpretation of the points.
///
/// This is a higher-level view of [raw::Header]; use [Header::to_raw] to go back.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    /// The las version.
    pub version: Version,

    /// The flight line or other source identifier.
    pub file_source_id: u16,

    /// Global bit flags, kept as read.
    pub global_encoding: u16,

    /// The project id.
    pub guid: Uuid,

    /// The system that produced this file.
    pub system_identifier: String,

    /// The software that produced this file.
    pub generating_software: String,

    /// The creation date, or `None` if the header didn't hold a valid one.
    pub date: Option<NaiveDate>,

    /// The point format.
    pub point_format: Format,

    /// The size of one point record, at least `point_format.len()`.
    pub point_data_record_length: u16,

    /// The number of point records.
    pub number_of_points: u64,

    /// The number of points of each return, for returns one through five.
    pub number_of_points_by_return: [u64; 5],

    /// Scales and offsets from record integers to coordinates.
    pub transforms: Vector<Transform>,

    /// The bounds of the points, in coordinates.
    pub bounds: Bounds,

    /// The byte offset of the first point record.
    pub offset_to_point_data: u64,

    /// Header bytes past the version's nominal size.
    pub padding: Vec<u8>,

    /// Bytes between the last vlr and the point data.
    pub vlr_padding: Vec<u8>,

    /// The variable length records.
    pub vlrs: Vec<Vlr>,

    /// **las 1.3 and 1.4**: byte offset to the waveform data.
    pub start_of_waveform_data_packet_record: Option<u64>,

    /// **las 1.4**: the extended vlr location.
    pub evlr: Option<raw::header::Evlr>,
}

impl Header {
    /// Reads a header and its vlrs, leaving the stream at the first point record.
    ///
    /// The stream must be positioned at the start of the file, since every offset in a las header
    /// is counted from there.
    ///
    /// Validation happens in file order: signature, version, header size, point format, record
    /// length, point data offset, then each vlr. Whatever sits between the last vlr and the
    /// point data is kept in [Header::vlr_padding], and the stream is always moved to the
    /// declared offset rather than trusting the vlr arithmetic.
    ///
    /// A stream that ends before the point data fails with [Error::TruncatedHeader].
    pub fn read_from<R: Read + Seek>(read: &mut R) -> Result<Header> {
        let mut file_signature = [0; 4];
        read.read_exact(&mut file_signature).map_err(truncated(0))?;
        if file_signature != raw::LASF {
            return Err(Error::InvalidFileSignature(file_signature));
        }
        let _ = read.seek(SeekFrom::Start(0))?;
        let raw_header = raw::Header::read_from(&mut *read).map_err(truncated(0))?;
        let version = raw_header.version;
        if !version.is_supported() {
            return Err(Error::UnsupportedVersion(version));
        }
        if raw_header.header_size < version.header_size() {
            return Err(Error::InvalidHeaderSize {
                version,
                expected: version.header_size(),
                found: raw_header.header_size,
            });
        }
        let point_format = Format::new(raw_header.point_data_record_format)?;
        if raw_header.point_data_record_length < point_format.len() {
            return Err(Error::InvalidPointDataRecordLength {
                format: point_format,
                len: raw_header.point_data_record_length,
            });
        }
        if raw_header.offset_to_point_data < u32::from(raw_header.header_size) {
            return Err(Error::InvalidOffsetToPointData {
                offset: raw_header.offset_to_point_data,
                header_size: raw_header.header_size,
            });
        }
        let offset = u64::from(raw_header.offset_to_point_data);

        let mut position = read.seek(SeekFrom::Start(u64::from(raw_header.header_size)))?;
        let mut vlrs = Vec::new();
        for index in 0..raw_header.number_of_variable_length_records {
            let header_end = position + u64::from(raw::vlr::HEADER_SIZE);
            if header_end > offset {
                return Err(Error::CorruptVlr {
                    index,
                    position,
                    end: header_end,
                    offset,
                });
            }
            let raw_vlr = raw::Vlr::read_header_from(&mut *read).map_err(truncated(position))?;
            let end = position + raw_vlr.len();
            if end > offset {
                return Err(Error::CorruptVlr {
                    index,
                    position,
                    end,
                    offset,
                });
            }
            let mut vlr = Vlr::new(raw_vlr.clone()).unwrap_or_else(|err| {
                warn!("vlr {} strings are not clean las strings: {}", index, err);
                Vlr {
                    user_id: lossy_string(&raw_vlr.user_id),
                    record_id: raw_vlr.record_id,
                    description: lossy_string(&raw_vlr.description),
                    data: Vec::new(),
                }
            });
            vlr.data = vec![0; usize::from(raw_vlr.record_length_after_header)];
            read.read_exact(&mut vlr.data).map_err(truncated(position))?;
            debug!(
                "read vlr {} ({}, record {}, {} bytes)",
                index,
                vlr.user_id,
                vlr.record_id,
                vlr.data.len()
            );
            vlrs.push(vlr);
            position = end;
        }

        let mut vlr_padding = Vec::new();
        if position < offset {
            let len = offset - position;
            let mut gap = Vec::new();
            let _ = read.by_ref().take(len).read_to_end(&mut gap)?;
            if (gap.len() as u64) < len {
                return Err(Error::TruncatedHeader { position });
            }
            if version.point_data_padding() == Some(gap.as_slice()) {
                debug!("las {} point data start signature before the point data", version);
            } else {
                warn!(
                    "{} bytes between the last vlr and the point data, expected {}",
                    gap.len(),
                    version.point_data_padding().map_or(0, |bytes| bytes.len())
                );
                vlr_padding = gap;
            }
        }
        let _ = read.seek(SeekFrom::Start(offset))?;

        let number_of_points = match raw_header.large_file {
            Some(large_file) if raw_header.number_of_point_records == 0 => {
                large_file.number_of_point_records
            }
            _ => u64::from(raw_header.number_of_point_records),
        };
        let mut number_of_points_by_return = [0; 5];
        for (n, &count) in number_of_points_by_return
            .iter_mut()
            .zip(&raw_header.number_of_points_by_return)
        {
            *n = u64::from(count);
        }
        if let Some(large_file) = raw_header.large_file {
            if raw_header.number_of_point_records == 0 {
                number_of_points_by_return
                    .copy_from_slice(&large_file.number_of_points_by_return[..5]);
            }
        }

        let header = Header {
            version,
            file_source_id: raw_header.file_source_id,
            global_encoding: raw_header.global_encoding,
            guid: Uuid::from_bytes_le(raw_header.guid),
            system_identifier: checked_string(&raw_header.system_identifier, "system identifier"),
            generating_software: checked_string(
                &raw_header.generating_software,
                "generating software",
            ),
            date: NaiveDate::from_yo_opt(
                i32::from(raw_header.file_creation_year),
                u32::from(raw_header.file_creation_day_of_year),
            ),
            point_format,
            point_data_record_length: raw_header.point_data_record_length,
            number_of_points,
            number_of_points_by_return,
            transforms: Vector {
                x: Transform {
                    scale: raw_header.x_scale_factor,
                    offset: raw_header.x_offset,
                },
                y: Transform {
                    scale: raw_header.y_scale_factor,
                    offset: raw_header.y_offset,
                },
                z: Transform {
                    scale: raw_header.z_scale_factor,
                    offset: raw_header.z_offset,
                },
            },
            bounds: Bounds {
                min: Vector {
                    x: raw_header.min_x,
                    y: raw_header.min_y,
                    z: raw_header.min_z,
                },
                max: Vector {
                    x: raw_header.max_x,
                    y: raw_header.max_y,
                    z: raw_header.max_z,
                },
            },
            offset_to_point_data: offset,
            padding: raw_header.padding,
            vlr_padding,
            vlrs,
            start_of_waveform_data_packet_record: raw_header.start_of_waveform_data_packet_record,
            evlr: raw_header.evlr,
        };
        debug!(
            "read las {} header: {}, {} byte records, {} points, point data at {}",
            header.version,
            header.point_format,
            header.point_data_record_length,
            header.number_of_points,
            header.offset_to_point_data
        );
        Ok(header)
    }

    /// Returns the number of extra bytes at the end of each point record.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::Header;
    /// let header = Header { point_data_record_length: 23, ..Default::default() };
    /// assert_eq!(3, header.extra_bytes());
    /// ```
    pub fn extra_bytes(&self) -> u16 {
        self.point_data_record_length
            .saturating_sub(self.point_format.len())
    }

    /// Converts this header into a raw header.
    ///
    /// The header size, point data offset and vlr count are computed from the padding and vlrs.
    /// For las 1.0 with no vlr padding, the point data start signature is accounted for.
    pub fn to_raw(&self) -> Result<raw::Header> {
        use crate::utils::FromLasStr;

        let header_size = u16::try_from(self.padding.len())
            .ok()
            .and_then(|len| self.version.header_size().checked_add(len))
            .ok_or(Error::FieldOverflow {
                field: "header size",
                value: i64::from(self.version.header_size()).saturating_add(
                    i64::try_from(self.padding.len()).unwrap_or(i64::MAX),
                ),
            })?;
        let vlr_len: u64 = self.vlrs.iter().map(Vlr::len).sum();
        let offset_to_point_data = u64::from(header_size) + vlr_len + self.gap().len() as u64;
        let offset_to_point_data =
            u32::try_from(offset_to_point_data).map_err(|_| Error::InvalidOffsetToPointData {
                offset: u32::MAX,
                header_size,
            })?;
        let (number_of_point_records, large_file) = if self.version.has_large_files() {
            let mut large_file = raw::header::LargeFile {
                number_of_point_records: self.number_of_points,
                ..Default::default()
            };
            large_file.number_of_points_by_return[..5]
                .copy_from_slice(&self.number_of_points_by_return);
            // las 1.4 zeroes the legacy count when it doesn't fit.
            (
                u32::try_from(self.number_of_points).unwrap_or(0),
                Some(large_file),
            )
        } else {
            let count = u32::try_from(self.number_of_points).map_err(|_| Error::TooManyPoints {
                count: self.number_of_points,
                version: self.version,
            })?;
            (count, None)
        };
        let mut number_of_points_by_return = [0; 5];
        for (n, &count) in number_of_points_by_return
            .iter_mut()
            .zip(&self.number_of_points_by_return)
        {
            *n = match u32::try_from(count) {
                Ok(count) => count,
                Err(_) if large_file.is_some() => 0,
                Err(_) => {
                    return Err(Error::TooManyPoints {
                        count,
                        version: self.version,
                    });
                }
            };
        }
        let number_of_variable_length_records =
            u32::try_from(self.vlrs.len()).map_err(|_| Error::FieldOverflow {
                field: "number of variable length records",
                value: i64::try_from(self.vlrs.len()).unwrap_or(i64::MAX),
            })?;
        let mut system_identifier = [0; 32];
        system_identifier.from_las_str(&self.system_identifier)?;
        let mut generating_software = [0; 32];
        generating_software.from_las_str(&self.generating_software)?;
        let (file_creation_day_of_year, file_creation_year) = match self.date {
            Some(date) => {
                let year = u16::try_from(date.year()).map_err(|_| Error::FieldOverflow {
                    field: "file creation year",
                    value: i64::from(date.year()),
                })?;
                (date.ordinal() as u16, year)
            }
            None => (0, 0),
        };
        Ok(raw::Header {
            file_signature: raw::LASF,
            file_source_id: self.file_source_id,
            global_encoding: self.global_encoding,
            guid: self.guid.to_bytes_le(),
            version: self.version,
            system_identifier,
            generating_software,
            file_creation_day_of_year,
            file_creation_year,
            header_size,
            offset_to_point_data,
            number_of_variable_length_records,
            point_data_record_format: self.point_format.code(),
            point_data_record_length: self.point_data_record_length,
            number_of_point_records,
            number_of_points_by_return,
            x_scale_factor: self.transforms.x.scale,
            y_scale_factor: self.transforms.y.scale,
            z_scale_factor: self.transforms.z.scale,
            x_offset: self.transforms.x.offset,
            y_offset: self.transforms.y.offset,
            z_offset: self.transforms.z.offset,
            max_x: finite_or_zero(self.bounds.max.x),
            min_x: finite_or_zero(self.bounds.min.x),
            max_y: finite_or_zero(self.bounds.max.y),
            min_y: finite_or_zero(self.bounds.min.y),
            max_z: finite_or_zero(self.bounds.max.z),
            min_z: finite_or_zero(self.bounds.min.z),
            start_of_waveform_data_packet_record: self
                .version
                .has_waveforms()
                .then(|| self.start_of_waveform_data_packet_record.unwrap_or(0)),
            evlr: self
                .version
                .has_large_files()
                .then(|| self.evlr.unwrap_or_default()),
            large_file,
            padding: self.padding.clone(),
        })
    }

    /// Writes the header, the vlrs and any vlr padding, leaving the stream at the point data.
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        self.to_raw()?.write_to(&mut write)?;
        for vlr in &self.vlrs {
            vlr.clone().into_raw()?.write_to(&mut write)?;
        }
        write.write_all(&self.gap())?;
        Ok(())
    }

    fn gap(&self) -> Vec<u8> {
        if self.vlr_padding.is_empty() {
            self.version
                .point_data_padding()
                .map(<[u8]>::to_vec)
                .unwrap_or_default()
        } else {
            self.vlr_padding.clone()
        }
    }
}

impl Default for Header {
    fn default() -> Header {
        let version = Version::default();
        Header {
            version,
            file_source_id: 0,
            global_encoding: 0,
            guid: Uuid::nil(),
            system_identifier: "las-pipeline".to_string(),
            generating_software: format!("las-pipeline {}", env!("CARGO_PKG_VERSION")),
            date: None,
            point_format: Format::default(),
            point_data_record_length: Format::default().len(),
            number_of_points: 0,
            number_of_points_by_return: [0; 5],
            transforms: Default::default(),
            bounds: Default::default(),
            offset_to_point_data: u64::from(version.header_size()),
            padding: Vec::new(),
            vlr_padding: Vec::new(),
            vlrs: Vec::new(),
            start_of_waveform_data_packet_record: None,
            evlr: None,
        }
    }
}

fn checked_string(bytes: &[u8], field: &str) -> String {
    match bytes.as_las_str() {
        Ok(s) => s.to_string(),
        Err(err) => {
            warn!("{} is not a clean las string: {}", field, err);
            lossy_string(bytes)
        }
    }
}

/// Everything up to the first nul, with invalid utf-8 replaced.
fn lossy_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&n| n == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Turns a short read into [Error::TruncatedHeader] for the part starting at `position`.
fn truncated<E: Into<Error>>(position: u64) -> impl Fn(E) -> Error {
    move |err| match err.into() {
        Error::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            Error::TruncatedHeader { position }
        }
        err => err,
    }
}

fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() { n } else { 0. }
}
