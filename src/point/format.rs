use crate::{Error, Result};
use std::fmt;

const BASE_LEN: u16 = 20;
const GPS_TIME_LEN: u16 = 8;
const COLOR_LEN: u16 = 6;

/// Point record format.
///
/// The format code selects which optional field groups follow the twenty byte base record. It's
/// fixed for a whole file.
///
/// | Format | Gps time | Color | Length |
/// | ------ | -------- | ----- | ------ |
/// | 0 | | | 20 |
/// | 1 | x | | 28 |
/// | 2 | | x | 26 |
/// | 3 | x | x | 34 |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Format(u8);

impl Format {
    /// Creates a format from its code.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::point::Format;
    /// assert!(Format::new(3).is_ok());
    /// assert!(Format::new(99).is_err());
    /// ```
    pub fn new(code: u8) -> Result<Format> {
        if code <= 3 {
            Ok(Format(code))
        } else {
            Err(Error::UnsupportedPointFormat(code))
        }
    }

    /// Returns this format's code.
    pub fn code(&self) -> u8 {
        self.0
    }

    /// Does this point format have a gps time field?
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::point::Format;
    /// assert!(!Format::new(0).unwrap().has_gps_time());
    /// assert!(Format::new(1).unwrap().has_gps_time());
    /// ```
    pub fn has_gps_time(&self) -> bool {
        matches!(self.0, 1 | 3)
    }

    /// Does this point format have color fields?
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::point::Format;
    /// assert!(!Format::new(1).unwrap().has_color());
    /// assert!(Format::new(2).unwrap().has_color());
    /// ```
    pub fn has_color(&self) -> bool {
        matches!(self.0, 2 | 3)
    }

    /// Returns the nominal record length of this format, without extra bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::point::Format;
    /// assert_eq!(20, Format::new(0).unwrap().len());
    /// assert_eq!(34, Format::new(3).unwrap().len());
    /// ```
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u16 {
        let mut len = BASE_LEN;
        if self.has_gps_time() {
            len += GPS_TIME_LEN;
        }
        if self.has_color() {
            len += COLOR_LEN;
        }
        len
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point format {}", self.0)
    }
}
