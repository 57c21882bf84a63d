use std::fmt;

/// The las version this crate decodes best: header fields up through 1.4 are understood.
const MAX_MINOR: u8 = 4;

/// LAS version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// The major version.
    ///
    /// For now, always 1.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
}

impl Version {
    /// Creates a new version.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::Version;
    /// let version = Version::new(1, 2);
    /// ```
    pub fn new(major: u8, minor: u8) -> Version {
        Version { major, minor }
    }

    /// Returns true if this crate knows how to read headers of this version.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::Version;
    /// assert!(Version::new(1, 0).is_supported());
    /// assert!(Version::new(1, 4).is_supported());
    /// assert!(!Version::new(2, 0).is_supported());
    /// ```
    pub fn is_supported(&self) -> bool {
        self.major == 1 && self.minor <= MAX_MINOR
    }

    /// Returns the nominal size of the public header block for this version.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::Version;
    /// assert_eq!(227, Version::new(1, 2).header_size());
    /// assert_eq!(235, Version::new(1, 3).header_size());
    /// assert_eq!(375, Version::new(1, 4).header_size());
    /// ```
    pub fn header_size(&self) -> u16 {
        if self.has_large_files() {
            375
        } else if self.has_waveforms() {
            235
        } else {
            227
        }
    }

    /// Does the header carry the start of waveform data (las 1.3 and up)?
    pub fn has_waveforms(&self) -> bool {
        *self >= Version::new(1, 3)
    }

    /// Does the header carry extended vlr locations and 64-bit point counts (las 1.4)?
    pub fn has_large_files(&self) -> bool {
        *self >= Version::new(1, 4)
    }

    /// Returns the bytes this version expects between the last vlr and the point data, if the
    /// version has such a convention.
    ///
    /// Only las 1.0 has one: the two byte point data start signature. Later versions dropped it,
    /// and files in the wild are inconsistent about it, so this is an exception table keyed by
    /// version rather than a rule.
    ///
    /// # Examples
    ///
    /// ```
    /// # use las_pipeline::Version;
    /// assert_eq!(Some(&[0xDD, 0xCC][..]), Version::new(1, 0).point_data_padding());
    /// assert_eq!(None, Version::new(1, 2).point_data_padding());
    /// ```
    pub fn point_data_padding(&self) -> Option<&'static [u8]> {
        match (self.major, self.minor) {
            (1, 0) => Some(&crate::raw::POINT_DATA_START_SIGNATURE),
            _ => None,
        }
    }
}

impl Default for Version {
    fn default() -> Version {
        Version::new(1, 2)
    }
}

impl From<(u8, u8)> for Version {
    fn from((major, minor): (u8, u8)) -> Version {
        Version { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
