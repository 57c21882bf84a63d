//! Variable length records store metadata that doesn't fit in the header.
//!
//! Vlrs sit between the header and the point records. Their payload is kept byte for byte; this
//! crate doesn't interpret any of them.
//!
//! ```
//! use las_pipeline::Vlr;
//! let vlr = Vlr {
//!     user_id: "LASF_Projection".to_string(),
//!     record_id: 2112,
//!     description: "OGC WKT".to_string(),
//!     data: vec![1, 2, 3],
//! };
//! assert_eq!(57, vlr.len());
//! ```

use crate::{raw, Error, Result};

/// A variable length record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vlr {
    /// The user that created this record.
    ///
    /// This is often a registered id such as "LASF_Spec" or "LASF_Projection".
    pub user_id: String,

    /// The type of record, depends on the user id.
    pub record_id: u16,

    /// Textual description of these data.
    pub description: String,

    /// The payload.
    pub data: Vec<u8>,
}

impl Vlr {
    /// Creates a vlr from a raw vlr.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{raw, Vlr};
    /// let vlr = Vlr::new(raw::Vlr::default()).unwrap();
    /// assert_eq!("", vlr.user_id);
    /// ```
    pub fn new(raw_vlr: raw::Vlr) -> Result<Vlr> {
        use crate::utils::AsLasStr;
        Ok(Vlr {
            user_id: (&raw_vlr.user_id[..]).as_las_str()?.to_string(),
            record_id: raw_vlr.record_id,
            description: (&raw_vlr.description[..]).as_las_str()?.to_string(),
            data: raw_vlr.data,
        })
    }

    /// Converts this vlr to a raw vlr.
    ///
    /// Fails if a string doesn't fit its field or the payload is longer than a vlr can declare.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::Vlr;
    /// let raw_vlr = Vlr { data: vec![0; 3], ..Default::default() }.into_raw().unwrap();
    /// assert_eq!(3, raw_vlr.record_length_after_header);
    /// ```
    pub fn into_raw(self) -> Result<raw::Vlr> {
        use crate::utils::FromLasStr;
        let record_length_after_header =
            u16::try_from(self.data.len()).map_err(|_| Error::VlrTooLong(self.data.len()))?;
        let mut user_id = [0; 16];
        user_id.from_las_str(&self.user_id)?;
        let mut description = [0; 32];
        description.from_las_str(&self.description)?;
        Ok(raw::Vlr {
            reserved: 0,
            user_id,
            record_id: self.record_id,
            record_length_after_header,
            description,
            data: self.data,
        })
    }

    /// Returns the total length of this vlr, header and data.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        u64::from(raw::vlr::HEADER_SIZE) + self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_raw() {
        let vlr = Vlr {
            user_id: "LASF_Spec".to_string(),
            record_id: 4,
            description: "extra bytes".to_string(),
            data: vec![1, 2],
        };
        let raw_vlr = vlr.clone().into_raw().unwrap();
        assert_eq!(vlr.len(), raw_vlr.len());
        assert_eq!(vlr, Vlr::new(raw_vlr).unwrap());
    }

    #[test]
    fn user_id_too_long() {
        let vlr = Vlr {
            user_id: "a user id that is far too long".to_string(),
            ..Default::default()
        };
        assert!(vlr.into_raw().is_err());
    }

    #[test]
    fn garbage_after_nul() {
        let mut raw_vlr = raw::Vlr::default();
        raw_vlr.description[0] = b'a';
        raw_vlr.description[5] = b'b';
        assert!(matches!(Vlr::new(raw_vlr), Err(Error::NotZeroFilled(_))));
    }
}
