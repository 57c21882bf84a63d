//! Raw variable length records.

use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The size of a vlr header, before its data.
pub const HEADER_SIZE: u16 = 54;

/// A raw vlr that maps directly onto the las specification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vlr {
    /// Reserved, should be zero.
    pub reserved: u16,
    /// The registered user id, nul filled.
    pub user_id: [u8; 16],
    /// Record type, meaning depends on the user id.
    pub record_id: u16,
    /// Number of data bytes after the 54 byte vlr header.
    pub record_length_after_header: u16,
    /// Textual description, nul filled.
    pub description: [u8; 32],
    /// The payload.
    pub data: Vec<u8>,
}

impl Vlr {
    /// Reads a raw vlr.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use las_pipeline::raw::Vlr;
    /// let mut cursor = Cursor::new(Vec::new());
    /// Vlr { data: vec![1, 2], record_length_after_header: 2, ..Default::default() }
    ///     .write_to(&mut cursor)
    ///     .unwrap();
    /// cursor.set_position(0);
    /// assert_eq!(vec![1, 2], Vlr::read_from(cursor).unwrap().data);
    /// ```
    pub fn read_from<R: Read>(mut read: R) -> Result<Vlr> {
        let mut vlr = Vlr::read_header_from(&mut read)?;
        vlr.data = vec![0; usize::from(vlr.record_length_after_header)];
        read.read_exact(&mut vlr.data)?;
        Ok(vlr)
    }

    /// Reads just the 54 byte vlr header, leaving `data` empty.
    ///
    /// Used to check a vlr's declared length before reading its payload.
    pub fn read_header_from<R: Read>(mut read: R) -> Result<Vlr> {
        let reserved = read.read_u16::<LittleEndian>()?;
        let mut user_id = [0; 16];
        read.read_exact(&mut user_id)?;
        let record_id = read.read_u16::<LittleEndian>()?;
        let record_length_after_header = read.read_u16::<LittleEndian>()?;
        let mut description = [0; 32];
        read.read_exact(&mut description)?;
        Ok(Vlr {
            reserved,
            user_id,
            record_id,
            record_length_after_header,
            description,
            data: Vec::new(),
        })
    }

    /// Writes a raw vlr.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use las_pipeline::raw::Vlr;
    /// let mut cursor = Cursor::new(Vec::new());
    /// Vlr::default().write_to(&mut cursor).unwrap();
    /// assert_eq!(54, cursor.into_inner().len());
    /// ```
    pub fn write_to<W: Write>(&self, mut write: W) -> Result<()> {
        write.write_u16::<LittleEndian>(self.reserved)?;
        write.write_all(&self.user_id)?;
        write.write_u16::<LittleEndian>(self.record_id)?;
        write.write_u16::<LittleEndian>(self.record_length_after_header)?;
        write.write_all(&self.description)?;
        write.write_all(&self.data)?;
        Ok(())
    }

    /// Returns the total length of this vlr, header and data.
    pub fn len(&self) -> u64 {
        u64::from(HEADER_SIZE) + u64::from(self.record_length_after_header)
    }

    /// Returns true if this vlr declares no data.
    pub fn is_empty(&self) -> bool {
        self.record_length_after_header == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn short_payload_is_an_error() {
        let vlr = Vlr {
            record_length_after_header: 10,
            data: vec![0; 4],
            ..Default::default()
        };
        let mut cursor = Cursor::new(Vec::new());
        vlr.write_to(&mut cursor).unwrap();
        cursor.set_position(0);
        assert!(Vlr::read_from(cursor).is_err());
    }

    #[test]
    fn len() {
        let vlr = Vlr {
            record_length_after_header: 3,
            ..Default::default()
        };
        assert_eq!(57, vlr.len());
    }
}
