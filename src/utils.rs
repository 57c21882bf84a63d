//! Fixed-width las string fields.

use crate::{Error, Result};
use std::str;

/// Reads a nul-filled ascii field as a `&str`.
pub trait AsLasStr {
    /// Interprets the bytes as a `&str`.
    ///
    /// The text ends at the first nul, and every byte after it must be nul too.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::utils::AsLasStr;
    /// let bytes: &[u8] = b"LiDAR\0\0";
    /// assert_eq!("LiDAR", bytes.as_las_str().unwrap());
    /// let bytes: &[u8] = b"LiDAR\0!";
    /// assert!(bytes.as_las_str().is_err());
    /// ```
    fn as_las_str(&self) -> Result<&str>;
}

/// Writes a `&str` into a nul-filled field.
pub trait FromLasStr {
    /// Fills `self` with the string, then nuls.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::utils::FromLasStr;
    /// let mut bytes = [1; 5];
    /// bytes.from_las_str("Beer").unwrap();
    /// assert_eq!([66, 101, 101, 114, 0], bytes);
    /// ```
    fn from_las_str(&mut self, s: &str) -> Result<()>;
}

impl AsLasStr for &[u8] {
    fn as_las_str(&self) -> Result<&str> {
        let bytes: &[u8] = self;
        let s = if let Some(position) = bytes.iter().position(|&n| n == 0) {
            if bytes[position..].iter().any(|&n| n != 0) {
                return Err(Error::NotZeroFilled(bytes.to_vec()));
            }
            &bytes[..position]
        } else {
            bytes
        };
        if s.is_ascii() {
            str::from_utf8(s).map_err(|_| Error::NotAscii(String::from_utf8_lossy(s).into_owned()))
        } else {
            Err(Error::NotAscii(String::from_utf8_lossy(s).into_owned()))
        }
    }
}

impl<T: AsMut<[u8]>> FromLasStr for T {
    fn from_las_str(&mut self, s: &str) -> Result<()> {
        let bytes = self.as_mut();
        if s.len() > bytes.len() {
            return Err(Error::StringTooLong {
                string: s.to_string(),
                len: bytes.len(),
            });
        }
        if !s.is_ascii() {
            return Err(Error::NotAscii(s.to_string()));
        }
        bytes.fill(0);
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let bytes: &[u8] = &[];
        assert_eq!("", bytes.as_las_str().unwrap());
        let bytes: &[u8] = &[0; 4];
        assert_eq!("", bytes.as_las_str().unwrap());
    }

    #[test]
    fn full_width() {
        let bytes: &[u8] = b"LASF";
        assert_eq!("LASF", bytes.as_las_str().unwrap());
    }

    #[test]
    fn not_ascii() {
        let bytes: &[u8] = &[240, 159, 146, 150];
        assert!(matches!(bytes.as_las_str(), Err(Error::NotAscii(_))));
    }

    #[test]
    fn from_las_str_fill() {
        let mut data = [7, 7];
        data.from_las_str("B").unwrap();
        assert_eq!([66, 0], data);
    }

    #[test]
    fn from_las_str_too_long() {
        let mut data = [0];
        assert!(matches!(
            data.from_las_str("Be"),
            Err(Error::StringTooLong { len: 1, .. })
        ));
    }
}
