//! Raw structures that map directly onto structures as defined in the las format specifications.
//!
//! These structures are "dumb": they read and write bytes and do as little validity checking as
//! possible. For example:
//!
//! ```
//! let raw_header = las_pipeline::raw::Header::default();
//! assert_eq!(0, raw_header.number_of_point_records);
//! ```
//!
//! Validation happens when a raw header becomes a [Header](crate::Header).

pub mod header;
pub mod point;
pub mod vlr;

pub use self::header::Header;
pub use self::point::Point;
pub use self::vlr::Vlr;

/// The file magic number used for all las files.
pub const LASF: [u8; 4] = *b"LASF";

/// The point data start signature required by las 1.0.
pub const POINT_DATA_START_SIGNATURE: [u8; 2] = [0xDD, 0xCC];
