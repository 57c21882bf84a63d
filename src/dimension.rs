//! Named, typed per-point attributes.
//!
//! Every attribute a point can carry is a *dimension*: a name, a stable [DimensionId], and a
//! native [DimensionType]. Dimensions live in a registry that is append-only for the life of the
//! thread that uses it, so an id never changes meaning once handed out:
//!
//! ```
//! use las_pipeline::dimension::{self, DimensionType};
//!
//! let id = dimension::register("Amplitude", DimensionType::F32).unwrap();
//! assert_eq!(id, dimension::register("Amplitude", DimensionType::F32).unwrap());
//! assert!(dimension::register("Amplitude", DimensionType::U16).is_err());
//! ```
//!
//! The standard las dimensions are registered on first use, in a fixed order, so every pipeline
//! run sees the same ids for them:
//!
//! ```
//! use las_pipeline::dimension::{self, standard};
//! assert_eq!(Some(dimension::id_of(standard::X).unwrap()), dimension::id_of("X"));
//! ```
//!
//! The pipeline is single-threaded, so the registry is kept per thread instead of behind a lock.
//! Each thread that builds pipelines gets its own catalog, populated the same way.

use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::{cell::RefCell, collections::HashMap, fmt};

/// Names of the standard dimensions, in registration order.
pub mod standard {
    /// Raw x record value.
    pub const X: &str = "X";
    /// Raw y record value.
    pub const Y: &str = "Y";
    /// Raw z record value.
    pub const Z: &str = "Z";
    /// Pulse return magnitude.
    pub const INTENSITY: &str = "Intensity";
    /// Return number of this pulse.
    pub const RETURN_NUMBER: &str = "ReturnNumber";
    /// Number of returns of this pulse.
    pub const NUMBER_OF_RETURNS: &str = "NumberOfReturns";
    /// Scan direction flag, 0 or 1.
    pub const SCAN_DIRECTION_FLAG: &str = "ScanDirectionFlag";
    /// Edge of flight line flag, 0 or 1.
    pub const EDGE_OF_FLIGHT_LINE: &str = "EdgeOfFlightLine";
    /// ASPRS classification.
    pub const CLASSIFICATION: &str = "Classification";
    /// Scan angle rank, -90 to 90.
    pub const SCAN_ANGLE_RANK: &str = "ScanAngleRank";
    /// User data byte.
    pub const USER_DATA: &str = "UserData";
    /// Originating file source id.
    pub const POINT_SOURCE_ID: &str = "PointSourceId";
    /// GPS time tag.
    pub const GPS_TIME: &str = "GpsTime";
    /// Red channel.
    pub const RED: &str = "Red";
    /// Green channel.
    pub const GREEN: &str = "Green";
    /// Blue channel.
    pub const BLUE: &str = "Blue";
}

const STANDARD_DIMENSIONS: [(&str, DimensionType); 16] = [
    (standard::X, DimensionType::I32),
    (standard::Y, DimensionType::I32),
    (standard::Z, DimensionType::I32),
    (standard::INTENSITY, DimensionType::U16),
    (standard::RETURN_NUMBER, DimensionType::U8),
    (standard::NUMBER_OF_RETURNS, DimensionType::U8),
    (standard::SCAN_DIRECTION_FLAG, DimensionType::U8),
    (standard::EDGE_OF_FLIGHT_LINE, DimensionType::U8),
    (standard::CLASSIFICATION, DimensionType::U8),
    (standard::SCAN_ANGLE_RANK, DimensionType::I8),
    (standard::USER_DATA, DimensionType::U8),
    (standard::POINT_SOURCE_ID, DimensionType::U16),
    (standard::GPS_TIME, DimensionType::F64),
    (standard::RED, DimensionType::U16),
    (standard::GREEN, DimensionType::U16),
    (standard::BLUE, DimensionType::U16),
];

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::with_standard_dimensions());
}

/// A stable handle for a registered dimension.
///
/// Ids are handed out in registration order, which is also the order dimensions are laid out in
/// a [PointLayout](crate::PointLayout).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionId(u16);

impl DimensionId {
    /// Returns the raw index of this id.
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The native storage type of a dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DimensionType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DimensionType {
    /// Returns the number of bytes one value of this type occupies.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::dimension::DimensionType;
    /// assert_eq!(1, DimensionType::I8.size());
    /// assert_eq!(8, DimensionType::F64.size());
    /// ```
    pub fn size(&self) -> usize {
        use DimensionType::*;
        match self {
            I8 | U8 => 1,
            I16 | U16 => 2,
            I32 | U32 | F32 => 4,
            I64 | U64 | F64 => 8,
        }
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DimensionType::*;
        let name = match self {
            I8 => "int8",
            U8 => "uint8",
            I16 => "int16",
            U16 => "uint16",
            I32 => "int32",
            U32 => "uint32",
            I64 => "int64",
            U64 => "uint64",
            F32 => "float",
            F64 => "double",
        };
        f.write_str(name)
    }
}

/// A Rust type that can be stored in a point buffer.
///
/// Implemented for the ten native [DimensionType]s. Values are stored little-endian.
pub trait Primitive: Copy + fmt::Debug + num_traits::ToPrimitive + 'static {
    /// The dimension type this Rust type stores as.
    const TYPE: DimensionType;

    /// Reads a value from the front of `bytes`.
    fn read(bytes: &[u8]) -> Self;

    /// Writes this value to the front of `bytes`.
    fn write(self, bytes: &mut [u8]);
}

macro_rules! primitives {
    ($($ty:ty => $variant:ident, $read:expr, $write:expr;)+) => {
        $(
            impl Primitive for $ty {
                const TYPE: DimensionType = DimensionType::$variant;

                fn read(bytes: &[u8]) -> $ty {
                    $read(bytes)
                }

                fn write(self, bytes: &mut [u8]) {
                    $write(bytes, self)
                }
            }
        )+
    }
}

primitives! {
    i8 => I8, |b: &[u8]| b[0] as i8, |b: &mut [u8], n: i8| b[0] = n as u8;
    u8 => U8, |b: &[u8]| b[0], |b: &mut [u8], n: u8| b[0] = n;
    i16 => I16, LittleEndian::read_i16, LittleEndian::write_i16;
    u16 => U16, LittleEndian::read_u16, LittleEndian::write_u16;
    i32 => I32, LittleEndian::read_i32, LittleEndian::write_i32;
    u32 => U32, LittleEndian::read_u32, LittleEndian::write_u32;
    i64 => I64, LittleEndian::read_i64, LittleEndian::write_i64;
    u64 => U64, LittleEndian::read_u64, LittleEndian::write_u64;
    f32 => F32, LittleEndian::read_f32, LittleEndian::write_f32;
    f64 => F64, LittleEndian::read_f64, LittleEndian::write_f64;
}

/// Reads a stored value of any type, widened to `f64`.
pub(crate) fn read_as_f64(ty: DimensionType, bytes: &[u8]) -> f64 {
    use num_traits::ToPrimitive;
    use DimensionType::*;
    let value = match ty {
        I8 => i8::read(bytes).to_f64(),
        U8 => u8::read(bytes).to_f64(),
        I16 => i16::read(bytes).to_f64(),
        U16 => u16::read(bytes).to_f64(),
        I32 => i32::read(bytes).to_f64(),
        U32 => u32::read(bytes).to_f64(),
        I64 => i64::read(bytes).to_f64(),
        U64 => u64::read(bytes).to_f64(),
        F32 => f32::read(bytes).to_f64(),
        F64 => Some(f64::read(bytes)),
    };
    // Every primitive has an f64 representation, possibly rounded.
    value.unwrap_or(f64::NAN)
}

/// The registered name and type of a dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionInfo {
    /// The dimension's id.
    pub id: DimensionId,
    /// The dimension's name.
    pub name: String,
    /// The dimension's native type.
    pub ty: DimensionType,
}

/// An append-only catalog of dimensions.
///
/// Most code uses the thread's registry through [register], [id_of] and [info]; a standalone
/// registry is useful when a caller needs a catalog it fully controls.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    dimensions: Vec<DimensionInfo>,
    ids: HashMap<String, DimensionId>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Creates a registry holding the standard las dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::dimension::Registry;
    /// let registry = Registry::with_standard_dimensions();
    /// assert_eq!(0, registry.id_of("X").unwrap().index());
    /// ```
    pub fn with_standard_dimensions() -> Registry {
        let mut registry = Registry::new();
        for (name, ty) in STANDARD_DIMENSIONS {
            // An empty registry can't conflict.
            let _ = registry.register(name, ty);
        }
        registry
    }

    /// Registers a dimension, returning its id.
    ///
    /// Registering a name that already exists returns the existing id, as long as the type
    /// matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::dimension::{DimensionType, Registry};
    /// let mut registry = Registry::new();
    /// let id = registry.register("Reflectance", DimensionType::F32).unwrap();
    /// assert_eq!(id, registry.register("Reflectance", DimensionType::F32).unwrap());
    /// assert!(registry.register("Reflectance", DimensionType::F64).is_err());
    /// ```
    pub fn register(&mut self, name: &str, ty: DimensionType) -> Result<DimensionId> {
        if let Some(&id) = self.ids.get(name) {
            let existing = self.dimensions[id.index()].ty;
            return if existing == ty {
                Ok(id)
            } else {
                Err(Error::TypeMismatch {
                    name: name.to_string(),
                    existing,
                    requested: ty,
                })
            };
        }
        let index = u16::try_from(self.dimensions.len())
            .map_err(|_| Error::RegistryFull(name.to_string()))?;
        let id = DimensionId(index);
        log::debug!("registered dimension {} {} as {}", ty, name, id);
        self.dimensions.push(DimensionInfo {
            id,
            name: name.to_string(),
            ty,
        });
        let _ = self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Returns the id registered for this name.
    pub fn id_of(&self, name: &str) -> Option<DimensionId> {
        self.ids.get(name).copied()
    }

    /// Returns the name and type registered for this id.
    pub fn info(&self, id: DimensionId) -> Option<&DimensionInfo> {
        self.dimensions.get(id.index())
    }

    /// Returns the number of registered dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Registers a dimension in this thread's registry.
///
/// See [Registry::register].
pub fn register(name: &str, ty: DimensionType) -> Result<DimensionId> {
    REGISTRY.with(|registry| registry.borrow_mut().register(name, ty))
}

/// Looks up a dimension id by name in this thread's registry.
///
/// # Examples
///
/// ```
/// use las_pipeline::dimension;
/// assert!(dimension::id_of("Intensity").is_some());
/// assert!(dimension::id_of("NotADimension").is_none());
/// ```
pub fn id_of(name: &str) -> Option<DimensionId> {
    REGISTRY.with(|registry| registry.borrow().id_of(name))
}

/// Returns the registration details for an id from this thread's registry.
pub fn info(id: DimensionId) -> Option<DimensionInfo> {
    REGISTRY.with(|registry| registry.borrow().info(id).cloned())
}
