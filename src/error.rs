use crate::{dimension::DimensionType, point::Format, Version};
use thiserror::Error;

/// Crate-specific error enum.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The file signature was not "LASF".
    #[error("file signature must be LASF, found {0:?}")]
    InvalidFileSignature([u8; 4]),

    /// This version can't be read.
    #[error("las version {0} is not supported")]
    UnsupportedVersion(Version),

    /// The header size is smaller than the version requires.
    #[error("las {version} requires a header size of at least {expected}, found {found}")]
    InvalidHeaderSize {
        /// The file's version.
        version: Version,
        /// The smallest legal header size.
        expected: u16,
        /// The header size in the file.
        found: u16,
    },

    /// The point format code isn't one this crate decodes.
    #[error("point format {0} is not supported")]
    UnsupportedPointFormat(u8),

    /// The point data record length is less than the point format demands.
    #[error("{format} requires records of at least {} bytes, found {len}", .format.len())]
    InvalidPointDataRecordLength {
        /// The point format.
        format: Format,
        /// The record length from the header.
        len: u16,
    },

    /// The point data would start inside the header.
    #[error("offset to point data {offset} is inside the {header_size} byte header")]
    InvalidOffsetToPointData {
        /// The offset to point data from the header.
        offset: u32,
        /// The header size.
        header_size: u16,
    },

    /// A variable length record runs past the start of the point data.
    #[error(
        "vlr {index} at byte {position} (ending at {end}) overruns the point data offset {offset}"
    )]
    CorruptVlr {
        /// Zero-based position of the vlr in the chain.
        index: u32,
        /// Stream position where the vlr begins.
        position: u64,
        /// Stream position where the vlr would end.
        end: u64,
        /// The offset to point data from the header.
        offset: u64,
    },

    /// The stream ended in the middle of a point record.
    #[error("the stream ended while reading point {point}")]
    UnexpectedEndOfStream {
        /// Zero-based index of the record that could not be read.
        point: u64,
    },

    /// The stream ended inside the header, a vlr, or the bytes before the point data.
    #[error("the stream ended inside the las header or vlrs, in the part at byte {position}")]
    TruncatedHeader {
        /// Stream position where the unfinished part begins.
        position: u64,
    },

    /// A raster source returned the wrong number of samples.
    #[error("raster band {band} returned {found} samples, expected {expected}")]
    RasterSampleCount {
        /// The zero-based band index.
        band: usize,
        /// The number of cells requested.
        expected: usize,
        /// The number of samples returned.
        found: usize,
    },

    /// This string is not ASCII.
    #[error("this string is not ascii: {0}")]
    NotAscii(String),

    /// The bytes were not filled with nuls after the last ASCII character.
    #[error("the bytes are not zero-filled: {0:?}")]
    NotZeroFilled(Vec<u8>),

    /// The string is too long for its fixed-width field.
    #[error("string is too long for a field of {len} bytes: {string}")]
    StringTooLong {
        /// The string.
        string: String,
        /// The width of the target field.
        len: usize,
    },

    /// The point count doesn't fit in this version's header.
    #[error("las {version} cannot hold {count} points")]
    TooManyPoints {
        /// The number of points.
        count: u64,
        /// The target version.
        version: Version,
    },

    /// A value doesn't fit its header field.
    #[error("{value} does not fit in the {field} header field")]
    FieldOverflow {
        /// The header field.
        field: &'static str,
        /// The value that didn't fit.
        value: i64,
    },

    /// The vlr payload is longer than its length field can hold.
    #[error("the vlr payload is too long: {0} bytes")]
    VlrTooLong(usize),

    /// A dimension was registered twice with different types.
    #[error("dimension {name} is {existing}, not {requested}")]
    TypeMismatch {
        /// The dimension name.
        name: String,
        /// The type the dimension was registered with.
        existing: DimensionType,
        /// The type that was asked for.
        requested: DimensionType,
    },

    /// Every dimension id is taken.
    #[error("the dimension registry is full, cannot register {0}")]
    RegistryFull(String),

    /// The dimension isn't part of the layout.
    #[error("dimension {0} is not part of the point layout")]
    DimensionAbsent(String),

    /// The point index is past the end of the buffer.
    #[error("point index {index} is out of range for a buffer of {len} points")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of points in the buffer.
        len: usize,
    },

    /// The buffer can't hold another point.
    #[error("point index {index} exceeds the buffer capacity of {capacity}")]
    CapacityExceeded {
        /// The requested index.
        index: usize,
        /// The buffer's capacity.
        capacity: usize,
    },

    /// The layout has been finalized and can't take new dimensions.
    #[error("the point layout is finalized, cannot add dimension {0}")]
    LayoutFinalized(String),

    /// Two buffers don't share a layout.
    #[error("point buffers have different layouts")]
    LayoutMismatch,

    /// No stage is registered under this name.
    #[error("unknown stage type: {0}")]
    UnknownStageType(String),

    /// There's no driver for this file name.
    #[error("cannot infer a driver for {0}")]
    NoDriver(String),

    /// The stage does not recognize this option.
    #[error("{stage} does not recognize option {option}")]
    UnknownOption {
        /// The stage type name.
        stage: String,
        /// The option name.
        option: String,
    },

    /// A required option wasn't given.
    #[error("option {0} is required")]
    MissingOption(String),

    /// The option's value is unusable.
    #[error("invalid value for option {option}: {reason}")]
    InvalidOption {
        /// The option name.
        option: String,
        /// What's wrong with it.
        reason: String,
    },

    /// The stage can't be wired to these upstream stages.
    #[error("{stage} cannot take {count} upstream stage(s)")]
    InvalidUpstream {
        /// The stage type name.
        stage: String,
        /// The number of upstream stages offered.
        count: usize,
    },

    /// The stage graph loops back on itself.
    #[error("stage graph has a cycle through {0}")]
    CyclicUpstream(String),

    /// The stage isn't in the right lifecycle state for this call.
    #[error("{stage} is {state:?}, cannot {action}")]
    InvalidStageState {
        /// The stage type name.
        stage: String,
        /// The current lifecycle state.
        state: crate::stage::StageState,
        /// What was attempted.
        action: &'static str,
    },

    /// The underlying stream has already been released.
    #[error("the stream for {0} has been closed")]
    StreamClosed(String),

    /// Wrapper around `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error raised inside a stage, tagged with the stage name.
    #[error("{stage}: {source}")]
    Stage {
        /// The stage type name.
        stage: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

/// The broad class of an [Error].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad signature, truncated stream, corrupt vlr, unsupported point format.
    MalformedInput,
    /// A contract violation between stages: absent dimension, type mismatch, capacity.
    SchemaViolation,
    /// The underlying stream failed or was already closed.
    Resource,
    /// The stage graph can't be built.
    Assembly,
}

impl Error {
    /// Returns the class of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{Error, ErrorKind};
    /// assert_eq!(ErrorKind::MalformedInput, Error::UnsupportedPointFormat(99).kind());
    /// ```
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            InvalidFileSignature(_)
            | UnsupportedVersion(_)
            | InvalidHeaderSize { .. }
            | UnsupportedPointFormat(_)
            | InvalidPointDataRecordLength { .. }
            | InvalidOffsetToPointData { .. }
            | CorruptVlr { .. }
            | UnexpectedEndOfStream { .. }
            | TruncatedHeader { .. }
            | RasterSampleCount { .. }
            | NotAscii(_)
            | NotZeroFilled(_) => ErrorKind::MalformedInput,
            StringTooLong { .. }
            | VlrTooLong(_)
            | TooManyPoints { .. }
            | FieldOverflow { .. }
            | RegistryFull(_)
            | TypeMismatch { .. }
            | DimensionAbsent(_)
            | IndexOutOfRange { .. }
            | CapacityExceeded { .. }
            | LayoutFinalized(_)
            | LayoutMismatch => ErrorKind::SchemaViolation,
            StreamClosed(_) | Io(_) => ErrorKind::Resource,
            UnknownStageType(_)
            | NoDriver(_)
            | UnknownOption { .. }
            | MissingOption(_)
            | InvalidOption { .. }
            | InvalidUpstream { .. }
            | CyclicUpstream(_)
            | InvalidStageState { .. } => ErrorKind::Assembly,
            Stage { source, .. } => source.kind(),
        }
    }

    /// Strips any stage tags, returning the innermost error.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::Error;
    /// let error = Error::UnsupportedPointFormat(99).in_stage("readers.las");
    /// assert!(matches!(error.root(), Error::UnsupportedPointFormat(99)));
    /// ```
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            error => error,
        }
    }

    /// Tags this error with the name of the stage that raised it.
    ///
    /// Errors that already carry a stage tag are returned unchanged.
    pub fn in_stage(self, stage: &str) -> Error {
        match self {
            error @ Error::Stage { .. } => error,
            error => Error::Stage {
                stage: stage.to_string(),
                source: Box::new(error),
            },
        }
    }
}
