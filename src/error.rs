use thiserror::Error;

use crate::mosaic::ChannelKind;

/// I/O errors that can occur when reading tile bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Underlying read failure (permissions, device errors, ...)
    #[error("Read error on {path}: {message}")]
    Read { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing or writing FITS files
#[derive(Debug, Clone, Error)]
pub enum FitsError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// First card is not `SIMPLE = T`
    #[error("Not a FITS file: {0}")]
    NotFits(String),

    /// Header block sequence ended before an END card
    #[error("Header at offset {offset} has no END card")]
    MissingEnd { offset: u64 },

    /// Card could not be decoded
    #[error("Invalid header card {index}: {message}")]
    InvalidCard { index: usize, message: String },

    /// Requested HDU does not exist in the file
    #[error("HDU {0} not found")]
    HduNotFound(usize),

    /// Required keyword is missing from a header
    #[error("Missing required keyword: {0}")]
    MissingKeyword(String),

    /// Keyword has an unexpected type or value
    #[error("Invalid value for {keyword}: {message}")]
    InvalidKeywordValue { keyword: String, message: String },

    /// BITPIX is not one of 8, 16, 32, 64, -32, -64
    #[error("Unsupported BITPIX: {0}")]
    UnsupportedBitpix(i64),

    /// Sample type cannot be decoded from this BITPIX
    #[error("Cannot read BITPIX {bitpix} data as {target}")]
    IncompatibleSampleType { bitpix: i64, target: &'static str },

    /// HDU is not a 2-D image
    #[error("HDU {index} is not a 2-D image: {reason}")]
    NotAnImage { index: usize, reason: String },

    /// HDU is not a binary table
    #[error("HDU {0} is not a binary table")]
    NotABinaryTable(usize),

    /// Tile-compressed images are not supported
    #[error("Unsupported compression in HDU {0} (tile-compressed images are not supported)")]
    UnsupportedCompression(usize),

    /// Table column lookup failed
    #[error("Missing table column: {0}")]
    MissingColumn(String),

    /// TFORMn could not be decoded or cannot be read as a scalar number
    #[error("Invalid format '{format}' for column {column}")]
    InvalidColumnFormat { column: String, format: String },

    /// Row index past the end of the table
    #[error("Row {row} out of range (table has {rows} rows)")]
    RowOutOfRange { row: u64, rows: u64 },

    /// Sample buffer size does not match the declared dimensions
    #[error("Data size mismatch: expected {expected} samples, got {actual}")]
    DataSizeMismatch { expected: usize, actual: usize },

    /// HDUs written in an invalid order
    #[error("Invalid FITS structure: {0}")]
    InvalidStructure(String),
}

/// Errors raised while resolving a tile's photometric zero-point
#[derive(Debug, Clone, Error)]
pub enum CalibrationError {
    /// Underlying FITS error
    #[error("FITS error: {0}")]
    Fits(#[from] FitsError),

    /// AR_HDU or cat.archive does not point at a valid HDU
    #[error("Invalid archive HDU index {0}")]
    InvalidArchiveIndex(i64),

    /// No entry-table row carries the calibration id
    #[error("Calibration record {id} not found")]
    RecordNotFound { id: i64 },

    /// More than one entry-table row carries the calibration id
    #[error("Calibration record {id} is ambiguous ({matches} matching rows)")]
    AmbiguousRecord { id: i64, matches: usize },

    /// Row range does not select exactly one row of the calibration table
    #[error("Invalid calibration row range: row0 = {row0}, nrows = {nrows}, table has {rows} rows")]
    InvalidRowRange { row0: i64, nrows: i64, rows: u64 },
}

/// Errors that cause a single tile to be skipped during a stitch
#[derive(Debug, Clone, Error)]
pub enum TileReadError {
    /// Tile bytes could not be read
    #[error("I/O error: {0}")]
    Io(IoError),

    /// Tile is not a well-formed FITS file for this channel
    #[error("Malformed tile: {0}")]
    Malformed(FitsError),

    /// Zero-point could not be resolved
    #[error("Calibration error: {0}")]
    Calibration(CalibrationError),

    /// Reference pixel is not integral
    #[error("Non-integer reference pixel {axis} = {value}")]
    NonIntegerReferencePixel { axis: &'static str, value: f64 },

    /// Placement does not fit inside the canvas
    #[error("Tile at ({x}, {y}) size {width}x{height} falls outside the {canvas_width}x{canvas_height} canvas")]
    OutOfCanvas {
        x: i64,
        y: i64,
        width: u64,
        height: u64,
        canvas_width: u64,
        canvas_height: u64,
    },

    /// MP_ keyword holds something other than a bit index in 0..=31
    #[error("Invalid mask plane {key}: {message}")]
    MaskPlane { key: String, message: String },

    /// More distinct mask planes than canonical bits
    #[error("Mask plane {name} does not fit: all {capacity} canonical bits are assigned")]
    MaskPlaneOverflow { name: String, capacity: u32 },
}

impl TileReadError {
    /// Whether this failure must abort the whole run instead of skipping the tile.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TileReadError::NonIntegerReferencePixel { .. })
    }
}

impl From<IoError> for TileReadError {
    fn from(err: IoError) -> Self {
        TileReadError::Io(err)
    }
}

impl From<FitsError> for TileReadError {
    fn from(err: FitsError) -> Self {
        match err {
            FitsError::Io(io) => TileReadError::Io(io),
            other => TileReadError::Malformed(other),
        }
    }
}

impl From<CalibrationError> for TileReadError {
    fn from(err: CalibrationError) -> Self {
        match err {
            CalibrationError::Fits(fits) => fits.into(),
            other => TileReadError::Calibration(other),
        }
    }
}

/// Errors that abort a whole run or a whole channel
#[derive(Debug, Clone, Error)]
pub enum StitchError {
    /// No input files were given
    #[error("No input tiles")]
    EmptyTileList,

    /// Every output channel was disabled
    #[error("No output channel selected")]
    NoChannelSelected,

    /// A tile's reference pixel is not integral
    #[error("{path}: reference pixel {axis} = {value} is not an integer")]
    NonIntegerReferencePixel {
        path: String,
        axis: &'static str,
        value: f64,
    },

    /// A tile could not be read while computing the bounding box
    #[error("{path}: cannot read tile header: {source}")]
    BoundaryTileUnreadable {
        path: String,
        #[source]
        source: TileReadError,
    },

    /// The bounding box is too large to hold in memory
    #[error("Canvas of {width} x {height} pixels is too large to allocate")]
    CanvasTooLarge { width: u64, height: u64 },

    /// Every tile failed for a channel
    #[error("No readable tiles for the {channel} channel")]
    NoTilesReadable { channel: ChannelKind },

    /// The composite could not be serialized
    #[error("Failed to write composite: {0}")]
    Output(#[from] FitsError),
}

impl StitchError {
    /// Build the fatal error for a tile whose failure cannot be skipped.
    pub(crate) fn from_tile(path: &str, err: TileReadError) -> Self {
        match err {
            TileReadError::NonIntegerReferencePixel { axis, value } => {
                StitchError::NonIntegerReferencePixel {
                    path: path.to_string(),
                    axis,
                    value,
                }
            }
            other => StitchError::BoundaryTileUnreadable {
                path: path.to_string(),
                source: other,
            },
        }
    }
}
