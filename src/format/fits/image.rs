//! FITS image decoding and encoding.
//!
//! Image samples are stored big-endian with one of six `BITPIX` types.
//! Physical values are `BZERO + BSCALE * stored`, and integer images may
//! declare a `BLANK` stored value for missing samples.

use std::fmt::Debug;

use bytes::{BufMut, BytesMut};

use crate::error::FitsError;
use crate::io::{read_f32_be, read_f64_be, read_u16_be, read_u32_be, read_u64_be, RangeReader};

use super::header::Header;
use super::parser::{FitsFile, Hdu, HduKind};

// =============================================================================
// Bitpix
// =============================================================================

/// Sample storage type declared by `BITPIX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitpix {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Bitpix {
    pub fn from_value(value: i64) -> Result<Self, FitsError> {
        match value {
            8 => Ok(Bitpix::U8),
            16 => Ok(Bitpix::I16),
            32 => Ok(Bitpix::I32),
            64 => Ok(Bitpix::I64),
            -32 => Ok(Bitpix::F32),
            -64 => Ok(Bitpix::F64),
            other => Err(FitsError::UnsupportedBitpix(other)),
        }
    }

    pub fn from_header(header: &Header) -> Result<Self, FitsError> {
        Self::from_value(header.i64("BITPIX")?)
    }

    /// The `BITPIX` keyword value.
    pub const fn value(self) -> i64 {
        match self {
            Bitpix::U8 => 8,
            Bitpix::I16 => 16,
            Bitpix::I32 => 32,
            Bitpix::I64 => 64,
            Bitpix::F32 => -32,
            Bitpix::F64 => -64,
        }
    }

    pub const fn bytes_per_sample(self) -> usize {
        (self.value().unsigned_abs() / 8) as usize
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Bitpix::F32 | Bitpix::F64)
    }
}

// =============================================================================
// Scaling
// =============================================================================

/// Linear scaling from stored to physical values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub bscale: f64,
    pub bzero: f64,
    /// Stored value marking a missing sample (integer images only)
    pub blank: Option<i64>,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            bscale: 1.0,
            bzero: 0.0,
            blank: None,
        }
    }
}

impl Scaling {
    pub fn from_header(header: &Header) -> Result<Self, FitsError> {
        Ok(Self {
            bscale: header.opt_f64("BSCALE")?.unwrap_or(1.0),
            bzero: header.opt_f64("BZERO")?.unwrap_or(0.0),
            blank: header.opt_i64("BLANK")?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.bscale == 1.0 && self.bzero == 0.0
    }

    #[inline]
    fn apply(&self, stored: f64) -> f64 {
        self.bzero + self.bscale * stored
    }
}

// =============================================================================
// Sample
// =============================================================================

/// An in-memory pixel type that can be decoded from and encoded to FITS.
pub trait Sample: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// `BITPIX` used when writing this type.
    const BITPIX: Bitpix;

    /// Type name for error messages.
    const NAME: &'static str;

    /// Decode big-endian stored samples.
    fn decode(bitpix: Bitpix, scaling: &Scaling, bytes: &[u8]) -> Result<Vec<Self>, FitsError>;

    /// Append this sample big-endian.
    fn encode(self, buf: &mut BytesMut);
}

/// Physical values as `f32`, with `BLANK` samples mapped to NaN.
impl Sample for f32 {
    const BITPIX: Bitpix = Bitpix::F32;
    const NAME: &'static str = "f32";

    fn decode(bitpix: Bitpix, scaling: &Scaling, bytes: &[u8]) -> Result<Vec<Self>, FitsError> {
        let chunks = bytes.chunks_exact(bitpix.bytes_per_sample());

        if bitpix == Bitpix::F32 && scaling.is_identity() {
            return Ok(chunks.map(read_f32_be).collect());
        }

        let integer = |stored: i64| match scaling.blank {
            Some(blank) if blank == stored => f32::NAN,
            _ => scaling.apply(stored as f64) as f32,
        };

        let values = match bitpix {
            Bitpix::U8 => chunks.map(|b| integer(b[0] as i64)).collect(),
            Bitpix::I16 => chunks.map(|b| integer(read_u16_be(b) as i16 as i64)).collect(),
            Bitpix::I32 => chunks.map(|b| integer(read_u32_be(b) as i32 as i64)).collect(),
            Bitpix::I64 => chunks.map(|b| integer(read_u64_be(b) as i64)).collect(),
            Bitpix::F32 => chunks
                .map(|b| scaling.apply(read_f32_be(b) as f64) as f32)
                .collect(),
            Bitpix::F64 => chunks
                .map(|b| scaling.apply(read_f64_be(b)) as f32)
                .collect(),
        };
        Ok(values)
    }

    fn encode(self, buf: &mut BytesMut) {
        buf.put_f32(self);
    }
}

/// Raw stored integers, unscaled. Used for bitmask planes, where scaling
/// would corrupt the bit pattern.
impl Sample for i32 {
    const BITPIX: Bitpix = Bitpix::I32;
    const NAME: &'static str = "i32";

    fn decode(bitpix: Bitpix, _scaling: &Scaling, bytes: &[u8]) -> Result<Vec<Self>, FitsError> {
        let chunks = bytes.chunks_exact(bitpix.bytes_per_sample());
        match bitpix {
            Bitpix::U8 => Ok(chunks.map(|b| b[0] as i32).collect()),
            Bitpix::I16 => Ok(chunks.map(|b| read_u16_be(b) as i16 as i32).collect()),
            Bitpix::I32 => Ok(chunks.map(|b| read_u32_be(b) as i32).collect()),
            other => Err(FitsError::IncompatibleSampleType {
                bitpix: other.value(),
                target: Self::NAME,
            }),
        }
    }

    fn encode(self, buf: &mut BytesMut) {
        buf.put_i32(self);
    }
}

// =============================================================================
// ImageData
// =============================================================================

/// A decoded 2-D image in row-major order (`NAXIS1` is the fast axis).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Sample> ImageData<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, FitsError> {
        let expected = width.checked_mul(height).ok_or(FitsError::DataSizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;
        if data.len() != expected {
            return Err(FitsError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// An image with every sample set to `value`.
    ///
    /// Returns `None` if `width * height` overflows or the buffer cannot be
    /// allocated.
    pub fn filled(width: usize, height: usize, value: T) -> Option<Self> {
        let len = width.checked_mul(height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, value);
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Apply `f` to every sample.
    pub fn map<U: Sample>(self, f: impl Fn(T) -> U) -> ImageData<U> {
        ImageData {
            width: self.width,
            height: self.height,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    /// Encode every sample big-endian, unpadded.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.data.len() * T::BITPIX.bytes_per_sample());
        for &sample in &self.data {
            sample.encode(&mut buf);
        }
        buf
    }
}

/// Width and height of a 2-D image HDU.
pub fn image_dimensions(hdu: &Hdu) -> Result<(usize, usize), FitsError> {
    if hdu.is_compressed_image() {
        return Err(FitsError::UnsupportedCompression(hdu.index));
    }
    if !matches!(hdu.kind, HduKind::Primary | HduKind::Image) {
        return Err(FitsError::NotAnImage {
            index: hdu.index,
            reason: format!("{:?} extension", hdu.kind),
        });
    }

    let naxis = hdu.header.i64("NAXIS")?;
    if naxis != 2 {
        return Err(FitsError::NotAnImage {
            index: hdu.index,
            reason: format!("NAXIS = {}", naxis),
        });
    }

    let axis = |keyword: &str| -> Result<usize, FitsError> {
        let len = hdu.header.i64(keyword)?;
        usize::try_from(len).map_err(|_| FitsError::InvalidKeywordValue {
            keyword: keyword.to_string(),
            message: format!("negative axis length {}", len),
        })
    };
    Ok((axis("NAXIS1")?, axis("NAXIS2")?))
}

impl<R: RangeReader> FitsFile<R> {
    /// Read and decode a 2-D image HDU.
    ///
    /// # Errors
    /// - `UnsupportedCompression` for tile-compressed images
    /// - `NotAnImage` if the HDU is a table or not two-dimensional
    /// - `IncompatibleSampleType` if `T` cannot represent the stored type
    pub async fn read_image<T: Sample>(&self, hdu: &Hdu) -> Result<ImageData<T>, FitsError> {
        let (width, height) = image_dimensions(hdu)?;
        let bitpix = Bitpix::from_header(&hdu.header)?;
        let scaling = Scaling::from_header(&hdu.header)?;

        let data = self.read_data(hdu).await?;
        let expected = width * height * bitpix.bytes_per_sample();
        if data.len() != expected {
            return Err(FitsError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let samples = T::decode(bitpix, &scaling, &data)?;
        ImageData::new(width, height, samples)
    }
}
