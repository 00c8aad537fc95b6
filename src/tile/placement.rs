//! Tile placement on the shared pixel grid.
//!
//! Every tile declares the pixel (`CRPIX1`, `CRPIX2`) that maps to the shared
//! origin, so its lower-left sample sits at `(-CRPIX1, -CRPIX2)`. Tiles are
//! only ever translated by whole pixels: a fractional reference pixel is an
//! error, never truncated.

use crate::error::{FitsError, TileReadError};
use crate::format::Header;

/// Largest magnitude at which every integer is exact in an `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Rectangle `[min_x, min_x + width) x [min_y, min_y + height)` covered by a
/// tile in the shared coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlacement {
    pub min_x: i64,
    pub min_y: i64,
    pub width: u64,
    pub height: u64,
}

impl TilePlacement {
    /// Derive the placement from an image HDU header.
    ///
    /// # Errors
    /// - `NonIntegerReferencePixel` if `CRPIX1` or `CRPIX2` is not integral
    /// - `Malformed` if a keyword is missing or mistyped
    pub fn from_header(header: &Header) -> Result<Self, TileReadError> {
        let ref_x = reference_pixel(header, "CRPIX1")?;
        let ref_y = reference_pixel(header, "CRPIX2")?;
        let placement = Self {
            min_x: -ref_x,
            min_y: -ref_y,
            width: axis_length(header, "NAXIS1")?,
            height: axis_length(header, "NAXIS2")?,
        };
        check_extent(placement.min_x, placement.width, "NAXIS1")?;
        check_extent(placement.min_y, placement.height, "NAXIS2")?;
        Ok(placement)
    }

    /// Saturates at `i64::MAX`; [`from_header`](Self::from_header) rejects
    /// tiles whose far edge is not representable.
    pub fn max_x(&self) -> i64 {
        self.min_x.saturating_add_unsigned(self.width)
    }

    pub fn max_y(&self) -> i64 {
        self.min_y.saturating_add_unsigned(self.height)
    }
}

/// Read a reference pixel keyword, requiring an exact integer.
pub fn reference_pixel(header: &Header, axis: &'static str) -> Result<i64, TileReadError> {
    let value = header.f64(axis)?;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > MAX_EXACT_INTEGER {
        return Err(TileReadError::NonIntegerReferencePixel { axis, value });
    }
    Ok(value as i64)
}

/// The far edge `min + len` must fit in the shared coordinate range.
fn check_extent(min: i64, len: u64, keyword: &str) -> Result<(), TileReadError> {
    if min.checked_add_unsigned(len).is_some() {
        return Ok(());
    }
    Err(TileReadError::Malformed(FitsError::InvalidKeywordValue {
        keyword: keyword.to_string(),
        message: format!(
            "tile starting at {} with length {} overflows the pixel grid",
            min, len
        ),
    }))
}

fn axis_length(header: &Header, keyword: &str) -> Result<u64, TileReadError> {
    let len = header.i64(keyword)?;
    u64::try_from(len).map_err(|_| {
        TileReadError::Malformed(FitsError::InvalidKeywordValue {
            keyword: keyword.to_string(),
            message: format!("negative axis length {}", len),
        })
    })
}
