//! Per-channel sample normalization.
//!
//! The compositor is generic over a [`ChannelNormalizer`], which decides how
//! a tile's raw samples become canvas samples, how overlapping tiles combine,
//! and what the composite header says about the result.
//!
//! - [`ImageNormalizer`]: flux rescaled to a common zero-point, last write wins
//! - [`VarianceNormalizer`]: variance rescaled by the squared flux ratio
//! - [`MaskNormalizer`]: tile-local mask bits remapped to canonical bits, OR-ed

use std::collections::HashMap;

use serde::Serialize;

use crate::error::TileReadError;
use crate::format::{Header, ImageData, Sample, Value};

use super::calibration::ZeroPoint;
use super::channel::ChannelKind;

/// Output zero-point of rescaled channels: magnitude 27 per unit flux.
pub fn base_zero_point() -> f64 {
    10f64.powf(27.0 / 2.5)
}

/// Prefix of mask plane keywords (`MP_<name> = <bit>`).
pub const MASK_PLANE_PREFIX: &str = "MP_";

/// Number of canonical mask bits available in an `i32` canvas.
pub const MASK_PLANE_CAPACITY: u32 = 32;

/// What a normalizer knows about the tile being pasted.
#[derive(Debug, Clone, Copy)]
pub struct TileContext<'a> {
    pub path: &'a str,
    /// Header of the channel HDU
    pub header: &'a Header,
    /// Present when [`ChannelNormalizer::requires_calibration`] is true
    pub zero_point: Option<ZeroPoint>,
}

/// Channel-specific behaviour plugged into the compositor.
pub trait ChannelNormalizer: Send + Sync {
    type Sample: Sample;

    /// Cross-tile state accumulated during one stitch.
    type State: Default + Send;

    fn kind(&self) -> ChannelKind;

    /// Canvas value where no tile landed.
    fn fill(&self) -> Self::Sample;

    /// Whether tiles must have a resolved zero-point before normalizing.
    fn requires_calibration(&self) -> bool;

    fn normalize(
        &self,
        raw: ImageData<Self::Sample>,
        tile: &TileContext<'_>,
        state: &mut Self::State,
    ) -> Result<ImageData<Self::Sample>, TileReadError>;

    /// Combine a tile sample into the canvas sample beneath it.
    fn merge(canvas: &mut Self::Sample, tile: Self::Sample);

    /// Rewrite calibration or mask keywords of the composite header.
    fn finalize_header(&self, header: &mut Header, state: &Self::State);
}

/// Multiplier taking a tile's flux scale to the base zero-point.
fn flux_ratio(tile: &TileContext<'_>) -> f64 {
    tile.zero_point
        .map(|zp| zp.value / base_zero_point())
        .unwrap_or(f64::NAN)
}

fn rebase_header(header: &mut Header) {
    header.set("FLUXMAG0", base_zero_point());
    header.remove("FLUXMAG0ERR");
}

// =============================================================================
// Image and variance
// =============================================================================

/// Science image: `raw / (zp / base)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ChannelNormalizer for ImageNormalizer {
    type Sample = f32;
    type State = ();

    fn kind(&self) -> ChannelKind {
        ChannelKind::Image
    }

    fn fill(&self) -> f32 {
        f32::NAN
    }

    fn requires_calibration(&self) -> bool {
        true
    }

    fn normalize(
        &self,
        raw: ImageData<f32>,
        tile: &TileContext<'_>,
        _state: &mut (),
    ) -> Result<ImageData<f32>, TileReadError> {
        let ratio = flux_ratio(tile);
        Ok(raw.map(|v| (v as f64 / ratio) as f32))
    }

    fn merge(canvas: &mut f32, tile: f32) {
        *canvas = tile;
    }

    fn finalize_header(&self, header: &mut Header, _state: &()) {
        rebase_header(header);
    }
}

/// Variance plane: `raw / (zp / base)^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceNormalizer;

impl ChannelNormalizer for VarianceNormalizer {
    type Sample = f32;
    type State = ();

    fn kind(&self) -> ChannelKind {
        ChannelKind::Variance
    }

    fn fill(&self) -> f32 {
        f32::NAN
    }

    fn requires_calibration(&self) -> bool {
        true
    }

    fn normalize(
        &self,
        raw: ImageData<f32>,
        tile: &TileContext<'_>,
        _state: &mut (),
    ) -> Result<ImageData<f32>, TileReadError> {
        let ratio = flux_ratio(tile);
        let squared = ratio * ratio;
        Ok(raw.map(|v| (v as f64 / squared) as f32))
    }

    fn merge(canvas: &mut f32, tile: f32) {
        *canvas = tile;
    }

    fn finalize_header(&self, header: &mut Header, _state: &()) {
        rebase_header(header);
    }
}

// =============================================================================
// Mask
// =============================================================================

/// Canonical bit assignment for mask plane names, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MaskBitMap {
    names: Vec<String>,
}

impl MaskBitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Canonical bit of `name`, if assigned.
    pub fn bit(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// Canonical bit of `name`, assigning the next free bit if it is new.
    pub fn assign(&mut self, name: &str) -> Result<u32, TileReadError> {
        if let Some(bit) = self.bit(name) {
            return Ok(bit);
        }
        if self.names.len() as u32 >= MASK_PLANE_CAPACITY {
            return Err(TileReadError::MaskPlaneOverflow {
                name: name.to_string(),
                capacity: MASK_PLANE_CAPACITY,
            });
        }
        self.names.push(name.to_string());
        Ok(self.names.len() as u32 - 1)
    }

    /// `(name, canonical bit)` pairs in bit order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.names
            .iter()
            .enumerate()
            .map(|(bit, name)| (name.as_str(), bit as u32))
    }
}

/// Bitmask plane: tile-local `MP_` bits remapped to canonical bits, OR-ed
/// where tiles overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskNormalizer;

impl MaskNormalizer {
    /// `(name, local bit)` for every `MP_` card of a tile, validated.
    fn local_planes(header: &Header) -> Result<Vec<(String, u32)>, TileReadError> {
        header
            .with_prefix(MASK_PLANE_PREFIX)
            .map(|(key, value)| {
                let name = &key[MASK_PLANE_PREFIX.len()..];
                let bit = match value {
                    Value::Integer(bit) => u32::try_from(*bit)
                        .ok()
                        .filter(|b| *b < MASK_PLANE_CAPACITY),
                    _ => None,
                };
                bit.map(|bit| (name.to_string(), bit))
                    .ok_or_else(|| TileReadError::MaskPlane {
                        key: key.to_string(),
                        message: format!("expected a bit index in 0..32, got {}", value),
                    })
            })
            .collect()
    }
}

impl ChannelNormalizer for MaskNormalizer {
    type Sample = i32;
    type State = MaskBitMap;

    fn kind(&self) -> ChannelKind {
        ChannelKind::Mask
    }

    fn fill(&self) -> i32 {
        0
    }

    fn requires_calibration(&self) -> bool {
        false
    }

    fn normalize(
        &self,
        raw: ImageData<i32>,
        tile: &TileContext<'_>,
        bits: &mut MaskBitMap,
    ) -> Result<ImageData<i32>, TileReadError> {
        let planes = Self::local_planes(tile.header)?;

        // Check capacity before assigning so a rejected tile leaves no trace
        let mut new_names: Vec<&str> = Vec::new();
        for (name, _) in &planes {
            if bits.bit(name).is_none() && !new_names.contains(&name.as_str()) {
                new_names.push(name);
            }
        }
        if bits.len() + new_names.len() > MASK_PLANE_CAPACITY as usize {
            return Err(TileReadError::MaskPlaneOverflow {
                name: new_names[MASK_PLANE_CAPACITY as usize - bits.len()].to_string(),
                capacity: MASK_PLANE_CAPACITY,
            });
        }

        let mut remap: HashMap<u32, u32> = HashMap::with_capacity(planes.len());
        for (name, local) in &planes {
            let canonical = bits.assign(name)?;
            *remap.entry(*local).or_insert(0) |= 1u32 << canonical;
        }

        Ok(raw.map(|v| {
            let v = v as u32;
            remap
                .iter()
                .filter(|(local, _)| v & (1u32 << **local) != 0)
                .fold(0u32, |acc, (_, canonical)| acc | canonical) as i32
        }))
    }

    fn merge(canvas: &mut i32, tile: i32) {
        *canvas |= tile;
    }

    fn finalize_header(&self, header: &mut Header, bits: &MaskBitMap) {
        let stale: Vec<String> = header
            .with_prefix(MASK_PLANE_PREFIX)
            .map(|(key, _)| key.to_string())
            .collect();
        for key in stale {
            header.remove(&key);
        }
        for (name, bit) in bits.iter() {
            header.set(&format!("{}{}", MASK_PLANE_PREFIX, name), bit as i64);
        }
    }
}
