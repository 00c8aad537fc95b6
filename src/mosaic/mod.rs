//! Mosaic compositing.
//!
//! ```text
//! files ──▶ containing_bbox ──▶ MosaicCompositor::stitch(normalizer) ──▶ FitsWriter
//!                                   │
//!                                   ├─ resolve_zero_point   (image, variance)
//!                                   ├─ ChannelNormalizer::normalize
//!                                   └─ Canvas::paste
//! ```
//!
//! [`build_mosaic`] runs the whole pipeline for a set of channels.

mod bbox;
mod calibration;
mod canvas;
mod channel;
mod compositor;
mod normalize;
mod pipeline;

pub use bbox::{containing_bbox, BoundingBox};
pub use calibration::{
    ab_flux_scale, read_archive_record, resolve_zero_point, CalibrationRecord, ZeroPoint,
};
pub use canvas::Canvas;
pub use channel::ChannelKind;
pub use compositor::{ChannelReport, MosaicCompositor, SkippedTile, StitchedChannel};
pub use normalize::{
    base_zero_point, ChannelNormalizer, ImageNormalizer, MaskBitMap, MaskNormalizer,
    TileContext, VarianceNormalizer, MASK_PLANE_CAPACITY, MASK_PLANE_PREFIX,
};
pub use pipeline::{build_mosaic, ChannelFailure, MosaicOutput, MosaicRequest, MosaicSummary};
