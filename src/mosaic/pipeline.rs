//! End-to-end mosaic build: bounding box, every selected channel, and the
//! serialized composite.

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info};

use crate::error::StitchError;
use crate::format::{FitsWriter, Header};
use crate::tile::TileSource;

use super::bbox::{containing_bbox, BoundingBox};
use super::channel::ChannelKind;
use super::compositor::{ChannelReport, MosaicCompositor};
use super::normalize::{ChannelNormalizer, ImageNormalizer, MaskNormalizer, VarianceNormalizer};

/// What to stitch.
#[derive(Debug, Clone)]
pub struct MosaicRequest {
    /// Tile paths, in paste order
    pub files: Vec<String>,
    /// Channels to emit; written in image, mask, variance order
    pub channels: Vec<ChannelKind>,
}

/// A channel that produced no output.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelFailure {
    pub channel: ChannelKind,
    pub error: String,
}

/// Run summary, printed as JSON by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct MosaicSummary {
    pub tiles: usize,
    pub bbox: BoundingBox,
    pub width: u64,
    pub height: u64,
    pub channels: Vec<ChannelReport>,
    pub failures: Vec<ChannelFailure>,
}

/// Result of a mosaic build.
#[derive(Debug, Clone)]
pub struct MosaicOutput {
    /// The composite FITS file, absent when no channel succeeded
    pub data: Option<Bytes>,
    pub summary: MosaicSummary,
}

impl MosaicOutput {
    /// Whether every requested channel was written.
    pub fn is_complete(&self) -> bool {
        self.data.is_some() && self.summary.failures.is_empty()
    }
}

/// Stitch every requested channel into one FITS file.
///
/// A channel in which no tile could be read is reported in
/// [`MosaicSummary::failures`] without stopping the others.
///
/// # Errors
/// - `NoChannelSelected` / `EmptyTileList` for an empty request
/// - any boundary failure, and `NonIntegerReferencePixel` from any channel
pub async fn build_mosaic<S: TileSource>(
    source: &S,
    request: &MosaicRequest,
) -> Result<MosaicOutput, StitchError> {
    let channels: Vec<ChannelKind> = ChannelKind::ALL
        .into_iter()
        .filter(|c| request.channels.contains(c))
        .collect();
    if channels.is_empty() {
        return Err(StitchError::NoChannelSelected);
    }

    let bbox = containing_bbox(source, &request.files).await?;
    info!(
        "Bounding box: ({}, {}) - ({}, {})",
        bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
    );

    let compositor = MosaicCompositor::new(source, &request.files, bbox);
    let mut writer = FitsWriter::new();
    writer.write_primary(&Header::new())?;

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for channel in channels {
        let result = match channel {
            ChannelKind::Image => write_channel(&compositor, &ImageNormalizer, &mut writer)
                .await
                .map(|(report, ())| report),
            ChannelKind::Variance => write_channel(&compositor, &VarianceNormalizer, &mut writer)
                .await
                .map(|(report, ())| report),
            ChannelKind::Mask => write_channel(&compositor, &MaskNormalizer, &mut writer)
                .await
                .map(|(mut report, bits)| {
                    report.mask_planes = bits.iter().map(|(name, _)| name.to_string()).collect();
                    report
                }),
        };

        match result {
            Ok(report) => {
                info!(
                    "{} channel: {} tiles pasted, {} skipped",
                    channel,
                    report.pasted.len(),
                    report.skipped.len()
                );
                reports.push(report);
            }
            Err(err @ StitchError::NoTilesReadable { .. }) => {
                error!("{}", err);
                failures.push(ChannelFailure {
                    channel,
                    error: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let data = (!reports.is_empty()).then(|| writer.finish());
    Ok(MosaicOutput {
        data,
        summary: MosaicSummary {
            tiles: request.files.len(),
            bbox,
            width: bbox.width(),
            height: bbox.height(),
            channels: reports,
            failures,
        },
    })
}

async fn write_channel<S: TileSource, N: ChannelNormalizer>(
    compositor: &MosaicCompositor<'_, S>,
    normalizer: &N,
    writer: &mut FitsWriter,
) -> Result<(ChannelReport, N::State), StitchError> {
    let stitched = compositor.stitch(normalizer).await?;
    writer.write_image(&stitched.header, &stitched.image)?;
    Ok((stitched.report, stitched.state))
}
