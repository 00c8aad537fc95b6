//! Channel stitching.
//!
//! ```text
//!  (min_x, max_y) ┌──────────────────────────────┐ (max_x, max_y)
//!                 │        ┌──────────┐          │
//!                 │        │  tile B  │          │
//!                 │ ┌──────┼───┐      │          │
//!                 │ │tile A│   │      │          │
//!                 │ │      └───┼──────┘          │
//!                 │ └──────────┘                 │
//!  (min_x, min_y) └──────────────────────────────┘
//! ```
//!
//! A tile lands at `(-CRPIX1 - min_x, -CRPIX2 - min_y)` on the canvas. Tiles
//! are pasted in input order, so for image and variance planes the last tile
//! covering a pixel wins.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{StitchError, TileReadError};
use crate::format::{Header, ImageData};
use crate::tile::{open_tile, TilePlacement, TileSource};

use super::bbox::BoundingBox;
use super::calibration::resolve_zero_point;
use super::canvas::Canvas;
use super::channel::ChannelKind;
use super::normalize::{ChannelNormalizer, TileContext};

/// A tile left out of a channel, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTile {
    pub path: String,
    pub reason: String,
}

/// Outcome of stitching one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub pasted: Vec<String>,
    pub skipped: Vec<SkippedTile>,
    /// Mask plane names in canonical bit order (mask channel only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mask_planes: Vec<String>,
}

impl ChannelReport {
    fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            pasted: Vec::new(),
            skipped: Vec::new(),
            mask_planes: Vec::new(),
        }
    }
}

/// A finished channel, ready to be written.
#[derive(Debug)]
pub struct StitchedChannel<N: ChannelNormalizer> {
    pub image: ImageData<N::Sample>,
    pub header: Header,
    pub state: N::State,
    pub report: ChannelReport,
}

/// Header of the most recent successful tile, with what is needed to
/// rewrite its placement.
struct CapturedHeader {
    header: Header,
    placement: TilePlacement,
    ltv1: f64,
    ltv2: f64,
}

/// Stitches the channels of a tile set onto a shared canvas.
pub struct MosaicCompositor<'a, S: TileSource> {
    source: &'a S,
    files: &'a [String],
    bbox: BoundingBox,
}

impl<'a, S: TileSource> MosaicCompositor<'a, S> {
    /// `bbox` must contain every tile, as computed by
    /// [`containing_bbox`](super::containing_bbox).
    pub fn new(source: &'a S, files: &'a [String], bbox: BoundingBox) -> Self {
        Self {
            source,
            files,
            bbox,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Stitch one channel.
    ///
    /// Tiles that cannot be read are logged, recorded in the report and
    /// skipped.
    ///
    /// # Errors
    /// - `NonIntegerReferencePixel` if any tile's reference pixel is fractional
    /// - `NoTilesReadable` if no tile could be pasted
    pub async fn stitch<N: ChannelNormalizer>(
        &self,
        normalizer: &N,
    ) -> Result<StitchedChannel<N>, StitchError> {
        let kind = normalizer.kind();
        let mut canvas = Canvas::new(&self.bbox, normalizer.fill())?;
        info!(
            "Allocating {} canvas {} x {}",
            kind,
            canvas.width(),
            canvas.height()
        );

        let mut state = N::State::default();
        let mut report = ChannelReport::new(kind);
        let mut captured: Option<CapturedHeader> = None;

        for path in self.files {
            info!("Pasting {} ({})", path, kind);
            match self
                .paste_tile(normalizer, path, &mut canvas, &mut state)
                .await
            {
                Ok(tile) => {
                    captured = Some(tile);
                    report.pasted.push(path.clone());
                }
                Err(err) if err.is_fatal() => return Err(StitchError::from_tile(path, err)),
                Err(err) => {
                    warn!("Skipping {} for the {} channel: {}", path, kind, err);
                    report.skipped.push(SkippedTile {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let captured = captured.ok_or(StitchError::NoTilesReadable { channel: kind })?;
        let mut header = self.rewrite_placement(captured);
        normalizer.finalize_header(&mut header, &state);

        Ok(StitchedChannel {
            image: canvas.into_image(),
            header,
            state,
            report,
        })
    }

    async fn paste_tile<N: ChannelNormalizer>(
        &self,
        normalizer: &N,
        path: &str,
        canvas: &mut Canvas<N::Sample>,
        state: &mut N::State,
    ) -> Result<CapturedHeader, TileReadError> {
        let mut file = open_tile(self.source, path).await?;
        let hdu = file.hdu(normalizer.kind().hdu_index()).await?;

        let placement = TilePlacement::from_header(&hdu.header)?;
        let x = placement.min_x.saturating_sub(self.bbox.min_x);
        let y = placement.min_y.saturating_sub(self.bbox.min_y);
        if !self.bbox.contains(&placement) {
            return Err(TileReadError::OutOfCanvas {
                x,
                y,
                width: placement.width,
                height: placement.height,
                canvas_width: self.bbox.width(),
                canvas_height: self.bbox.height(),
            });
        }
        let ltv1 = hdu.header.opt_f64("LTV1")?.unwrap_or(0.0);
        let ltv2 = hdu.header.opt_f64("LTV2")?.unwrap_or(0.0);

        let raw = file.read_image::<N::Sample>(&hdu).await?;
        let zero_point = if normalizer.requires_calibration() {
            Some(resolve_zero_point(&mut file).await?)
        } else {
            None
        };
        debug!("{}: zero-point {:?}", path, zero_point);

        let context = TileContext {
            path,
            header: &hdu.header,
            zero_point,
        };
        let normalized = normalizer.normalize(raw, &context, state)?;
        canvas.paste(x, y, &normalized, N::merge)?;

        Ok(CapturedHeader {
            header: hdu.header.clone(),
            placement,
            ltv1,
            ltv2,
        })
    }

    /// Move the reference pixel to the canvas frame and shift the physical
    /// offset (`LTV`) by the same amount.
    fn rewrite_placement(&self, captured: CapturedHeader) -> Header {
        let CapturedHeader {
            mut header,
            placement,
            ltv1,
            ltv2,
        } = captured;

        let dx = placement.min_x - self.bbox.min_x;
        let dy = placement.min_y - self.bbox.min_y;
        header.set("LTV1", ltv1 + dx as f64);
        header.set("LTV2", ltv2 + dy as f64);
        header.set("CRPIX1", -self.bbox.min_x as f64);
        header.set("CRPIX2", -self.bbox.min_y as f64);
        header
    }
}
