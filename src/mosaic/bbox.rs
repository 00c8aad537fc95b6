//! Bounding box of a tile set.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{StitchError, TileReadError};
use crate::tile::{open_tile, TilePlacement, TileSource};

use super::channel::ChannelKind;

/// Integer box `[min_x, max_x) x [min_y, max_y)` on the shared pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingBox {
    /// The box covered by a single placement.
    pub fn of(placement: &TilePlacement) -> Self {
        Self {
            min_x: placement.min_x,
            min_y: placement.min_y,
            max_x: placement.max_x(),
            max_y: placement.max_y(),
        }
    }

    pub fn width(&self) -> u64 {
        extent(self.min_x, self.max_x)
    }

    pub fn height(&self) -> u64 {
        extent(self.min_y, self.max_y)
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether `placement` lies entirely inside this box.
    pub fn contains(&self, placement: &TilePlacement) -> bool {
        placement.min_x >= self.min_x
            && placement.min_y >= self.min_y
            && placement.max_x() <= self.max_x
            && placement.max_y() <= self.max_y
    }
}

/// Length of `[min, max)`, zero when empty. Exact across the whole `i64` range.
fn extent(min: i64, max: i64) -> u64 {
    if max > min {
        max.abs_diff(min)
    } else {
        0
    }
}

/// Compute the box containing every tile, reading only the image HDU header
/// of each.
///
/// Any failure is fatal: the canvas cannot be sized without every tile.
pub async fn containing_bbox<S: TileSource>(
    source: &S,
    files: &[String],
) -> Result<BoundingBox, StitchError> {
    if files.is_empty() {
        return Err(StitchError::EmptyTileList);
    }

    info!("Computing bounding box of {} tiles", files.len());

    let mut bbox: Option<BoundingBox> = None;
    for path in files {
        let placement = read_placement(source, path)
            .await
            .map_err(|err| StitchError::from_tile(path, err))?;
        debug!(
            "{}: {}x{} at ({}, {})",
            path, placement.width, placement.height, placement.min_x, placement.min_y
        );

        let tile_box = BoundingBox::of(&placement);
        bbox = Some(match bbox {
            Some(b) => b.union(&tile_box),
            None => tile_box,
        });
    }

    bbox.ok_or(StitchError::EmptyTileList)
}

async fn read_placement<S: TileSource>(
    source: &S,
    path: &str,
) -> Result<TilePlacement, TileReadError> {
    let mut file = open_tile(source, path).await?;
    let hdu = file.hdu(ChannelKind::Image.hdu_index()).await?;
    TilePlacement::from_header(&hdu.header)
}
