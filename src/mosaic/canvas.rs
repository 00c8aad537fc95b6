//! The output raster of one channel.

use crate::error::{StitchError, TileReadError};
use crate::format::{ImageData, Sample};

use super::bbox::BoundingBox;

/// A channel raster covering the whole bounding box, filled with a no-data
/// value until tiles are pasted over it.
#[derive(Debug, Clone)]
pub struct Canvas<T> {
    image: ImageData<T>,
}

impl<T: Sample> Canvas<T> {
    /// Allocate a canvas covering `bbox`.
    ///
    /// # Errors
    /// `CanvasTooLarge` if the sample count overflows or cannot be allocated.
    pub fn new(bbox: &BoundingBox, fill: T) -> Result<Self, StitchError> {
        let too_large = || StitchError::CanvasTooLarge {
            width: bbox.width(),
            height: bbox.height(),
        };
        let width = usize::try_from(bbox.width()).map_err(|_| too_large())?;
        let height = usize::try_from(bbox.height()).map_err(|_| too_large())?;
        let bytes = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(std::mem::size_of::<T>()));
        if !bytes.is_some_and(|b| b <= isize::MAX as usize) {
            return Err(too_large());
        }

        let image = ImageData::filled(width, height, fill).ok_or_else(too_large)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    pub fn image(&self) -> &ImageData<T> {
        &self.image
    }

    pub fn into_image(self) -> ImageData<T> {
        self.image
    }

    /// Combine `tile` into the canvas with its first sample at `(x, y)`,
    /// calling `merge(canvas_sample, tile_sample)` for every covered pixel.
    ///
    /// The canvas is left untouched if the tile does not fit.
    pub fn paste(
        &mut self,
        x: i64,
        y: i64,
        tile: &ImageData<T>,
        merge: impl Fn(&mut T, T),
    ) -> Result<(), TileReadError> {
        let within = |start: i64, len: usize, limit: usize| {
            u64::try_from(start)
                .ok()
                .and_then(|start| start.checked_add(len as u64))
                .is_some_and(|end| end <= limit as u64)
        };
        let fits = within(x, tile.width(), self.width()) && within(y, tile.height(), self.height());
        if !fits {
            return Err(TileReadError::OutOfCanvas {
                x,
                y,
                width: tile.width() as u64,
                height: tile.height() as u64,
                canvas_width: self.width() as u64,
                canvas_height: self.height() as u64,
            });
        }

        let (x, y) = (x as usize, y as usize);
        for row in 0..tile.height() {
            let dst = &mut self.image.row_mut(y + row)[x..x + tile.width()];
            for (d, s) in dst.iter_mut().zip(tile.row(row)) {
                merge(d, *s);
            }
        }
        Ok(())
    }
}
