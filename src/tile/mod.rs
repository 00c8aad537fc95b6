//! Tile access.
//!
//! - [`TileSource`]: opens tiles by path (local files or in-memory buffers)
//! - [`TilePlacement`]: where a tile lands on the shared pixel grid

mod placement;
mod source;

pub use placement::{reference_pixel, TilePlacement};
pub use source::{open_tile, LocalTileSource, MemoryTileSource, TileSource};
