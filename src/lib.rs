//! # fits-mosaic
//!
//! Stitches overlapping astronomical FITS tiles into one mosaic.
//!
//! Every tile declares where it sits on a shared pixel grid through its
//! reference pixel (`CRPIX1`, `CRPIX2`). The library computes the box that
//! contains every tile, allocates one canvas per output channel, and pastes
//! the tiles in input order:
//!
//! - **image** and **variance** samples are rescaled to a common photometric
//!   zero-point, resolved inline (`FLUXMAG0`) or through the tile's
//!   calibration archive tables
//! - **mask** bits are remapped from each tile's `MP_<name>` planes to a
//!   shared bit table and OR-ed together
//!
//! The composite header is taken from the last tile pasted, with its
//! placement and calibration keywords rewritten for the mosaic.
//!
//! ## Architecture
//!
//! - [`io`] - Range readers over local files and memory
//! - [`mod@format`] - FITS header, image, binary table parsing and writing
//! - [`tile`] - Tile sources and placement
//! - [`mosaic`] - Bounding box, calibration, normalization and compositing
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use fits_mosaic::{build_mosaic, ChannelKind, LocalTileSource, MosaicRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = MosaicRequest {
//!         files: vec!["patch-0,0.fits".to_string(), "patch-0,1.fits".to_string()],
//!         channels: vec![ChannelKind::Image, ChannelKind::Mask],
//!     };
//!     let output = build_mosaic(&LocalTileSource::new(), &request).await?;
//!     if let Some(data) = output.data {
//!         tokio::fs::write("stitched.fits", data).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod mosaic;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{CalibrationError, FitsError, IoError, StitchError, TileReadError};
pub use format::{FitsFile, FitsWriter, Header, ImageData};
pub use io::{LocalFileReader, MemoryReader, RangeReader};
pub use mosaic::{
    build_mosaic, containing_bbox, resolve_zero_point, BoundingBox, ChannelKind, ChannelNormalizer,
    ImageNormalizer, MaskBitMap, MaskNormalizer, MosaicCompositor, MosaicOutput, MosaicRequest,
    MosaicSummary, VarianceNormalizer, ZeroPoint,
};
pub use tile::{LocalTileSource, MemoryTileSource, TilePlacement, TileSource};
