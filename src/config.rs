//! Command-line configuration for fits-mosaic.
//!
//! # Example
//!
//! ```text
//! fits-mosaic -o stitched.fits --mask --variance patches/calexp-*.fits
//! ```
//!
//! # Environment Variables
//!
//! - `MOSAIC_OUT` - Output file path (instead of `--out`)
//! - `RUST_LOG` - Log filter, overriding `--verbose`

use std::path::PathBuf;

use clap::Parser;

use crate::mosaic::{ChannelKind, MosaicRequest};

/// fits-mosaic - stitch adjacent FITS patches into one mosaic.
///
/// Every tile is placed by its reference pixel (CRPIX1/CRPIX2), rescaled to
/// a common photometric zero-point, and pasted in the order given. Mask
/// planes are remapped to a shared bit table and OR-ed together.
#[derive(Parser, Debug, Clone)]
#[command(name = "fits-mosaic")]
#[command(author, about, long_about = None)]
pub struct Config {
    /// Output FITS file (overwritten if it exists).
    #[arg(short, long, env = "MOSAIC_OUT")]
    pub out: PathBuf,

    /// Do not write the image channel.
    #[arg(long = "no-image", action = clap::ArgAction::SetFalse)]
    pub image: bool,

    /// Write the mask channel.
    #[arg(short, long)]
    pub mask: bool,

    /// Write the variance channel.
    #[arg(short = 'V', long)]
    pub variance: bool,

    /// Print a JSON run summary to stdout.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Patch files to be stitched, in paste order.
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    pub files: Vec<String>,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns an error message if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.channels().is_empty() {
            return Err(
                "No output channel selected. Drop --no-image or add --mask / --variance"
                    .to_string(),
            );
        }

        if self.out.as_os_str().is_empty() {
            return Err("Output path is required. Set --out or MOSAIC_OUT".to_string());
        }

        if self.files.iter().any(|f| f.is_empty()) {
            return Err("Input file paths must not be empty".to_string());
        }

        Ok(())
    }

    /// Selected channels, in output order.
    pub fn channels(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|c| match c {
                ChannelKind::Image => self.image,
                ChannelKind::Mask => self.mask,
                ChannelKind::Variance => self.variance,
            })
            .collect()
    }

    pub fn request(&self) -> MosaicRequest {
        MosaicRequest {
            files: self.files.clone(),
            channels: self.channels(),
        }
    }
}
