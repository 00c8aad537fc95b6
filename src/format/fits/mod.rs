//! FITS (Flexible Image Transport System) reading and writing.
//!
//! # Key Concepts
//!
//! - **Blocks**: everything is laid out in 2880-byte records. Headers are
//!   padded with spaces, data with zeros.
//!
//! - **Cards**: headers are 80-character `KEYWORD = value / comment` lines,
//!   terminated by an `END` card.
//!
//! - **HDUs**: a primary HDU followed by any number of extensions. Tiles carry
//!   their image, mask and variance planes as IMAGE extensions 1, 2 and 3,
//!   and may carry calibration archives as BINTABLE extensions.
//!
//! - **Byte order**: all binary values are big-endian.

mod card;
mod header;
mod image;
mod parser;
mod table;
mod writer;

pub use card::{Card, Value, CARD_SIZE};
pub use header::Header;
pub use image::{image_dimensions, Bitpix, ImageData, Sample, Scaling};
pub use parser::{data_size, padded_size, FitsFile, Hdu, HduKind, BLOCK_SIZE};
pub use table::{BinaryTable, Column, ColumnFormat, ColumnType};
pub use writer::{is_structural, FitsWriter};
