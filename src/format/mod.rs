//! File format support.
//!
//! Tiles and composites are FITS files. The [`fits`] module parses them
//! through a [`RangeReader`](crate::io::RangeReader), reading only the header
//! blocks and data segments that are asked for, and serializes composites.

pub mod fits;

pub use fits::{
    BinaryTable, Bitpix, Card, FitsFile, FitsWriter, Hdu, HduKind, Header, ImageData, Sample,
    Value,
};
