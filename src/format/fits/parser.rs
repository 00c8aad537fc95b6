//! FITS container structure.
//!
//! A FITS file is a sequence of Header Data Units (HDUs). Each HDU is a
//! header of 80-byte cards padded to a 2880-byte block boundary, followed by
//! a data segment also padded to a block boundary.
//!
//! ```text
//! ┌──────────────────────┐  offset 0
//! │ primary header       │  SIMPLE = T ... END
//! ├──────────────────────┤
//! │ primary data         │  often empty (NAXIS = 0)
//! ├──────────────────────┤
//! │ extension header     │  XTENSION = 'IMAGE' / 'BINTABLE' ... END
//! ├──────────────────────┤
//! │ extension data       │
//! └──────────────────────┘  ...
//! ```
//!
//! HDUs are discovered lazily: asking for HDU `n` reads only the headers of
//! HDUs `0..=n`, and data segments are skipped using the size the header
//! declares.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::FitsError;
use crate::io::RangeReader;

use super::card::{Card, CARD_SIZE};
use super::header::Header;

// =============================================================================
// Constants
// =============================================================================

/// Size of a FITS logical record in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// Upper bound on header blocks per HDU, to stop runaway scans on corrupt files.
const MAX_HEADER_BLOCKS: usize = 4096;

/// Round a byte count up to a whole number of blocks.
#[inline]
pub fn padded_size(len: u64) -> u64 {
    len.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

// =============================================================================
// Hdu
// =============================================================================

/// Kind of an HDU, from its first header card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Image,
    BinaryTable,
    AsciiTable,
    Other,
}

/// A parsed HDU header and the location of its data segment.
#[derive(Debug, Clone)]
pub struct Hdu {
    /// Position in the file (0 = primary)
    pub index: usize,

    pub kind: HduKind,

    pub header: Header,

    /// Byte offset of the first header block
    pub header_offset: u64,

    /// Byte offset of the data segment
    pub data_offset: u64,

    /// Unpadded size of the data segment in bytes
    pub data_size: u64,
}

impl Hdu {
    fn new(
        index: usize,
        header: Header,
        header_offset: u64,
        data_offset: u64,
    ) -> Result<Self, FitsError> {
        let kind = if index == 0 {
            if !header.flag("SIMPLE") {
                return Err(FitsError::NotFits("SIMPLE is not T".to_string()));
            }
            HduKind::Primary
        } else {
            match header.str("XTENSION")?.trim() {
                "IMAGE" => HduKind::Image,
                "BINTABLE" => HduKind::BinaryTable,
                "TABLE" => HduKind::AsciiTable,
                _ => HduKind::Other,
            }
        };

        let data_size = data_size(&header)?;

        Ok(Self {
            index,
            kind,
            header,
            header_offset,
            data_offset,
            data_size,
        })
    }

    /// Offset just past this HDU's padded data segment.
    pub fn end_offset(&self) -> u64 {
        self.data_offset + padded_size(self.data_size)
    }

    /// Whether this is a tile-compressed image stored as a binary table.
    pub fn is_compressed_image(&self) -> bool {
        self.header.flag("ZIMAGE")
    }
}

/// Size of the data segment declared by a header:
/// `|BITPIX| / 8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`.
pub fn data_size(header: &Header) -> Result<u64, FitsError> {
    let naxis = header.i64("NAXIS")?;
    if !(0..=999).contains(&naxis) {
        return Err(FitsError::InvalidKeywordValue {
            keyword: "NAXIS".to_string(),
            message: format!("{} is outside 0..=999", naxis),
        });
    }
    if naxis == 0 {
        return Ok(0);
    }

    let bitpix = header.i64("BITPIX")?;
    let overflow = || FitsError::InvalidKeywordValue {
        keyword: "NAXIS".to_string(),
        message: "data size overflows".to_string(),
    };

    let mut elements: u64 = 1;
    for axis in 1..=naxis {
        let keyword = format!("NAXIS{}", axis);
        let len = header.i64(&keyword)?;
        let len = u64::try_from(len).map_err(|_| FitsError::InvalidKeywordValue {
            keyword: keyword.clone(),
            message: format!("negative axis length {}", len),
        })?;
        elements = elements.checked_mul(len).ok_or_else(overflow)?;
    }

    let pcount = header.opt_i64("PCOUNT")?.unwrap_or(0).max(0) as u64;
    let gcount = header.opt_i64("GCOUNT")?.unwrap_or(1).max(0) as u64;

    bitpix
        .unsigned_abs()
        .checked_div(8)
        .and_then(|bytes| bytes.checked_mul(gcount))
        .and_then(|n| n.checked_mul(pcount.checked_add(elements)?))
        .ok_or_else(overflow)
}

// =============================================================================
// FitsFile
// =============================================================================

/// A FITS file read through a [`RangeReader`].
pub struct FitsFile<R: RangeReader> {
    reader: R,
    hdus: Vec<Arc<Hdu>>,
    next_offset: u64,
    exhausted: bool,
}

impl<R: RangeReader> FitsFile<R> {
    /// Open a FITS file and parse its primary header.
    ///
    /// # Errors
    /// - `NotFits` if the file does not start with a `SIMPLE = T` card
    /// - `MissingEnd` if the primary header is not terminated
    pub async fn open(reader: R) -> Result<Self, FitsError> {
        if reader.size() < BLOCK_SIZE as u64 {
            return Err(FitsError::NotFits(format!(
                "{} is smaller than one FITS block",
                reader.identifier()
            )));
        }

        let mut file = Self {
            reader,
            hdus: Vec::new(),
            next_offset: 0,
            exhausted: false,
        };
        file.load_next().await?;
        Ok(file)
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    /// The primary HDU, always present once the file is open.
    pub fn primary(&self) -> Arc<Hdu> {
        Arc::clone(&self.hdus[0])
    }

    /// Get HDU `index`, scanning forward through the file as needed.
    pub async fn hdu(&mut self, index: usize) -> Result<Arc<Hdu>, FitsError> {
        while self.hdus.len() <= index {
            if !self.load_next().await? {
                return Err(FitsError::HduNotFound(index));
            }
        }
        Ok(Arc::clone(&self.hdus[index]))
    }

    /// Read the raw, unpadded data segment of an HDU.
    pub async fn read_data(&self, hdu: &Hdu) -> Result<Bytes, FitsError> {
        Ok(self
            .reader
            .read_exact_at(hdu.data_offset, hdu.data_size as usize)
            .await?)
    }

    /// Parse the next HDU header. Returns `false` at end of file.
    async fn load_next(&mut self) -> Result<bool, FitsError> {
        if self.exhausted || self.next_offset + BLOCK_SIZE as u64 > self.reader.size() {
            self.exhausted = true;
            return Ok(false);
        }

        let index = self.hdus.len();
        let offset = self.next_offset;
        let Some((header, data_offset)) = self.read_header(index, offset).await? else {
            debug!(
                "{}: ignoring {} trailing bytes after HDU {}",
                self.reader.identifier(),
                self.reader.size() - offset,
                index.saturating_sub(1)
            );
            self.exhausted = true;
            return Ok(false);
        };

        let hdu = Hdu::new(index, header, offset, data_offset)?;
        self.next_offset = hdu.end_offset();
        self.hdus.push(Arc::new(hdu));
        Ok(true)
    }

    /// Read header blocks starting at `offset` until the END card.
    ///
    /// Returns `None` when an extension position holds something other than
    /// an `XTENSION` card (trailing padding or junk).
    async fn read_header(
        &self,
        index: usize,
        offset: u64,
    ) -> Result<Option<(Header, u64)>, FitsError> {
        let mut header = Header::new();
        let mut block_offset = offset;
        let mut card_index = 0usize;

        for _ in 0..MAX_HEADER_BLOCKS {
            if block_offset + BLOCK_SIZE as u64 > self.reader.size() {
                return Err(FitsError::MissingEnd { offset });
            }
            let block = self.reader.read_exact_at(block_offset, BLOCK_SIZE).await?;

            if block_offset == offset {
                let expected: &[u8] = if index == 0 { b"SIMPLE  " } else { b"XTENSION" };
                if !block.starts_with(expected) {
                    if index == 0 {
                        return Err(FitsError::NotFits(format!(
                            "{} does not start with SIMPLE",
                            self.reader.identifier()
                        )));
                    }
                    return Ok(None);
                }
            }
            block_offset += BLOCK_SIZE as u64;

            for raw in block.chunks_exact(CARD_SIZE) {
                let card = Card::parse(raw).map_err(|message| FitsError::InvalidCard {
                    index: card_index,
                    message,
                })?;
                card_index += 1;

                if card.keyword == "END" {
                    return Ok(Some((header, block_offset)));
                }
                // Blank padding cards carry nothing
                if card.keyword.is_empty() && card.comment.is_none() {
                    continue;
                }
                header.push(card);
            }
        }

        Err(FitsError::MissingEnd { offset })
    }
}
