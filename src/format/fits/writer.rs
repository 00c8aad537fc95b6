//! FITS serialization.
//!
//! The writer builds a whole file in memory. Structural keywords are always
//! regenerated from the data being written, so a header copied from an input
//! tile can be passed in as-is.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FitsError;

use super::card::{Card, CARD_SIZE};
use super::header::Header;
use super::image::{ImageData, Sample};
use super::parser::{padded_size, BLOCK_SIZE};

/// Keywords that describe the layout of an HDU and are never copied from a
/// source header.
pub fn is_structural(keyword: &str) -> bool {
    match keyword {
        "SIMPLE" | "XTENSION" | "BITPIX" | "NAXIS" | "PCOUNT" | "GCOUNT" | "EXTEND" | "BSCALE"
        | "BZERO" | "BLANK" | "CHECKSUM" | "DATASUM" | "END" => true,
        _ => keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Accumulates HDUs into an in-memory FITS file.
#[derive(Debug, Default)]
pub struct FitsWriter {
    buf: BytesMut,
    hdu_count: usize,
}

impl FitsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of HDUs written so far.
    pub fn hdu_count(&self) -> usize {
        self.hdu_count
    }

    /// Write a data-less primary HDU carrying the non-structural cards of
    /// `header`.
    pub fn write_primary(&mut self, header: &Header) -> Result<(), FitsError> {
        if self.hdu_count != 0 {
            return Err(FitsError::InvalidStructure(
                "primary HDU must be the first HDU".to_string(),
            ));
        }

        let mut cards = vec![
            Card::new("SIMPLE", true).with_comment("conforms to FITS standard"),
            Card::new("BITPIX", 8),
            Card::new("NAXIS", 0),
            Card::new("EXTEND", true),
        ];
        cards.extend(copied_cards(header));

        self.write_hdu(&cards, &[]);
        Ok(())
    }

    /// Write a 2-D IMAGE extension.
    pub fn write_image<T: Sample>(
        &mut self,
        header: &Header,
        image: &ImageData<T>,
    ) -> Result<(), FitsError> {
        if self.hdu_count == 0 {
            return Err(FitsError::InvalidStructure(
                "an extension cannot precede the primary HDU".to_string(),
            ));
        }

        let mut cards = vec![
            Card::new("XTENSION", "IMAGE").with_comment("image extension"),
            Card::new("BITPIX", T::BITPIX.value()),
            Card::new("NAXIS", 2),
            Card::new("NAXIS1", image.width() as i64),
            Card::new("NAXIS2", image.height() as i64),
            Card::new("PCOUNT", 0),
            Card::new("GCOUNT", 1),
        ];
        cards.extend(copied_cards(header));

        self.write_hdu(&cards, &image.encode());
        Ok(())
    }

    /// Consume the writer and return the file bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn write_hdu(&mut self, cards: &[Card], data: &[u8]) {
        let start = self.buf.len();
        for card in cards {
            for image in card.to_card_images() {
                self.buf.put_slice(image.as_bytes());
            }
        }
        self.buf.put_slice(format!("{:<width$}", "END", width = CARD_SIZE).as_bytes());
        let header_len = (self.buf.len() - start) as u64;
        self.buf
            .put_bytes(b' ', (padded_size(header_len) - header_len) as usize);

        self.buf.put_slice(data);
        let data_len = data.len() as u64;
        self.buf.put_bytes(0, (padded_size(data_len) - data_len) as usize);

        debug_assert_eq!(self.buf.len() % BLOCK_SIZE, 0);
        self.hdu_count += 1;
    }
}

fn copied_cards(header: &Header) -> impl Iterator<Item = Card> + '_ {
    header
        .iter()
        .filter(|card| card.is_commentary() || !is_structural(&card.keyword))
        .cloned()
}
