//! Test utilities for integration tests.
//!
//! This module provides a tracking tile source and builders for synthetic
//! FITS tiles: primary header with calibration keys, image/mask/variance
//! extensions, and optional calibration archive tables.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use fits_mosaic::error::IoError;
use fits_mosaic::format::fits::{padded_size, Card, Value};
use fits_mosaic::io::RangeReader;
use fits_mosaic::mosaic::base_zero_point;
use fits_mosaic::tile::TileSource;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A mock range reader that records every read request.
///
/// Used to check that header-only passes never fetch pixel data.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(
        data: Bytes,
        identifier: impl Into<String>,
        requests: Arc<RwLock<Vec<(u64, usize)>>>,
    ) -> Self {
        Self {
            data,
            identifier: identifier.into(),
            requests,
        }
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Mock Tile Source
// =============================================================================

/// A tile source serving in-memory tiles and recording every read.
#[derive(Default)]
pub struct MockTileSource {
    tiles: HashMap<String, Bytes>,
    opens: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl MockTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile(mut self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.tiles.insert(path.into(), Bytes::from(data));
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl TileSource for MockTileSource {
    type Reader = TrackingMockReader;

    async fn create_reader(&self, path: &str) -> Result<Self::Reader, IoError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.tiles.get(path) {
            Some(data) => Ok(TrackingMockReader::new(
                data.clone(),
                format!("mock://{}", path),
                Arc::clone(&self.requests),
            )),
            None => Err(IoError::NotFound(path.to_string())),
        }
    }
}

// =============================================================================
// Raw HDU Creation
// =============================================================================

/// Serialize one HDU: cards, END, space padding, data, zero padding.
pub fn hdu_bytes(cards: &[Card], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for card in cards {
        for image in card.to_card_images() {
            out.extend(image.into_bytes());
        }
    }
    out.extend(format!("{:<80}", "END").into_bytes());
    out.resize(padded_size(out.len() as u64) as usize, b' ');

    let start = out.len();
    out.extend_from_slice(data);
    out.resize(start + padded_size(data.len() as u64) as usize, 0);
    out
}

pub fn primary_cards(extra: Vec<Card>) -> Vec<Card> {
    let mut cards = vec![
        Card::new("SIMPLE", true),
        Card::new("BITPIX", 8),
        Card::new("NAXIS", 0),
        Card::new("EXTEND", true),
    ];
    cards.extend(extra);
    cards
}

/// Structural cards of a 2-D IMAGE extension.
pub fn image_cards(bitpix: i64, width: usize, height: usize) -> Vec<Card> {
    vec![
        Card::new("XTENSION", "IMAGE"),
        Card::new("BITPIX", bitpix),
        Card::new("NAXIS", 2),
        Card::new("NAXIS1", width as i64),
        Card::new("NAXIS2", height as i64),
        Card::new("PCOUNT", 0),
        Card::new("GCOUNT", 1),
    ]
}

pub fn f32_be(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub fn i32_be(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub fn i16_be(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// A binary table column: name, TFORM and one value per row.
pub struct TableColumn {
    pub name: &'static str,
    pub values: ColumnValues,
}

pub enum ColumnValues {
    /// `K` column
    Long(Vec<i64>),
    /// `J` column
    Int(Vec<i32>),
    /// `D` column
    Double(Vec<f64>),
}

impl ColumnValues {
    fn tform(&self) -> &'static str {
        match self {
            ColumnValues::Long(_) => "1K",
            ColumnValues::Int(_) => "1J",
            ColumnValues::Double(_) => "1D",
        }
    }

    fn width(&self) -> usize {
        match self {
            ColumnValues::Int(_) => 4,
            _ => 8,
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnValues::Long(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
        }
    }

    fn write(&self, row: usize, out: &mut Vec<u8>) {
        match self {
            ColumnValues::Long(v) => out.extend(v[row].to_be_bytes()),
            ColumnValues::Int(v) => out.extend(v[row].to_be_bytes()),
            ColumnValues::Double(v) => out.extend(v[row].to_be_bytes()),
        }
    }
}

/// Serialize a BINTABLE extension.
pub fn table_hdu(columns: &[TableColumn]) -> Vec<u8> {
    let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
    let row_len: usize = columns.iter().map(|c| c.values.width()).sum();

    let mut cards = vec![
        Card::new("XTENSION", "BINTABLE"),
        Card::new("BITPIX", 8),
        Card::new("NAXIS", 2),
        Card::new("NAXIS1", row_len as i64),
        Card::new("NAXIS2", rows as i64),
        Card::new("PCOUNT", 0),
        Card::new("GCOUNT", 1),
        Card::new("TFIELDS", columns.len() as i64),
    ];
    for (i, column) in columns.iter().enumerate() {
        cards.push(Card::new(format!("TTYPE{}", i + 1), column.name));
        cards.push(Card::new(format!("TFORM{}", i + 1), column.values.tform()));
    }

    let mut data = Vec::with_capacity(row_len * rows);
    for row in 0..rows {
        for column in columns {
            column.values.write(row, &mut data);
        }
    }
    hdu_bytes(&cards, &data)
}

// =============================================================================
// Tile Builder
// =============================================================================

/// One row of a calibration archive entry table.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveEntry {
    pub id: i64,
    pub archive: i32,
    pub row0: i32,
    pub nrows: i32,
}

/// How a tile declares its zero-point.
#[derive(Debug, Clone)]
pub enum Calibration {
    /// `FLUXMAG0` (and optionally `FLUXMAG0ERR`) in the primary header
    Inline { fluxmag0: f64, error: Option<f64> },
    /// `AR_HDU` / `PHOTOCALIB_ID` pointing at archive tables appended as
    /// HDUs 4 (entries) and 5 (calibration records)
    Archive {
        id: i64,
        entries: Vec<ArchiveEntry>,
        records: Vec<(f64, f64)>,
    },
    /// No calibration keys at all
    Missing,
}

impl Calibration {
    /// Inline zero-point equal to the output base: samples pass unchanged.
    pub fn neutral() -> Self {
        Calibration::Inline {
            fluxmag0: base_zero_point(),
            error: None,
        }
    }

    /// A single-entry archive whose record has the given mean and error.
    pub fn archive(mean: f64, error: f64) -> Self {
        Calibration::Archive {
            id: 42,
            entries: vec![ArchiveEntry {
                id: 42,
                archive: 1,
                row0: 0,
                nrows: 1,
            }],
            records: vec![(mean, error)],
        }
    }
}

/// Builds a synthetic tile with image (HDU 1), mask (HDU 2) and variance
/// (HDU 3) planes.
#[derive(Debug, Clone)]
pub struct TileBuilder {
    crpix: (Value, Value),
    width: usize,
    height: usize,
    image: Vec<f32>,
    mask: Vec<i32>,
    variance: Vec<f32>,
    mask_planes: Vec<(String, i64)>,
    calibration: Calibration,
    ltv: Option<(f64, f64)>,
    extra_cards: Vec<Card>,
}

impl TileBuilder {
    /// A tile whose lower-left sample sits at `(min_x, min_y)`, filled with
    /// `value` in the image plane, `1` in the variance plane, `0` in the mask.
    pub fn new(min_x: i64, min_y: i64, width: usize, height: usize, value: f32) -> Self {
        Self {
            crpix: (Value::Real(-min_x as f64), Value::Real(-min_y as f64)),
            width,
            height,
            image: vec![value; width * height],
            mask: vec![0; width * height],
            variance: vec![1.0; width * height],
            mask_planes: Vec::new(),
            calibration: Calibration::neutral(),
            ltv: None,
            extra_cards: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: Vec<f32>) -> Self {
        self.image = image;
        self
    }

    pub fn with_variance(mut self, variance: Vec<f32>) -> Self {
        self.variance = variance;
        self
    }

    pub fn with_mask(mut self, mask: Vec<i32>, planes: &[(&str, i64)]) -> Self {
        self.mask = mask;
        self.mask_planes = planes
            .iter()
            .map(|(name, bit)| (format!("MP_{}", name), *bit))
            .collect();
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_crpix(mut self, crpix1: impl Into<Value>, crpix2: impl Into<Value>) -> Self {
        self.crpix = (crpix1.into(), crpix2.into());
        self
    }

    pub fn with_ltv(mut self, ltv1: f64, ltv2: f64) -> Self {
        self.ltv = Some((ltv1, ltv2));
        self
    }

    /// Extra cards for every channel header.
    pub fn with_card(mut self, card: Card) -> Self {
        self.extra_cards.push(card);
        self
    }

    fn channel_cards(&self, bitpix: i64, extname: &str) -> Vec<Card> {
        let mut cards = image_cards(bitpix, self.width, self.height);
        cards.push(Card::new("EXTNAME", extname));
        cards.push(Card {
            keyword: "CRPIX1".to_string(),
            value: Some(self.crpix.0.clone()),
            comment: None,
        });
        cards.push(Card {
            keyword: "CRPIX2".to_string(),
            value: Some(self.crpix.1.clone()),
            comment: None,
        });
        if let Some((ltv1, ltv2)) = self.ltv {
            cards.push(Card::new("LTV1", ltv1));
            cards.push(Card::new("LTV2", ltv2));
        }
        cards.extend(self.extra_cards.iter().cloned());
        cards
    }

    pub fn build(&self) -> Vec<u8> {
        let mut primary = Vec::new();
        match &self.calibration {
            Calibration::Inline { fluxmag0, error } => {
                primary.push(Card::new("FLUXMAG0", *fluxmag0));
                if let Some(error) = error {
                    primary.push(Card::new("FLUXMAG0ERR", *error));
                }
            }
            Calibration::Archive { id, .. } => {
                primary.push(Card::new("AR_HDU", 5));
                primary.push(Card::new("PHOTOCALIB_ID", *id));
            }
            Calibration::Missing => {}
        }

        let mut out = hdu_bytes(&primary_cards(primary), &[]);
        out.extend(hdu_bytes(
            &self.channel_cards(-32, "IMAGE"),
            &f32_be(&self.image),
        ));

        let mut mask_cards = self.channel_cards(32, "MASK");
        for (key, bit) in &self.mask_planes {
            mask_cards.push(Card::new(key.as_str(), *bit));
        }
        out.extend(hdu_bytes(&mask_cards, &i32_be(&self.mask)));

        out.extend(hdu_bytes(
            &self.channel_cards(-32, "VARIANCE"),
            &f32_be(&self.variance),
        ));

        if let Calibration::Archive {
            entries, records, ..
        } = &self.calibration
        {
            out.extend(table_hdu(&[
                TableColumn {
                    name: "id",
                    values: ColumnValues::Long(entries.iter().map(|e| e.id).collect()),
                },
                TableColumn {
                    name: "cat.archive",
                    values: ColumnValues::Int(entries.iter().map(|e| e.archive).collect()),
                },
                TableColumn {
                    name: "row0",
                    values: ColumnValues::Int(entries.iter().map(|e| e.row0).collect()),
                },
                TableColumn {
                    name: "nrows",
                    values: ColumnValues::Int(entries.iter().map(|e| e.nrows).collect()),
                },
            ]));
            out.extend(table_hdu(&[
                TableColumn {
                    name: "calibrationMean",
                    values: ColumnValues::Double(records.iter().map(|r| r.0).collect()),
                },
                TableColumn {
                    name: "calibrationErr",
                    values: ColumnValues::Double(records.iter().map(|r| r.1).collect()),
                },
            ]));
        }

        out
    }
}

/// Closed-form zero-point for a calibration mean.
pub fn expected_zero_point(mean: f64) -> f64 {
    1.0e23 * 10f64.powf(48.6 / -2.5) * 1.0e9 / mean
}

/// Assert two floats agree to a relative tolerance.
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = expected.abs() * 1e-9;
    assert!(
        (actual - expected).abs() <= tolerance,
        "{} != {} (tolerance {})",
        actual,
        expected,
        tolerance
    );
}
