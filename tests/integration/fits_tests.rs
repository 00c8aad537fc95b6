//! FITS reading tests against synthesized tiles.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;

use fits_mosaic::format::fits::{Card, HduKind, BLOCK_SIZE};
use fits_mosaic::format::FitsFile;
use fits_mosaic::io::MemoryReader;
use fits_mosaic::FitsError;

use super::test_utils::{
    hdu_bytes, i16_be, image_cards, primary_cards, Calibration, TileBuilder, TrackingMockReader,
};

async fn open_bytes(data: Vec<u8>) -> FitsFile<MemoryReader> {
    FitsFile::open(MemoryReader::new(data, "test.fits"))
        .await
        .unwrap()
}

// =============================================================================
// Header conventions
// =============================================================================

#[tokio::test]
async fn test_hierarch_and_continue_cards() {
    let long = "calibrated with a deliberately long provenance string ".repeat(3);
    let cards = primary_cards(vec![
        Card::new("MP_DETECTED_NEGATIVE", 6),
        Card::new("PROVENANCE", long.trim_end()),
        Card::commentary("HISTORY", "stitched"),
    ]);
    let file = open_bytes(hdu_bytes(&cards, &[])).await;
    let primary = file.primary();
    let header = &primary.header;

    assert_eq!(header.i64("MP_DETECTED_NEGATIVE").unwrap(), 6);
    assert_eq!(header.str("PROVENANCE").unwrap(), long.trim_end());
    assert!(header.flag("SIMPLE"));
}

#[tokio::test]
async fn test_not_fits() {
    let data = vec![b' '; BLOCK_SIZE];
    let result = FitsFile::open(MemoryReader::new(data, "blank")).await;
    assert!(matches!(result, Err(FitsError::NotFits(_))));

    let result = FitsFile::open(MemoryReader::new(b"SIMPLE".to_vec(), "short")).await;
    assert!(matches!(result, Err(FitsError::NotFits(_))));
}

#[tokio::test]
async fn test_tile_layout() {
    let tile = TileBuilder::new(0, 0, 3, 2, 1.0)
        .with_calibration(Calibration::archive(1.0, 0.1))
        .build();
    let mut file = open_bytes(tile).await;

    let expected = [
        HduKind::Primary,
        HduKind::Image,
        HduKind::Image,
        HduKind::Image,
        HduKind::BinaryTable,
        HduKind::BinaryTable,
    ];
    for (index, kind) in expected.iter().enumerate() {
        let hdu = file.hdu(index).await.unwrap();
        assert_eq!(hdu.kind, *kind, "HDU {}", index);
        assert_eq!(hdu.header_offset % BLOCK_SIZE as u64, 0);
    }
    assert!(matches!(
        file.hdu(6).await,
        Err(FitsError::HduNotFound(6))
    ));
}

// =============================================================================
// Image decoding
// =============================================================================

fn scaled_i16_file() -> Vec<u8> {
    let mut cards = image_cards(16, 2, 2);
    cards.push(Card::new("BZERO", 32768.0));
    cards.push(Card::new("BSCALE", 0.5));
    cards.push(Card::new("BLANK", -32768));

    let mut data = hdu_bytes(&primary_cards(vec![]), &[]);
    data.extend(hdu_bytes(&cards, &i16_be(&[-32768, 0, 2, -2])));
    data
}

#[tokio::test]
async fn test_read_scaled_integers_as_float() {
    let mut file = open_bytes(scaled_i16_file()).await;
    let hdu = file.hdu(1).await.unwrap();
    let image = file.read_image::<f32>(&hdu).await.unwrap();

    assert_eq!(image.width(), 2);
    assert_eq!(image.height(), 2);
    assert!(image.get(0, 0).unwrap().is_nan());
    assert_eq!(image.get(1, 0), Some(32768.0));
    assert_eq!(image.get(0, 1), Some(32769.0));
    assert_eq!(image.get(1, 1), Some(32767.0));
}

#[tokio::test]
async fn test_read_integers_unscaled() {
    let mut file = open_bytes(scaled_i16_file()).await;
    let hdu = file.hdu(1).await.unwrap();
    let image = file.read_image::<i32>(&hdu).await.unwrap();
    assert_eq!(image.data(), &[-32768, 0, 2, -2]);
}

#[tokio::test]
async fn test_float_data_cannot_be_read_as_mask() {
    let tile = TileBuilder::new(0, 0, 2, 2, 1.5).build();
    let mut file = open_bytes(tile).await;
    let hdu = file.hdu(1).await.unwrap();
    let result = file.read_image::<i32>(&hdu).await;
    assert!(matches!(
        result,
        Err(FitsError::IncompatibleSampleType { bitpix: -32, .. })
    ));
}

#[tokio::test]
async fn test_compressed_image_rejected() {
    let tile = TileBuilder::new(0, 0, 2, 2, 1.0)
        .with_card(Card::new("ZIMAGE", true))
        .build();
    let mut file = open_bytes(tile).await;
    let hdu = file.hdu(1).await.unwrap();
    let result = file.read_image::<f32>(&hdu).await;
    assert!(matches!(result, Err(FitsError::UnsupportedCompression(1))));
}

#[tokio::test]
async fn test_table_is_not_an_image() {
    let tile = TileBuilder::new(0, 0, 2, 2, 1.0)
        .with_calibration(Calibration::archive(1.0, 0.1))
        .build();
    let mut file = open_bytes(tile).await;
    let hdu = file.hdu(4).await.unwrap();
    assert!(matches!(
        file.read_image::<f32>(&hdu).await,
        Err(FitsError::NotAnImage { index: 4, .. })
    ));
}

// =============================================================================
// Lazy reads
// =============================================================================

#[tokio::test]
async fn test_header_scan_skips_pixel_data() {
    let tile = TileBuilder::new(0, 0, 64, 64, 1.0).build();
    let requests = Arc::new(RwLock::new(Vec::new()));
    let reader = TrackingMockReader::new(Bytes::from(tile), "lazy.fits", Arc::clone(&requests));
    let mut file = FitsFile::open(reader).await.unwrap();

    let image = file.hdu(1).await.unwrap();
    let variance = file.hdu(3).await.unwrap();
    assert_eq!(variance.header.str("EXTNAME").unwrap(), "VARIANCE");

    let image_data = image.data_offset..image.data_offset + image.data_size;
    let requests = requests.read().await;
    assert!(requests
        .iter()
        .all(|(offset, _)| !image_data.contains(offset)));
    assert!(requests.iter().all(|(_, len)| *len == BLOCK_SIZE));
}

#[tokio::test]
async fn test_read_image_fetches_one_range() {
    let tile = TileBuilder::new(0, 0, 8, 4, 1.0).build();
    let requests = Arc::new(RwLock::new(Vec::new()));
    let reader = TrackingMockReader::new(Bytes::from(tile), "one.fits", Arc::clone(&requests));
    let mut file = FitsFile::open(reader).await.unwrap();
    let hdu = file.hdu(1).await.unwrap();

    let before = requests.read().await.len();
    file.read_image::<f32>(&hdu).await.unwrap();
    let requests = requests.read().await;
    assert_eq!(requests.len(), before + 1);
    assert_eq!(requests[before], (hdu.data_offset, 8 * 4 * 4));
}
