//! Photometric zero-point resolution.
//!
//! A tile either carries its zero-point inline (`FLUXMAG0`, optionally
//! `FLUXMAG0ERR`) in the primary header, or points into a calibration
//! archive stored in its own binary table extensions:
//!
//! ```text
//! primary header             entry table (HDU AR_HDU - 1)
//! ┌─────────────────┐        ┌────┬─────────────┬──────┬───────┐
//! │ AR_HDU          │──────▶ │ id │ cat.archive │ row0 │ nrows │
//! │ PHOTOCALIB_ID   │──┐     ├────┼─────────────┼──────┼───────┤
//! └─────────────────┘  └───▶ │ .. │      k      │  r   │   1   │
//!                            └────┴──────┬──────┴──┬───┴───────┘
//!                                        │         │
//!                calibration table (HDU AR_HDU - 1 + k), row r
//!                ┌─────────────────┬────────────────┐
//!                │ calibrationMean │ calibrationErr │
//!                └─────────────────┴────────────────┘
//! ```

use tracing::debug;

use crate::error::CalibrationError;
use crate::format::FitsFile;
use crate::io::RangeReader;

/// AB magnitude zero-point flux, scaled to the nanojansky calibration unit:
/// `1e23 * 10^(48.6 / -2.5) * 1e9`.
pub fn ab_flux_scale() -> f64 {
    1.0e23 * 10f64.powf(48.6 / -2.5) * 1.0e9
}

/// One row of a calibration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub mean: f64,
    pub error: f64,
}

/// A zero-point and its uncertainty (NaN when unknown).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroPoint {
    pub value: f64,
    pub error: f64,
}

impl ZeroPoint {
    /// Convert a calibration record.
    ///
    /// A zero mean means "uncalibrated" and yields NaN for both fields.
    pub fn from_calibration(record: &CalibrationRecord) -> Self {
        if record.mean == 0.0 {
            return Self {
                value: f64::NAN,
                error: f64::NAN,
            };
        }
        let value = ab_flux_scale() / record.mean;
        Self {
            value,
            error: value / record.mean * record.error,
        }
    }
}

/// Resolve the zero-point of an open tile.
pub async fn resolve_zero_point<R: RangeReader>(
    file: &mut FitsFile<R>,
) -> Result<ZeroPoint, CalibrationError> {
    let primary = file.primary();
    if let Some(value) = primary.header.opt_f64("FLUXMAG0")? {
        let error = primary.header.opt_f64("FLUXMAG0ERR")?.unwrap_or(f64::NAN);
        debug!("{}: inline FLUXMAG0 = {}", file.identifier(), value);
        return Ok(ZeroPoint { value, error });
    }

    let record = read_archive_record(file).await?;
    debug!(
        "{}: archived calibration mean = {}, error = {}",
        file.identifier(),
        record.mean,
        record.error
    );
    Ok(ZeroPoint::from_calibration(&record))
}

/// Follow `AR_HDU` / `PHOTOCALIB_ID` to the tile's calibration record.
///
/// # Errors
/// - `RecordNotFound` / `AmbiguousRecord` unless exactly one entry row has
///   the calibration id
/// - `InvalidRowRange` unless the entry's row range, clipped to the end of
///   the calibration table, selects exactly one row
/// - `InvalidArchiveIndex` if an HDU index is negative
pub async fn read_archive_record<R: RangeReader>(
    file: &mut FitsFile<R>,
) -> Result<CalibrationRecord, CalibrationError> {
    let primary = file.primary();
    let ar_hdu = primary.header.i64("AR_HDU")?;
    let id = primary.header.i64("PHOTOCALIB_ID")?;

    let entry_index = ar_hdu - 1;
    let entry_hdu = file.hdu(hdu_index(entry_index)?).await?;
    let entries = file.read_table(&entry_hdu).await?;

    let rows = entries.find_rows("id", id)?;
    let row = match rows.as_slice() {
        [row] => *row,
        [] => return Err(CalibrationError::RecordNotFound { id }),
        _ => {
            return Err(CalibrationError::AmbiguousRecord {
                id,
                matches: rows.len(),
            })
        }
    };

    let archive = entries.i64(row, "cat.archive")?;
    let row0 = entries.i64(row, "row0")?;
    let nrows = entries.i64(row, "nrows")?;

    let table_index = entry_index
        .checked_add(archive)
        .ok_or(CalibrationError::InvalidArchiveIndex(i64::MAX))?;
    let table_hdu = file.hdu(hdu_index(table_index)?).await?;
    let table = file.read_table(&table_hdu).await?;

    let record_row =
        selected_row(row0, nrows, table.rows()).ok_or(CalibrationError::InvalidRowRange {
            row0,
            nrows,
            rows: table.rows(),
        })?;

    Ok(CalibrationRecord {
        mean: table.f64(record_row, "calibrationMean")?,
        error: table.f64(record_row, "calibrationErr")?,
    })
}

/// The single row selected by `row0 .. row0 + nrows` once the range is
/// clipped to the table's end, or `None` if the clipped range does not hold
/// exactly one row. A negative `row0` never selects anything.
fn selected_row(row0: i64, nrows: i64, rows: u64) -> Option<u64> {
    let start = u64::try_from(row0).ok()?;
    let len = u64::try_from(nrows).ok()?;
    let end = start.saturating_add(len).min(rows);
    (end.saturating_sub(start) == 1).then_some(start)
}

fn hdu_index(index: i64) -> Result<usize, CalibrationError> {
    usize::try_from(index).map_err(|_| CalibrationError::InvalidArchiveIndex(index))
}
