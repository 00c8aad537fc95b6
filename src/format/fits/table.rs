//! FITS binary tables (`XTENSION = 'BINTABLE'`).
//!
//! A binary table is `NAXIS2` fixed-width rows of `NAXIS1` bytes. Each of the
//! `TFIELDS` columns is described by `TTYPEn` (name) and `TFORMn` (`rT`:
//! repeat count and type code), optionally scaled by `TSCALn`/`TZEROn`.
//! Variable-length arrays live in a heap after the main table; only their
//! descriptors are sized here, the heap itself is never read.

use bytes::Bytes;

use crate::error::FitsError;
use crate::io::{read_f32_be, read_f64_be, read_u16_be, read_u32_be, read_u64_be, RangeReader};

use super::header::Header;
use super::parser::{FitsFile, Hdu, HduKind};

// =============================================================================
// Column formats
// =============================================================================

/// Element type of a binary table column (the `T` of `rT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `L`
    Logical,
    /// `X`, packed bits
    Bit,
    /// `B`, unsigned byte
    Byte,
    /// `I`
    Short,
    /// `J`
    Int,
    /// `K`
    Long,
    /// `A`
    Char,
    /// `E`
    Float,
    /// `D`
    Double,
    /// `C`
    ComplexFloat,
    /// `M`
    ComplexDouble,
    /// `P`, 32-bit heap descriptor
    ArrayDescriptor,
    /// `Q`, 64-bit heap descriptor
    LongArrayDescriptor,
}

impl ColumnType {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'L' => ColumnType::Logical,
            'X' => ColumnType::Bit,
            'B' => ColumnType::Byte,
            'I' => ColumnType::Short,
            'J' => ColumnType::Int,
            'K' => ColumnType::Long,
            'A' => ColumnType::Char,
            'E' => ColumnType::Float,
            'D' => ColumnType::Double,
            'C' => ColumnType::ComplexFloat,
            'M' => ColumnType::ComplexDouble,
            'P' => ColumnType::ArrayDescriptor,
            'Q' => ColumnType::LongArrayDescriptor,
            _ => return None,
        })
    }

    /// Bytes per element (bits are handled by [`ColumnFormat::width`]).
    fn element_size(self) -> usize {
        match self {
            ColumnType::Logical | ColumnType::Bit | ColumnType::Byte | ColumnType::Char => 1,
            ColumnType::Short => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Long
            | ColumnType::Double
            | ColumnType::ComplexFloat
            | ColumnType::ArrayDescriptor => 8,
            ColumnType::ComplexDouble | ColumnType::LongArrayDescriptor => 16,
        }
    }

    fn is_scalar_number(self) -> bool {
        matches!(
            self,
            ColumnType::Byte
                | ColumnType::Short
                | ColumnType::Int
                | ColumnType::Long
                | ColumnType::Float
                | ColumnType::Double
        )
    }
}

/// A parsed `TFORMn` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFormat {
    pub repeat: usize,
    pub kind: ColumnType,
}

impl ColumnFormat {
    /// Parse `rT`, ignoring anything after the type code (such as the
    /// element type and max length of `P`/`Q` descriptors, `1PE(20)`).
    pub fn parse(format: &str) -> Option<Self> {
        let format = format.trim();
        let digits = format.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            format[..digits].parse().ok()?
        };
        let code = format[digits..].chars().next()?;
        let kind = ColumnType::from_code(code.to_ascii_uppercase())?;
        Some(Self { repeat, kind })
    }

    /// Width of the column within a row, in bytes.
    pub fn width(&self) -> usize {
        match self.kind {
            ColumnType::Bit => self.repeat.div_ceil(8),
            ColumnType::ArrayDescriptor | ColumnType::LongArrayDescriptor => {
                self.repeat.min(1) * self.kind.element_size()
            }
            kind => self.repeat * kind.element_size(),
        }
    }
}

/// One column of a binary table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub format: ColumnFormat,
    /// Byte offset within a row
    pub offset: usize,
    pub scale: f64,
    pub zero: f64,
}

impl Column {
    fn is_scaled(&self) -> bool {
        self.scale != 1.0 || self.zero != 0.0
    }
}

// =============================================================================
// BinaryTable
// =============================================================================

/// The main data of a binary table, with scalar accessors by column name.
#[derive(Debug, Clone)]
pub struct BinaryTable {
    columns: Vec<Column>,
    row_len: usize,
    rows: u64,
    data: Bytes,
}

impl BinaryTable {
    /// Build a table from its header and main data (heap excluded).
    pub fn new(header: &Header, data: Bytes) -> Result<Self, FitsError> {
        let (row_len, rows) = table_shape(header)?;
        let fields = header.i64("TFIELDS")?;
        if !(0..=999).contains(&fields) {
            return Err(FitsError::InvalidKeywordValue {
                keyword: "TFIELDS".to_string(),
                message: format!("{} is outside 0..=999", fields),
            });
        }

        let mut columns = Vec::with_capacity(fields as usize);
        let mut offset = 0usize;
        for n in 1..=fields {
            let name = match header.get(&format!("TTYPE{}", n)).and_then(|v| v.as_str()) {
                Some(name) => name.trim().to_string(),
                None => format!("col{}", n),
            };
            let tform = header.str(&format!("TFORM{}", n))?;
            let format = ColumnFormat::parse(tform).ok_or_else(|| FitsError::InvalidColumnFormat {
                column: name.clone(),
                format: tform.to_string(),
            })?;
            let scale = header.opt_f64(&format!("TSCAL{}", n))?.unwrap_or(1.0);
            let zero = header.opt_f64(&format!("TZERO{}", n))?.unwrap_or(0.0);

            let width = format.width();
            columns.push(Column {
                name,
                format,
                offset,
                scale,
                zero,
            });
            offset += width;
        }

        if offset != row_len {
            return Err(FitsError::InvalidStructure(format!(
                "columns span {} bytes but NAXIS1 = {}",
                offset, row_len
            )));
        }

        let expected = row_len as u64 * rows;
        if (data.len() as u64) < expected {
            return Err(FitsError::DataSizeMismatch {
                expected: expected as usize,
                actual: data.len(),
            });
        }

        Ok(Self {
            columns,
            row_len,
            rows,
            data,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name. Exact matches win; otherwise names compare
    /// case-insensitively, as FITS column names do.
    pub fn column(&self, name: &str) -> Result<&Column, FitsError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| FitsError::MissingColumn(name.to_string()))
    }

    /// First element of a numeric cell, scaled, as `f64`.
    pub fn f64(&self, row: u64, name: &str) -> Result<f64, FitsError> {
        let column = self.column(name)?;
        let bytes = self.cell(row, column)?;
        let value = match column.format.kind {
            ColumnType::Byte => bytes[0] as f64,
            ColumnType::Short => read_u16_be(bytes) as i16 as f64,
            ColumnType::Int => read_u32_be(bytes) as i32 as f64,
            ColumnType::Long => read_u64_be(bytes) as i64 as f64,
            ColumnType::Float => read_f32_be(bytes) as f64,
            ColumnType::Double => read_f64_be(bytes),
            _ => return Err(invalid_format(column)),
        };
        Ok(column.zero + column.scale * value)
    }

    /// First element of a numeric cell as an integer.
    ///
    /// Unscaled integer columns are read exactly; anything else must hold
    /// an integral value after scaling.
    pub fn i64(&self, row: u64, name: &str) -> Result<i64, FitsError> {
        let column = self.column(name)?;
        if !column.is_scaled() {
            let bytes = self.cell(row, column)?;
            match column.format.kind {
                ColumnType::Byte => return Ok(bytes[0] as i64),
                ColumnType::Short => return Ok(read_u16_be(bytes) as i16 as i64),
                ColumnType::Int => return Ok(read_u32_be(bytes) as i32 as i64),
                ColumnType::Long => return Ok(read_u64_be(bytes) as i64),
                _ => {}
            }
        }

        let value = self.f64(row, name)?;
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(FitsError::InvalidColumnFormat {
                column: column.name.clone(),
                format: format!("non-integral value {} in row {}", value, row),
            });
        }
        Ok(value as i64)
    }

    /// Indices of every row whose integer `name` cell equals `value`.
    pub fn find_rows(&self, name: &str, value: i64) -> Result<Vec<u64>, FitsError> {
        let mut matches = Vec::new();
        for row in 0..self.rows {
            if self.i64(row, name)? == value {
                matches.push(row);
            }
        }
        Ok(matches)
    }

    fn cell(&self, row: u64, column: &Column) -> Result<&[u8], FitsError> {
        if row >= self.rows {
            return Err(FitsError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        if !column.format.kind.is_scalar_number() || column.format.repeat == 0 {
            return Err(invalid_format(column));
        }
        let start = row as usize * self.row_len + column.offset;
        Ok(&self.data[start..start + column.format.kind.element_size()])
    }
}

fn invalid_format(column: &Column) -> FitsError {
    FitsError::InvalidColumnFormat {
        column: column.name.clone(),
        format: format!("{}{:?}", column.format.repeat, column.format.kind),
    }
}

/// `(NAXIS1, NAXIS2)` of a table header.
fn table_shape(header: &Header) -> Result<(usize, u64), FitsError> {
    let naxis = header.i64("NAXIS")?;
    if naxis != 2 {
        return Err(FitsError::InvalidKeywordValue {
            keyword: "NAXIS".to_string(),
            message: format!("binary table must have NAXIS = 2, got {}", naxis),
        });
    }
    let row_len = header.i64("NAXIS1")?;
    let rows = header.i64("NAXIS2")?;
    match (usize::try_from(row_len), u64::try_from(rows)) {
        (Ok(row_len), Ok(rows)) => Ok((row_len, rows)),
        _ => Err(FitsError::InvalidKeywordValue {
            keyword: "NAXIS1".to_string(),
            message: format!("invalid table shape {} x {}", row_len, rows),
        }),
    }
}

impl<R: RangeReader> FitsFile<R> {
    /// Read the main data of a binary table HDU.
    pub async fn read_table(&self, hdu: &Hdu) -> Result<BinaryTable, FitsError> {
        if hdu.kind != HduKind::BinaryTable {
            return Err(FitsError::NotABinaryTable(hdu.index));
        }
        let (row_len, rows) = table_shape(&hdu.header)?;
        let len = (row_len as u64)
            .checked_mul(rows)
            .filter(|len| *len <= hdu.data_size)
            .ok_or(FitsError::DataSizeMismatch {
                expected: usize::MAX,
                actual: hdu.data_size as usize,
            })?;
        let data = self.reader().read_exact_at(hdu.data_offset, len as usize).await?;
        BinaryTable::new(&hdu.header, data)
    }
}
