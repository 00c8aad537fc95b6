use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Local-filesystem implementation of RangeReader.
///
/// The file size is fetched once on creation. Reads seek and read under a
/// mutex, so a single reader can be shared between tasks.
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open `path` for range reads.
    ///
    /// Returns `IoError::NotFound` if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path)
            .await
            .map_err(|e| map_io_error(&identifier, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| map_io_error(&identifier, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| map_io_error(&self.identifier, e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| map_io_error(&self.identifier, e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

fn map_io_error(path: &str, err: std::io::Error) -> IoError {
    if err.kind() == ErrorKind::NotFound {
        IoError::NotFound(path.to_string())
    } else {
        IoError::Read {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}
