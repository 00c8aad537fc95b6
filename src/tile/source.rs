//! Tile sources.
//!
//! A [`TileSource`] turns a tile path from the command line into a
//! [`RangeReader`]. The compositor only ever talks to this trait, so tests
//! can stitch tiles held in memory exactly as the binary stitches files.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{IoError, TileReadError};
use crate::format::FitsFile;
use crate::io::{LocalFileReader, MemoryReader, RangeReader};

/// Trait for creating range readers from tile paths.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// The type of range reader this source creates.
    type Reader: RangeReader + 'static;

    /// Open the tile at `path`.
    async fn create_reader(&self, path: &str) -> Result<Self::Reader, IoError>;
}

/// Open a tile and parse its primary header.
pub async fn open_tile<S: TileSource>(
    source: &S,
    path: &str,
) -> Result<FitsFile<S::Reader>, TileReadError> {
    let reader = source.create_reader(path).await?;
    Ok(FitsFile::open(reader).await?)
}

// =============================================================================
// LocalTileSource
// =============================================================================

/// Tiles on the local filesystem.
///
/// Relative paths are resolved against the optional root directory, or the
/// working directory when there is none.
#[derive(Debug, Clone, Default)]
pub struct LocalTileSource {
    root: Option<PathBuf>,
}

impl LocalTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

#[async_trait]
impl TileSource for LocalTileSource {
    type Reader = LocalFileReader;

    async fn create_reader(&self, path: &str) -> Result<Self::Reader, IoError> {
        LocalFileReader::open(self.resolve(path)).await
    }
}

// =============================================================================
// MemoryTileSource
// =============================================================================

/// Tiles held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileSource {
    tiles: HashMap<String, Bytes>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tile, builder style.
    pub fn with_tile(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.tiles.insert(path.into(), data.into());
    }
}

#[async_trait]
impl TileSource for MemoryTileSource {
    type Reader = MemoryReader;

    async fn create_reader(&self, path: &str) -> Result<Self::Reader, IoError> {
        self.tiles
            .get(path)
            .map(|data| MemoryReader::new(data.clone(), path))
            .ok_or_else(|| IoError::NotFound(path.to_string()))
    }
}
