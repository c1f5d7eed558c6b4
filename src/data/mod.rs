use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use bincode::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{InMemoryTileSource, TileIndex};

/// Compression level used when encoding a packed sky bundle.
///
/// We use a named constant to make the chosen level explicit because the
/// bundles ship inside deployment artifacts and benefit from aggressive
/// compression.
const BUNDLE_COMPRESSION_LEVEL: i32 = 19;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] Box<ErrorKind>),
    #[error("Compression error: {0}")]
    Compression(#[source] std::io::Error),
}

/// A whole tiled catalog packed into one artifact: the manifest plus the raw
/// JSON payload of every tile, keyed by address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkyBundle {
    pub index: TileIndex,
    pub tiles: HashMap<String, Vec<u8>>,
}

impl SkyBundle {
    /// Splits the bundle into the pieces a loader wants: the manifest and an
    /// in-memory tile source serving the packed payloads.
    pub fn into_loader_parts(self) -> (TileIndex, InMemoryTileSource) {
        (self.index, InMemoryTileSource::from_tiles(self.tiles))
    }
}

pub fn serialize_bundle(bundle: &SkyBundle) -> Result<Vec<u8>, DataError> {
    let encoded = bincode::serialize(bundle)?;
    let mut cursor = Cursor::new(encoded);
    zstd::stream::encode_all(&mut cursor, BUNDLE_COMPRESSION_LEVEL).map_err(DataError::Compression)
}

pub fn deserialize_bundle(bytes: &[u8]) -> Result<SkyBundle, DataError> {
    let mut cursor = Cursor::new(bytes);
    let decoded = zstd::stream::decode_all(&mut cursor).map_err(DataError::Compression)?;
    let bundle: SkyBundle = bincode::deserialize(&decoded)?;
    Ok(bundle)
}

pub fn write_bundle_to_file<P: AsRef<Path>>(bundle: &SkyBundle, path: P) -> Result<(), DataError> {
    let bytes = serialize_bundle(bundle)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read_bundle_from_file<P: AsRef<Path>>(path: P) -> Result<SkyBundle, DataError> {
    let bytes = fs::read(path)?;
    deserialize_bundle(&bytes)
}
