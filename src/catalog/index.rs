use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;

/// One addressable chunk of the catalog.
///
/// The tile together with every tile of lower `mag_max` contains exactly the
/// catalog stars with magnitude <= `mag_max`, each star in exactly one tile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TileDescriptor {
    pub address: String,
    pub mag_max: f64,
}

/// Ordered tile manifest, read-only after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileIndex {
    tiles: Vec<TileDescriptor>,
}

impl TileIndex {
    pub fn new(tiles: Vec<TileDescriptor>) -> Result<Self, CatalogError> {
        validate(&tiles).map_err(CatalogError::IndexLoad)?;
        Ok(TileIndex { tiles })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let tiles: Vec<TileDescriptor> = serde_json::from_slice(bytes)
            .map_err(|e| CatalogError::IndexLoad(e.to_string()))?;
        Self::new(tiles)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            CatalogError::IndexLoad(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_json(&bytes)
    }

    pub fn tiles(&self) -> &[TileDescriptor] {
        &self.tiles
    }

    /// Tiles needed to complete the catalog up to `limit`, in index order.
    pub fn select(&self, limit: f64) -> impl Iterator<Item = &TileDescriptor> {
        self.tiles.iter().filter(move |t| t.mag_max <= limit)
    }
}

fn validate(tiles: &[TileDescriptor]) -> Result<(), String> {
    for pair in tiles.windows(2) {
        if pair[1].mag_max <= pair[0].mag_max {
            return Err(format!(
                "tile mag_max must be strictly ascending: {} ({}) then {} ({})",
                pair[0].address, pair[0].mag_max, pair[1].address, pair[1].mag_max
            ));
        }
    }
    for (i, tile) in tiles.iter().enumerate() {
        if !tile.mag_max.is_finite() {
            return Err(format!("tile {} has non-finite mag_max", tile.address));
        }
        if tiles[..i].iter().any(|t| t.address == tile.address) {
            return Err(format!("duplicate tile address {}", tile.address));
        }
    }
    Ok(())
}
