//! Magnitude-tiled star catalog: index, sources and the cached loader.

pub mod index;
pub mod loader;

use thiserror::Error;

pub use index::{TileDescriptor, TileIndex};
pub use loader::{DirectoryTileSource, InMemoryTileSource, TileLoader, TileSource};

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog manifest itself is unreachable or malformed. Fatal to
    /// startup; there is no automatic retry.
    #[error("catalog index failed to load: {0}")]
    IndexLoad(String),
    /// A specific tile fetch failed. The call that needed it fails as a
    /// whole; nothing is cached for the tile, so a retry re-fetches it.
    #[error("tile {address} fetch failed")]
    TileLoad {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// A tile was fetched but its payload does not parse.
    #[error("tile {address} payload malformed")]
    TileParse {
        address: String,
        #[source]
        source: serde_json::Error,
    },
}
