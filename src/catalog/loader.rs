use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{Mutex, OnceCell};

use crate::catalog::{CatalogError, TileDescriptor, TileIndex};
use crate::{Star, StarRecord};

type TilePayload = Arc<Vec<Star>>;

/// Fetches raw tile bytes by address. Fetching is the only suspension point
/// in the pipeline.
pub trait TileSource: Send + Sync {
    fn fetch(&self, address: &str) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// Tile source backed by a directory of payload files, one file per address.
pub struct DirectoryTileSource {
    root: PathBuf,
}

impl DirectoryTileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryTileSource { root: root.into() }
    }
}

impl TileSource for DirectoryTileSource {
    fn fetch(&self, address: &str) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let path = self.root.join(address);
        async move { tokio::fs::read(path).await }
    }
}

/// Tile source holding payloads in memory: unpacked bundles and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTileSource {
    tiles: HashMap<String, Vec<u8>>,
}

impl InMemoryTileSource {
    pub fn from_tiles(tiles: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        InMemoryTileSource {
            tiles: tiles.into_iter().collect(),
        }
    }
}

impl TileSource for InMemoryTileSource {
    fn fetch(&self, address: &str) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let bytes = self.tiles.get(address).cloned();
        let address = address.to_string();
        async move {
            bytes.ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no tile at {address}"))
            })
        }
    }
}

/// Session-scoped tile loader with a grow-only, single-flight cache.
///
/// Each address maps to one cell; concurrent requests for an uncached tile
/// await the same in-flight fetch instead of issuing duplicates. A failed
/// fetch leaves the cell empty, so only still-uncached tiles are re-fetched
/// on retry.
pub struct TileLoader<S> {
    index: TileIndex,
    source: S,
    cache: Mutex<HashMap<String, Arc<OnceCell<TilePayload>>>>,
}

impl<S: TileSource> TileLoader<S> {
    pub fn new(index: TileIndex, source: S) -> Self {
        TileLoader {
            index,
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    /// Loads every catalog star with magnitude <= `limit` as one flat list.
    ///
    /// Distinct uncached tiles are fetched concurrently and joined before the
    /// combine step; the call never returns a partial catalog. A limit below
    /// every tile yields an empty list, not an error.
    pub async fn load_for_magnitude_limit(&self, limit: f64) -> Result<Vec<Star>, CatalogError> {
        let selected: Vec<&TileDescriptor> = self.index.select(limit).collect();
        let payloads =
            futures::future::try_join_all(selected.iter().map(|tile| self.tile_payload(tile)))
                .await?;

        let mut stars = Vec::with_capacity(payloads.iter().map(|p| p.len()).sum());
        for payload in payloads {
            stars.extend(payload.iter().cloned());
        }
        debug!(
            "loaded {} stars from {} tiles for mag limit {limit}",
            stars.len(),
            selected.len()
        );
        Ok(stars)
    }

    async fn tile_payload(&self, tile: &TileDescriptor) -> Result<TilePayload, CatalogError> {
        let cell = {
            let mut cache = self.cache.lock().await;
            cache.entry(tile.address.clone()).or_default().clone()
        };
        cell.get_or_try_init(|| self.fetch_and_parse(tile))
            .await
            .cloned()
    }

    async fn fetch_and_parse(&self, tile: &TileDescriptor) -> Result<TilePayload, CatalogError> {
        let bytes =
            self.source
                .fetch(&tile.address)
                .await
                .map_err(|source| CatalogError::TileLoad {
                    address: tile.address.clone(),
                    source,
                })?;
        let records: Vec<StarRecord> =
            serde_json::from_slice(&bytes).map_err(|source| CatalogError::TileParse {
                address: tile.address.clone(),
                source,
            })?;
        let total = records.len();
        let stars: Vec<Star> = records
            .into_iter()
            .filter_map(|record| {
                let star = record.into_star();
                if star.is_none() {
                    warn!("skipping malformed star record in tile {}", tile.address);
                }
                star
            })
            .collect();
        debug!(
            "tile {} cached: {} stars ({} skipped)",
            tile.address,
            stars.len(),
            total - stars.len()
        );
        Ok(Arc::new(stars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps an inner source and counts fetches, optionally failing the
    /// first `fail_first` attempts.
    struct CountingSource {
        inner: InMemoryTileSource,
        fetches: AtomicUsize,
        fail_first: usize,
    }

    impl CountingSource {
        fn new(inner: InMemoryTileSource) -> Self {
            CountingSource {
                inner,
                fetches: AtomicUsize::new(0),
                fail_first: 0,
            }
        }

        fn failing_first(inner: InMemoryTileSource, fail_first: usize) -> Self {
            CountingSource {
                fail_first,
                ..Self::new(inner)
            }
        }
    }

    impl TileSource for CountingSource {
        fn fetch(&self, address: &str) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
            let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
            let fail = attempt < self.fail_first;
            let inner = self.inner.fetch(address);
            async move {
                // Let other tasks interleave so concurrent callers really race.
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                if fail {
                    return Err(io::Error::new(io::ErrorKind::Other, "synthetic outage"));
                }
                inner.await
            }
        }
    }

    fn tile_json(stars: &[(f64, f64, f64)]) -> Vec<u8> {
        let records: Vec<serde_json::Value> = stars
            .iter()
            .map(|(ra, dec, mag)| {
                serde_json::json!({ "ra_hours": ra, "dec_deg": dec, "mag": mag })
            })
            .collect();
        serde_json::to_vec(&records).unwrap()
    }

    fn two_tier_loader() -> TileLoader<CountingSource> {
        let index = TileIndex::new(vec![
            TileDescriptor {
                address: "t4".into(),
                mag_max: 4.0,
            },
            TileDescriptor {
                address: "t6".into(),
                mag_max: 6.0,
            },
        ])
        .unwrap();
        let inner = InMemoryTileSource::from_tiles([
            ("t4".to_string(), tile_json(&[(1.0, 10.0, 2.0), (2.0, -5.0, 3.5)])),
            ("t6".to_string(), tile_json(&[(3.0, 20.0, 5.0)])),
        ]);
        TileLoader::new(index, CountingSource::new(inner))
    }

    #[tokio::test]
    async fn loads_are_monotonic_in_the_limit() {
        let loader = two_tier_loader();
        let small = loader.load_for_magnitude_limit(4.0).await.unwrap();
        let large = loader.load_for_magnitude_limit(6.0).await.unwrap();
        assert_eq!(small.len(), 2);
        assert_eq!(large.len(), 3);
        for star in &small {
            assert!(large.contains(star));
        }
    }

    #[tokio::test]
    async fn each_star_appears_exactly_once() {
        let loader = two_tier_loader();
        let stars = loader.load_for_magnitude_limit(6.0).await.unwrap();
        for star in &stars {
            assert_eq!(stars.iter().filter(|s| *s == star).count(), 1);
        }
    }

    #[tokio::test]
    async fn limit_below_every_tile_is_empty_not_an_error() {
        let loader = two_tier_loader();
        let stars = loader.load_for_magnitude_limit(1.0).await.unwrap();
        assert!(stars.is_empty());
    }

    #[tokio::test]
    async fn concurrent_loads_fetch_each_tile_once() {
        let loader = two_tier_loader();
        let (a, b) = tokio::join!(
            loader.load_for_magnitude_limit(6.0),
            loader.load_for_magnitude_limit(6.0)
        );
        assert_eq!(a.unwrap().len(), 3);
        assert_eq!(b.unwrap().len(), 3);
        // Two tiles selected, two fetches total despite two callers.
        assert_eq!(loader.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cached_tiles_are_not_refetched() {
        let loader = two_tier_loader();
        loader.load_for_magnitude_limit(6.0).await.unwrap();
        loader.load_for_magnitude_limit(6.0).await.unwrap();
        assert_eq!(loader.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_caches_nothing_and_retry_succeeds() {
        let index = TileIndex::new(vec![TileDescriptor {
            address: "t6".into(),
            mag_max: 6.0,
        }])
        .unwrap();
        let inner = InMemoryTileSource::from_tiles([(
            "t6".to_string(),
            tile_json(&[(6.0, 90.0, 2.0)]),
        )]);
        let loader = TileLoader::new(index, CountingSource::failing_first(inner, 1));

        let first = loader.load_for_magnitude_limit(6.0).await;
        assert!(matches!(first, Err(CatalogError::TileLoad { .. })));

        let second = loader.load_for_magnitude_limit(6.0).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(loader.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let index = TileIndex::new(vec![TileDescriptor {
            address: "t6".into(),
            mag_max: 6.0,
        }])
        .unwrap();
        let payload = br#"[
            {"ra_hours": 6.0, "dec_deg": 45.0, "mag": 2.0},
            {"ra_hours": 1.0, "dec_deg": 95.0, "mag": 3.0}
        ]"#
        .to_vec();
        let source = InMemoryTileSource::from_tiles([("t6".to_string(), payload)]);
        let loader = TileLoader::new(index, source);
        let stars = loader.load_for_magnitude_limit(6.0).await.unwrap();
        assert_eq!(stars.len(), 1);
    }

    fn single_tile_index(address: &str) -> TileIndex {
        TileIndex::new(vec![TileDescriptor {
            address: address.into(),
            mag_max: 6.0,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn directory_source_reads_tiles_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t6.json"),
            tile_json(&[(6.0, 45.0, 2.0), (1.0, -10.0, 5.5)]),
        )
        .unwrap();
        let loader = TileLoader::new(
            single_tile_index("t6.json"),
            DirectoryTileSource::new(dir.path()),
        );
        let stars = loader.load_for_magnitude_limit(6.0).await.unwrap();
        assert_eq!(stars.len(), 2);
    }

    #[tokio::test]
    async fn directory_source_missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TileLoader::new(
            single_tile_index("absent.json"),
            DirectoryTileSource::new(dir.path()),
        );
        assert!(matches!(
            loader.load_for_magnitude_limit(6.0).await,
            Err(CatalogError::TileLoad { .. })
        ));
    }

    #[tokio::test]
    async fn unparsable_tile_is_a_parse_error() {
        let index = TileIndex::new(vec![TileDescriptor {
            address: "t6".into(),
            mag_max: 6.0,
        }])
        .unwrap();
        let source = InMemoryTileSource::from_tiles([("t6".to_string(), b"not json".to_vec())]);
        let loader = TileLoader::new(index, source);
        assert!(matches!(
            loader.load_for_magnitude_limit(6.0).await,
            Err(CatalogError::TileParse { .. })
        ));
    }
}
