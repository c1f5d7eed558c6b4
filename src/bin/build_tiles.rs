use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use skyview_engine::catalog::{TileDescriptor, TileIndex};
use skyview_engine::data::{write_bundle_to_file, SkyBundle};
use skyview_engine::StarRecord;
use tempfile::NamedTempFile;

const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/astronexus/HYG-Database/main/hyg/CURRENT/hygdata_v41.csv";

/// Completeness bound of each tile. A tile holds the stars brighter than its
/// bound but fainter than the previous one, so the tiles are disjoint and
/// their union up to bound L is exactly the catalog with mag <= L.
const TILE_MAG_BOUNDS: [f64; 6] = [3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

#[derive(Debug, Serialize)]
struct DatasetMetadata {
    source_url: String,
    stars: usize,
    tiles: usize,
    generated_at_epoch: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let source_url = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());

    let client = Client::builder()
        .user_agent("skyview-engine-tile-builder/0.1")
        .build()?;

    info!("Downloading star catalog from {source_url}");
    let temp_file = download_catalog(&client, &source_url)?;
    let stars = parse_catalog(temp_file.path())
        .with_context(|| "failed to parse downloaded catalog CSV")?;
    info!("Parsed {} stars up to mag {}", stars.len(), TILE_MAG_BOUNDS[TILE_MAG_BOUNDS.len() - 1]);

    let tiles = bucket_into_tiles(stars);

    let output_dir = PathBuf::from("data");
    fs::create_dir_all(&output_dir).context("failed to create data output directory")?;

    let mut descriptors = Vec::with_capacity(tiles.len());
    let mut payloads = HashMap::new();
    let mut total = 0usize;
    for (descriptor, records) in &tiles {
        let payload = serde_json::to_vec(records)?;
        let tile_path = output_dir.join(&descriptor.address);
        fs::write(&tile_path, &payload)
            .with_context(|| format!("failed to write tile to {}", tile_path.display()))?;
        total += records.len();
        payloads.insert(descriptor.address.clone(), payload);
        descriptors.push(descriptor.clone());
    }

    let index = TileIndex::new(descriptors)?;
    let index_path = output_dir.join("tile_index.json");
    fs::write(&index_path, serde_json::to_vec_pretty(index.tiles())?)
        .with_context(|| format!("failed to write index to {}", index_path.display()))?;

    let bundle = SkyBundle {
        index,
        tiles: payloads,
    };
    let bundle_path = output_dir.join("skyview.bundle");
    write_bundle_to_file(&bundle, &bundle_path)
        .with_context(|| format!("failed to write bundle to {}", bundle_path.display()))?;

    let metadata = DatasetMetadata {
        source_url,
        stars: total,
        tiles: tiles.len(),
        generated_at_epoch: current_epoch_seconds(),
    };
    let metadata_path = output_dir.join("skyview.meta.json");
    fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?)
        .with_context(|| format!("failed to write metadata to {}", metadata_path.display()))?;

    info!(
        "Wrote {} tiles ({} stars) and packed bundle to {}",
        metadata.tiles,
        metadata.stars,
        bundle_path.display()
    );

    Ok(())
}

fn download_catalog(client: &Client, url: &str) -> Result<NamedTempFile> {
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to download {url}"))?
        .error_for_status()
        .context("catalog download returned an error status")?;
    let mut file = NamedTempFile::new()?;
    response.copy_to(&mut file)?;
    Ok(file)
}

fn parse_catalog(path: &Path) -> Result<Vec<StarRecord>> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    parse_catalog_csv(file)
}

/// Reads the HYG-style CSV: header-addressed columns, RA in hours, Dec in
/// degrees. Rows that are ragged or carry unparsable numbers are skipped
/// with a warning.
fn parse_catalog_csv<R: io::Read>(input: R) -> Result<Vec<StarRecord>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader
        .headers()
        .context("catalog CSV has no header row")?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("catalog CSV is missing a {name} column"))
    };
    let ra_col = column("ra")?;
    let dec_col = column("dec")?;
    let mag_col = column("mag")?;
    let hip_col = column("hip")?;
    let name_col = column("proper")?;
    let faint_limit = TILE_MAG_BOUNDS[TILE_MAG_BOUNDS.len() - 1];

    let mut stars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping row {}: {e}", row + 2);
                continue;
            }
        };
        let field = |col: usize| record.get(col).unwrap_or("").trim();
        let name = field(name_col);
        if name == "Sol" {
            continue;
        }
        let (Ok(ra_hours), Ok(dec_deg), Ok(mag)) = (
            field(ra_col).parse::<f64>(),
            field(dec_col).parse::<f64>(),
            field(mag_col).parse::<f64>(),
        ) else {
            warn!("skipping row {}: unparsable ra/dec/mag", row + 2);
            continue;
        };
        if mag > faint_limit {
            continue;
        }
        stars.push(StarRecord {
            id: field(hip_col).parse::<u32>().ok(),
            name: (!name.is_empty()).then(|| name.to_string()),
            ra_hours,
            dec_deg,
            mag,
        });
    }

    if stars.is_empty() {
        bail!("catalog CSV produced no stars");
    }
    Ok(stars)
}

/// Buckets stars into disjoint magnitude bands, one tile per band.
fn bucket_into_tiles(stars: Vec<StarRecord>) -> Vec<(TileDescriptor, Vec<StarRecord>)> {
    let mut tiles: Vec<(TileDescriptor, Vec<StarRecord>)> = TILE_MAG_BOUNDS
        .iter()
        .map(|&mag_max| {
            (
                TileDescriptor {
                    address: format!("tile_mag{mag_max:.0}.json"),
                    mag_max,
                },
                Vec::new(),
            )
        })
        .collect();

    for star in stars {
        let Some(slot) = TILE_MAG_BOUNDS.iter().position(|&bound| star.mag <= bound) else {
            continue;
        };
        tiles[slot].1.push(star);
    }

    for (descriptor, records) in &tiles {
        info!("{}: {} stars (mag <= {})", descriptor.address, records.len(), descriptor.mag_max);
    }
    tiles
}

fn current_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
