//! Constellation figures: vertex lists with line-art edges, resolved per
//! draw cycle into only the segments whose both endpoints are above the
//! horizon, plus an anchor point for the label.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::{project_disc, DiscViewport, PlanarPoint};
use crate::transform::{EquatorialDir, Rotation};

#[derive(Debug, Error)]
pub enum ConstellationError {
    #[error("constellation data malformed")]
    Parse(#[from] serde_json::Error),
    #[error("constellation {name}: edge [{a}, {b}] references a missing vertex ({vertices} vertices)")]
    EdgeOutOfRange {
        name: String,
        a: usize,
        b: usize,
        vertices: usize,
    },
}

/// Wire shape of one constellation vertex.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexRecord {
    pub ra_hours: f64,
    pub dec_deg: f64,
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default)]
    pub id: Option<u32>,
}

/// Wire shape of one constellation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstellationRecord {
    pub name: String,
    pub stars: Vec<VertexRecord>,
    pub lines: Vec<[usize; 2]>,
}

/// A named figure with precomputed vertex directions and validated edges.
#[derive(Clone, Debug)]
pub struct Constellation {
    pub name: String,
    vertices: Vec<EquatorialDir>,
    edges: Vec<[usize; 2]>,
}

impl Constellation {
    /// Strict constructor for programmatic figures: every edge must index
    /// into the vertex list.
    pub fn new(
        name: String,
        vertices: Vec<EquatorialDir>,
        edges: Vec<[usize; 2]>,
    ) -> Result<Self, ConstellationError> {
        for &[a, b] in &edges {
            if a >= vertices.len() || b >= vertices.len() {
                return Err(ConstellationError::EdgeOutOfRange {
                    name,
                    a,
                    b,
                    vertices: vertices.len(),
                });
            }
        }
        Ok(Constellation {
            name,
            vertices,
            edges,
        })
    }

    /// Lenient constructor for external data: malformed vertices and
    /// out-of-range edges are skipped with a warning, not fatal.
    pub fn from_record(record: ConstellationRecord) -> Self {
        let mut vertices = Vec::with_capacity(record.stars.len());
        // Dropping a vertex shifts the indices edges refer to, so keep a
        // remap from record position to surviving position.
        let mut remap = vec![None; record.stars.len()];
        for (i, vertex) in record.stars.iter().enumerate() {
            if vertex.ra_hours.is_finite() && vertex.dec_deg.is_finite() {
                remap[i] = Some(vertices.len());
                vertices.push(EquatorialDir::from_ra_dec(vertex.ra_hours, vertex.dec_deg));
            } else {
                warn!(
                    "constellation {}: skipping vertex {i} with non-finite coordinates",
                    record.name
                );
            }
        }
        let edges = record
            .lines
            .into_iter()
            .filter_map(|[a, b]| {
                let resolved = match (remap.get(a), remap.get(b)) {
                    (Some(&Some(a)), Some(&Some(b))) => Some([a, b]),
                    _ => None,
                };
                if resolved.is_none() {
                    warn!(
                        "constellation {}: skipping edge [{a}, {b}] with missing vertex",
                        record.name
                    );
                }
                resolved
            })
            .collect();
        Constellation {
            name: record.name,
            vertices,
            edges,
        }
    }

    pub fn vertices(&self) -> &[EquatorialDir] {
        &self.vertices
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }
}

/// Parses a constellation catalog; individual bad records are skipped inside
/// `from_record`, but an unreadable file is an error.
pub fn load_constellations(bytes: &[u8]) -> Result<Vec<Constellation>, ConstellationError> {
    let records: Vec<ConstellationRecord> = serde_json::from_slice(bytes)?;
    Ok(records.into_iter().map(Constellation::from_record).collect())
}

/// Disc-mode figure: projected segments plus a label anchor at the centroid
/// of the visible vertices. No anchor when nothing is visible.
#[derive(Clone, Debug, Serialize)]
pub struct ConstellationFigure {
    pub name: String,
    pub segments: Vec<(PlanarPoint, PlanarPoint)>,
    pub label_anchor: Option<PlanarPoint>,
}

/// Sky-dome figure: segments and anchor as horizontal unit vectors.
#[derive(Clone, Debug, Serialize)]
pub struct SkyFigure {
    pub name: String,
    pub segments: Vec<([f64; 3], [f64; 3])>,
    pub label_anchor: Option<[f64; 3]>,
}

/// Resolves a figure against one draw cycle's rotation for the disc.
///
/// An edge is emitted only when both endpoints are visible; an edge with an
/// endpoint on or below the horizon is dropped whole, never partially drawn.
pub fn resolve_figure(
    constellation: &Constellation,
    rotation: &Rotation,
    viewport: &DiscViewport,
) -> ConstellationFigure {
    let points: Vec<Option<PlanarPoint>> = constellation
        .vertices
        .iter()
        .map(|dir| {
            let hor = rotation.apply(dir);
            hor.is_visible().then(|| project_disc(&hor, viewport))
        })
        .collect();

    let segments = constellation
        .edges
        .iter()
        .filter_map(|&[a, b]| match (points[a], points[b]) {
            (Some(pa), Some(pb)) => Some((pa, pb)),
            _ => None,
        })
        .collect();

    let visible: Vec<PlanarPoint> = points.into_iter().flatten().collect();
    let label_anchor = (!visible.is_empty()).then(|| {
        let n = visible.len() as f64;
        PlanarPoint {
            x: visible.iter().map(|p| p.x).sum::<f64>() / n,
            y: visible.iter().map(|p| p.y).sum::<f64>() / n,
        }
    });

    ConstellationFigure {
        name: constellation.name.clone(),
        segments,
        label_anchor,
    }
}

/// Sky-dome counterpart of [`resolve_figure`].
pub fn resolve_sky_figure(constellation: &Constellation, rotation: &Rotation) -> SkyFigure {
    let points: Vec<Option<[f64; 3]>> = constellation
        .vertices
        .iter()
        .map(|dir| {
            let hor = rotation.apply(dir);
            hor.is_visible().then_some(hor.vec)
        })
        .collect();

    let segments = constellation
        .edges
        .iter()
        .filter_map(|&[a, b]| match (points[a], points[b]) {
            (Some(pa), Some(pb)) => Some((pa, pb)),
            _ => None,
        })
        .collect();

    let visible: Vec<[f64; 3]> = points.into_iter().flatten().collect();
    let label_anchor = (!visible.is_empty()).then(|| {
        let n = visible.len() as f64;
        [
            visible.iter().map(|p| p[0]).sum::<f64>() / n,
            visible.iter().map(|p| p[1]).sum::<f64>() / n,
            visible.iter().map(|p| p[2]).sum::<f64>() / n,
        ]
    });

    SkyFigure {
        name: constellation.name.clone(),
        segments,
        label_anchor,
    }
}
