//! Draw-cycle orchestration: catalog load, one rotation per cycle,
//! visibility filtering, projection and constellation assembly.
//!
//! Draw cycles may overlap: a new request can start while an older one is
//! still waiting on tiles. Every cycle is stamped with a generation taken at
//! request time, and [`FrameSlot`] refuses to install a frame older than the
//! one it holds, so a stale result is discarded instead of rendered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogError, TileIndex, TileLoader, TileSource};
use crate::constellation::{
    resolve_figure, resolve_sky_figure, Constellation, ConstellationFigure, SkyFigure,
};
use crate::project::{
    default_size_policy, project_stars_disc, project_stars_sky, DiscViewport, ProjectedStar,
    SizePolicy, SkyStar,
};
use crate::transform::{Instant, Observer, Rotation, TransformError};
use crate::Star;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Inputs of one draw cycle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DrawRequest {
    pub instant: Instant,
    pub observer: Observer,
    pub mag_limit: f64,
}

/// Completed disc-mode draw cycle.
#[derive(Clone, Debug, Serialize)]
pub struct DiscFrame {
    pub generation: u64,
    pub stars: Vec<ProjectedStar>,
    pub figures: Vec<ConstellationFigure>,
}

/// Completed sky-dome draw cycle.
#[derive(Clone, Debug, Serialize)]
pub struct DomeFrame {
    pub generation: u64,
    pub stars: Vec<SkyStar>,
    pub figures: Vec<SkyFigure>,
}

pub trait Frame {
    fn generation(&self) -> u64;
}

impl Frame for DiscFrame {
    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Frame for DomeFrame {
    fn generation(&self) -> u64 {
        self.generation
    }
}

/// The celestial visibility pipeline for one session.
pub struct SkyPipeline<S> {
    loader: TileLoader<S>,
    constellations: Vec<Constellation>,
    size_policy: SizePolicy,
    generation: AtomicU64,
}

impl<S: TileSource> SkyPipeline<S> {
    pub fn new(index: TileIndex, source: S, constellations: Vec<Constellation>) -> Self {
        SkyPipeline {
            loader: TileLoader::new(index, source),
            constellations,
            size_policy: default_size_policy,
            generation: AtomicU64::new(0),
        }
    }

    /// Swaps the size-from-magnitude curve; a display tuning knob.
    pub fn with_size_policy(mut self, size_policy: SizePolicy) -> Self {
        self.size_policy = size_policy;
        self
    }

    pub fn loader(&self) -> &TileLoader<S> {
        &self.loader
    }

    pub async fn draw_disc(
        &self,
        request: &DrawRequest,
        viewport: &DiscViewport,
    ) -> Result<DiscFrame, PipelineError> {
        let (generation, rotation, stars) = self.start_cycle(request).await?;
        let frame = DiscFrame {
            generation,
            stars: project_stars_disc(&stars, &rotation, viewport, self.size_policy),
            figures: self
                .constellations
                .iter()
                .map(|c| resolve_figure(c, &rotation, viewport))
                .collect(),
        };
        debug!(
            "disc frame {generation}: {} stars, {} figures",
            frame.stars.len(),
            frame.figures.len()
        );
        Ok(frame)
    }

    pub async fn draw_dome(&self, request: &DrawRequest) -> Result<DomeFrame, PipelineError> {
        let (generation, rotation, stars) = self.start_cycle(request).await?;
        let frame = DomeFrame {
            generation,
            stars: project_stars_sky(&stars, &rotation, self.size_policy),
            figures: self
                .constellations
                .iter()
                .map(|c| resolve_sky_figure(c, &rotation))
                .collect(),
        };
        debug!(
            "dome frame {generation}: {} stars, {} figures",
            frame.stars.len(),
            frame.figures.len()
        );
        Ok(frame)
    }

    /// Shared head of both modes: stamp the cycle, reject bad inputs before
    /// any I/O, then load and transform.
    async fn start_cycle(
        &self,
        request: &DrawRequest,
    ) -> Result<(u64, Rotation, Vec<Star>), PipelineError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let rotation = Rotation::build(request.instant, &request.observer)?;
        let stars = self.loader.load_for_magnitude_limit(request.mag_limit).await?;
        Ok((generation, rotation, stars))
    }
}

/// Holds the most recent completed frame for a renderer to pick up.
///
/// A frame from a superseded cycle is rejected; whatever is installed only
/// ever moves forward in generation.
pub struct FrameSlot<F> {
    latest: Mutex<Option<F>>,
}

impl<F: Frame + Clone> FrameSlot<F> {
    pub fn new() -> Self {
        FrameSlot {
            latest: Mutex::new(None),
        }
    }

    /// Installs `frame` unless a newer one already landed. Returns whether
    /// the frame was accepted.
    pub fn install(&self, frame: F) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        match latest.as_ref() {
            Some(current) if current.generation() >= frame.generation() => false,
            _ => {
                *latest = Some(frame);
                true
            }
        }
    }

    pub fn latest(&self) -> Option<F> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<F: Frame + Clone> Default for FrameSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}
