//! Equatorial to horizontal coordinate transform.
//!
//! The rotation is built once per draw cycle from the observation instant and
//! observer location, then applied to every star. Input vectors must be in
//! the fixed J2000 equatorial frame; the [`EquatorialDir`] newtype makes a
//! frame-of-date vector unrepresentable at this seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// J2000.0 epoch (2000-01-01T12:00:00Z) as UTC epoch milliseconds.
const J2000_EPOCH_MS: i64 = 946_728_000_000;
const MS_PER_DAY: f64 = 86_400_000.0;

/// GMST linear model, degrees at J2000 and degrees per day.
/// The sub-arcsecond century terms are dropped; sky rotation for display
/// purposes only needs sub-minute instant resolution.
const GMST_BASE_DEG: f64 = 280.46061837;
const GMST_ROTATION_PER_DAY: f64 = 360.98564736629;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("observer has non-finite coordinates: lat={lat} lon={lon} height={height}")]
    NonFiniteObserver { lat: f64, lon: f64, height: f64 },
    #[error("observer latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
}

/// A point in time, as UTC epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instant(pub i64);

impl Instant {
    pub fn from_epoch_ms(ms: i64) -> Self {
        Instant(ms)
    }

    pub fn days_since_j2000(self) -> f64 {
        (self.0 - J2000_EPOCH_MS) as f64 / MS_PER_DAY
    }
}

/// Observer location on Earth.
///
/// Height is carried for callers that feed it through to display metadata;
/// a negative value means below the reference surface and is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub lat_deg: f64,
    pub lon_deg: f64,
    #[serde(default)]
    pub height_m: f64,
}

impl Observer {
    pub fn new(lat_deg: f64, lon_deg: f64, height_m: f64) -> Self {
        Observer {
            lat_deg,
            lon_deg,
            height_m,
        }
    }

    fn validate(&self) -> Result<(), TransformError> {
        if !self.lat_deg.is_finite() || !self.lon_deg.is_finite() || !self.height_m.is_finite() {
            return Err(TransformError::NonFiniteObserver {
                lat: self.lat_deg,
                lon: self.lon_deg,
                height: self.height_m,
            });
        }
        if !(-90.0..=90.0).contains(&self.lat_deg) {
            return Err(TransformError::LatitudeOutOfRange(self.lat_deg));
        }
        Ok(())
    }
}

/// Unit direction in the fixed J2000 equatorial frame.
///
/// x points toward RA 0h on the celestial equator, y toward RA 6h, z toward
/// the north celestial pole. [`Rotation::apply`] only accepts this type, so
/// catalog preprocessing and rotation construction cannot silently disagree
/// on the frame convention.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquatorialDir([f64; 3]);

impl EquatorialDir {
    pub fn from_ra_dec(ra_hours: f64, dec_deg: f64) -> Self {
        // RA hours -> degrees is a factor of 15.
        let ra = (ra_hours * 15.0).to_radians();
        let dec = dec_deg.to_radians();
        let (sin_ra, cos_ra) = ra.sin_cos();
        let (sin_dec, cos_dec) = dec.sin_cos();
        EquatorialDir([cos_dec * cos_ra, cos_dec * sin_ra, sin_dec])
    }

    pub fn xyz(&self) -> [f64; 3] {
        self.0
    }
}

/// Direction in the observer's horizontal frame.
///
/// `vec` components are (north, east, up); azimuth is degrees clockwise from
/// north in [0, 360), altitude is degrees above the horizon in [-90, 90].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HorizontalDir {
    pub vec: [f64; 3],
    pub az_deg: f64,
    pub alt_deg: f64,
}

impl HorizontalDir {
    fn from_components(north: f64, east: f64, up: f64) -> Self {
        let alt_deg = up.clamp(-1.0, 1.0).asin().to_degrees();
        let az_deg = east.atan2(north).to_degrees().rem_euclid(360.0);
        HorizontalDir {
            vec: [north, east, up],
            az_deg,
            alt_deg,
        }
    }

    /// Above the local flat horizon, strictly: altitude exactly 0 is not
    /// visible. Stars and constellation vertices use this same rule.
    pub fn is_visible(&self) -> bool {
        self.alt_deg > 0.0
    }
}

/// Equatorial-to-horizontal rotation for one (instant, observer) pair.
///
/// Rows are the local north, east and up basis vectors expressed in the
/// equatorial frame; building it costs the sidereal-time setup once, applying
/// it is nine multiplies per star. Valid only for the inputs that produced
/// it; a new instant or observer needs a new rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    rows: [[f64; 3]; 3],
}

impl Rotation {
    pub fn build(instant: Instant, observer: &Observer) -> Result<Rotation, TransformError> {
        observer.validate()?;
        let lat = observer.lat_deg.to_radians();
        let lst = local_sidereal_degrees(instant, observer.lon_deg).to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lst, cos_lst) = lst.sin_cos();
        let north = [-sin_lat * cos_lst, -sin_lat * sin_lst, cos_lat];
        let east = [-sin_lst, cos_lst, 0.0];
        let up = [cos_lat * cos_lst, cos_lat * sin_lst, sin_lat];
        Ok(Rotation {
            rows: [north, east, up],
        })
    }

    pub fn apply(&self, dir: &EquatorialDir) -> HorizontalDir {
        let v = dir.xyz();
        let [north, east, up] = self.rows;
        HorizontalDir::from_components(dot(north, v), dot(east, v), dot(up, v))
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Greenwich mean sidereal time, degrees in [0, 360).
fn gmst_degrees(instant: Instant) -> f64 {
    (GMST_BASE_DEG + GMST_ROTATION_PER_DAY * instant.days_since_j2000()).rem_euclid(360.0)
}

/// Local sidereal time: GMST shifted east by the observer longitude.
fn local_sidereal_degrees(instant: Instant, lon_deg: f64) -> f64 {
    (gmst_degrees(instant) + lon_deg).rem_euclid(360.0)
}
