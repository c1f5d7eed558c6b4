pub mod catalog;
pub mod constellation;
pub mod data;
pub mod pipeline;
pub mod project;
pub mod transform;

use serde::{Deserialize, Serialize};

use crate::transform::EquatorialDir;

/// A catalog star in the fixed J2000 equatorial frame.
///
/// The unit direction vector is computed once at load time so a draw cycle
/// spends one matrix multiply per star, no trigonometry.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Star {
    pub id: Option<u32>,
    pub name: Option<String>,
    /// Right ascension in hours, [0, 24).
    pub ra_hours: f64,
    /// Declination in degrees, [-90, 90].
    pub dec_deg: f64,
    /// Apparent magnitude; lower is brighter.
    pub mag: f64,
    pub dir: EquatorialDir,
}

impl Star {
    pub fn new(
        id: Option<u32>,
        name: Option<String>,
        ra_hours: f64,
        dec_deg: f64,
        mag: f64,
    ) -> Self {
        Star {
            id,
            name,
            ra_hours,
            dec_deg,
            mag,
            dir: EquatorialDir::from_ra_dec(ra_hours, dec_deg),
        }
    }
}

/// Wire shape of one tile payload entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StarRecord {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    pub ra_hours: f64,
    pub dec_deg: f64,
    pub mag: f64,
}

impl StarRecord {
    /// Validates the record and precomputes its direction vector.
    ///
    /// Returns `None` for records with non-finite coordinates or magnitude;
    /// callers skip those with a warning rather than failing the whole tile.
    pub fn into_star(self) -> Option<Star> {
        if !self.ra_hours.is_finite() || !self.dec_deg.is_finite() || !self.mag.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&self.dec_deg) {
            return None;
        }
        Some(Star::new(
            self.id,
            self.name,
            self.ra_hours,
            self.dec_deg,
            self.mag,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn record_precomputes_unit_direction() {
        let record = StarRecord {
            id: Some(91262),
            name: Some("Vega".into()),
            ra_hours: 18.615649,
            dec_deg: 38.78369,
            mag: 0.03,
        };
        let star = record.into_star().expect("valid record");
        let [x, y, z] = star.dir.xyz();
        assert_approx_eq!((x * x + y * y + z * z).sqrt(), 1.0, 1e-12);
    }

    #[test]
    fn non_finite_record_is_rejected() {
        let record = StarRecord {
            id: None,
            name: None,
            ra_hours: f64::NAN,
            dec_deg: 0.0,
            mag: 3.0,
        };
        assert!(record.into_star().is_none());
    }

    #[test]
    fn out_of_range_declination_is_rejected() {
        let record = StarRecord {
            id: None,
            name: None,
            ra_hours: 0.0,
            dec_deg: 91.0,
            mag: 3.0,
        };
        assert!(record.into_star().is_none());
    }
}
