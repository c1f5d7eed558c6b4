//! Projection of visible horizontal directions onto render coordinates.
//!
//! Two modes: a planar all-sky disc (zenith at the center, horizon at the
//! rim) and a sky dome where the rotated unit vector itself is the render
//! coordinate and the display layer owns the camera.

use serde::{Deserialize, Serialize};

use crate::transform::{HorizontalDir, Rotation};
use crate::Star;

/// Point in display coordinates, y growing downward (canvas convention).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

/// Bounded circular viewport for the disc projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscViewport {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

/// Display size from magnitude. Must be non-increasing in magnitude and
/// stay above a positive floor so faint stars never vanish entirely.
pub type SizePolicy = fn(f64) -> f64;

/// Clamped linear size curve; the stock display tuning.
pub fn default_size_policy(mag: f64) -> f64 {
    (5.5 - mag).max(0.6)
}

/// Equidistant zenith-to-horizon disc mapping.
///
/// Radius is linear in altitude (90 degrees maps to the center, 0 to the
/// rim) and azimuth runs clockwise with north at the top of the disc. This
/// is the chosen display convention, not a geometrically true projection,
/// and is reproduced exactly.
pub fn project_disc(dir: &HorizontalDir, viewport: &DiscViewport) -> PlanarPoint {
    let r = (90.0 - dir.alt_deg) / 90.0 * viewport.radius;
    let az = dir.az_deg.to_radians();
    PlanarPoint {
        x: viewport.center_x + r * az.sin(),
        y: viewport.center_y - r * az.cos(),
    }
}

/// A star ready to draw on the disc.
#[derive(Clone, Debug, Serialize)]
pub struct ProjectedStar {
    pub position: PlanarPoint,
    pub display_size: f64,
}

/// A star ready to draw on the sky dome; position is the rotated unit vector.
#[derive(Clone, Debug, Serialize)]
pub struct SkyStar {
    pub position: [f64; 3],
    pub display_size: f64,
}

/// Transforms, filters and projects a star list for the disc in one pass.
pub fn project_stars_disc(
    stars: &[Star],
    rotation: &Rotation,
    viewport: &DiscViewport,
    size: SizePolicy,
) -> Vec<ProjectedStar> {
    stars
        .iter()
        .filter_map(|star| {
            let hor = rotation.apply(&star.dir);
            hor.is_visible().then(|| ProjectedStar {
                position: project_disc(&hor, viewport),
                display_size: size(star.mag),
            })
        })
        .collect()
}

/// Sky-dome counterpart: the projection is the identity on the rotated
/// vector.
pub fn project_stars_sky(stars: &[Star], rotation: &Rotation, size: SizePolicy) -> Vec<SkyStar> {
    stars
        .iter()
        .filter_map(|star| {
            let hor = rotation.apply(&star.dir);
            hor.is_visible().then(|| SkyStar {
                position: hor.vec,
                display_size: size(star.mag),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Instant, Observer};
    use assert_approx_eq::assert_approx_eq;

    fn viewport() -> DiscViewport {
        DiscViewport {
            center_x: 400.0,
            center_y: 300.0,
            radius: 250.0,
        }
    }

    fn hor(az_deg: f64, alt_deg: f64) -> HorizontalDir {
        let (az, alt) = (az_deg.to_radians(), alt_deg.to_radians());
        HorizontalDir {
            vec: [alt.cos() * az.cos(), alt.cos() * az.sin(), alt.sin()],
            az_deg,
            alt_deg,
        }
    }

    #[test]
    fn zenith_maps_to_center() {
        let p = project_disc(&hor(123.0, 90.0), &viewport());
        assert_approx_eq!(p.x, 400.0, 1e-9);
        assert_approx_eq!(p.y, 300.0, 1e-9);
    }

    #[test]
    fn horizon_maps_to_rim() {
        let p = project_disc(&hor(90.0, 0.0), &viewport());
        let dx = p.x - 400.0;
        let dy = p.y - 300.0;
        assert_approx_eq!((dx * dx + dy * dy).sqrt(), 250.0, 1e-9);
    }

    #[test]
    fn north_on_horizon_is_at_the_top() {
        let p = project_disc(&hor(0.0, 0.0), &viewport());
        assert_approx_eq!(p.x, 400.0, 1e-9);
        assert_approx_eq!(p.y, 50.0, 1e-9);
    }

    #[test]
    fn east_on_horizon_is_at_the_right() {
        let p = project_disc(&hor(90.0, 0.0), &viewport());
        assert_approx_eq!(p.x, 650.0, 1e-9);
        assert_approx_eq!(p.y, 300.0, 1e-9);
    }

    #[test]
    fn radius_is_linear_in_altitude() {
        let p = project_disc(&hor(0.0, 45.0), &viewport());
        assert_approx_eq!(p.y, 300.0 - 125.0, 1e-9);
    }

    #[test]
    fn size_policy_is_monotonic_with_a_floor() {
        let mut previous = f64::INFINITY;
        let mut mag = -1.5;
        while mag <= 12.0 {
            let size = default_size_policy(mag);
            assert!(size <= previous);
            assert!(size >= 0.6);
            previous = size;
            mag += 0.25;
        }
        assert_approx_eq!(default_size_policy(0.5), 5.0, 1e-12);
        assert_approx_eq!(default_size_policy(11.0), 0.6, 1e-12);
    }

    #[test]
    fn below_horizon_stars_are_dropped() {
        let stars = vec![
            Star::new(None, None, 6.0, 90.0, 2.0),
            Star::new(None, None, 6.0, -90.0, 2.0),
        ];
        let observer = Observer::new(90.0, 0.0, 0.0);
        let rotation = Rotation::build(Instant::from_epoch_ms(1_717_243_200_000), &observer)
            .unwrap();
        let projected = project_stars_disc(&stars, &rotation, &viewport(), default_size_policy);
        assert_eq!(projected.len(), 1);
        // The pole star sits at the north-pole observer's zenith.
        assert_approx_eq!(projected[0].position.x, 400.0, 1e-6);
        assert_approx_eq!(projected[0].position.y, 300.0, 1e-6);
    }

    #[test]
    fn sky_mode_is_identity_on_the_rotated_vector() {
        let stars = vec![Star::new(None, None, 6.0, 90.0, 2.0)];
        let observer = Observer::new(90.0, 0.0, 0.0);
        let rotation = Rotation::build(Instant::from_epoch_ms(1_717_243_200_000), &observer)
            .unwrap();
        let sky = project_stars_sky(&stars, &rotation, default_size_policy);
        assert_eq!(sky.len(), 1);
        let expected = rotation.apply(&stars[0].dir).vec;
        assert_eq!(sky[0].position, expected);
    }
}
