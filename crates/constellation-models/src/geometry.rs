//! Coverage geometry for circular orbits
//!
//! The coverage cone of a satellite is bounded by the minimum elevation
//! angle seen from the ground. Intersecting that cone with a spherical Earth
//! gives the footprint, which fixes both the slant range used by the link
//! budget and the number of satellites needed for continuous coverage.

use crate::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Ratio between footprint radius and the radius of the inscribed hexagon cell
const HEX_CELL_FACTOR: f64 = 1.154_700_538_379_251_5; // 2 / sqrt(3)

/// Edge of the coverage footprint, in the orbital plane frame (km)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Distance from Earth centre along the nadir axis
    pub z_km: f64,
    /// Footprint radius perpendicular to the nadir axis
    pub radius_km: f64,
}

/// Half-angle of the coverage cone at the satellite (rad)
pub fn half_angle_rad(elevation_deg: f64, altitude_km: f64) -> f64 {
    let ratio = EARTH_RADIUS_KM * (elevation_deg.to_radians() + PI / 2.0).sin()
        / (EARTH_RADIUS_KM + altitude_km);
    ratio.clamp(-1.0, 1.0).asin()
}

/// Intersect the coverage cone with the Earth sphere
pub fn footprint(elevation_deg: f64, altitude_km: f64) -> Result<Footprint> {
    let invalid = || ModelError::InvalidGeometry { elevation_deg, altitude_km };
    if !(elevation_deg.is_finite() && altitude_km.is_finite() && altitude_km > 0.0) {
        return Err(invalid());
    }

    let height = EARTH_RADIUS_KM + altitude_km;
    let stretch = half_angle_rad(elevation_deg, altitude_km).tan();
    let offset = -height * stretch;

    // (stretch*z + offset)^2 + z^2 = R^2
    let a = stretch * stretch + 1.0;
    let b = 2.0 * stretch * offset;
    let c = offset * offset - EARTH_RADIUS_KM * EARTH_RADIUS_KM;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Err(invalid());
    }

    let z_km = (-b + discriminant.sqrt()) / (2.0 * a);
    let radius_km = (EARTH_RADIUS_KM * EARTH_RADIUS_KM - z_km * z_km).max(0.0).sqrt();
    Ok(Footprint { z_km, radius_km })
}

/// Slant range from the satellite to the footprint edge (km)
pub fn path_distance_km(elevation_deg: f64, altitude_km: f64) -> Result<f64> {
    let fp = footprint(elevation_deg, altitude_km)?;
    Ok(((altitude_km + EARTH_RADIUS_KM - fp.z_km).powi(2) + fp.radius_km.powi(2)).sqrt())
}

/// Plane/slot layout of a polar constellation with continuous coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolarConstellation {
    pub planes: u32,
    pub sats_per_plane: u32,
}

impl PolarConstellation {
    /// Size a polar constellation from the footprint of a single satellite
    pub fn for_coverage(elevation_deg: f64, altitude_km: f64) -> Result<Self> {
        let fp = footprint(elevation_deg, altitude_km)?;

        // Overlapping hexagonal cells
        let cell_radius = fp.radius_km / HEX_CELL_FACTOR;
        if cell_radius <= 1e-9 {
            return Err(ModelError::InvalidGeometry { elevation_deg, altitude_km });
        }
        let plane_spacing = 3f64.sqrt() * cell_radius;

        let in_plane_angle = 2.0 * (cell_radius / EARTH_RADIUS_KM).min(1.0).asin();
        let plane_angle = 2.0 * (plane_spacing / EARTH_RADIUS_KM).atan();

        Ok(Self {
            planes: (2.0 * PI / plane_angle).ceil() as u32,
            sats_per_plane: (2.0 * PI / in_plane_angle).ceil() as u32,
        })
    }

    pub fn total(&self) -> u32 {
        self.planes * self.sats_per_plane
    }
}

/// Number of satellites for continuous coverage
pub fn satellite_count(elevation_deg: f64, altitude_km: f64) -> Result<u32> {
    Ok(PolarConstellation::for_coverage(elevation_deg, altitude_km)?.total())
}
