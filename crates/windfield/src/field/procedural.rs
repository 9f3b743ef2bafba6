// Synthetic wind used when no real data is available

use super::{FieldError, FieldOrigin, VectorField, node_position};
use crate::geo::GeoBounds;
use crate::wind::WindVector;
use glam::Vec3;
use noise::{NoiseFn, Perlin};

/// Latitudes (degrees) where circulation bands turn
const TURN_POINTS: [f32; 4] = [0.0, 30.0, 60.0, 90.0];

/// Zonal direction at each turn point:
/// 0°: -1 (trade easterlies)
/// 30°: +1 (westerlies)
/// 60°: -1 (polar easterlies)
/// 90°: -1
const ZONAL_SIGNS: [f32; 4] = [-1.0, 1.0, -1.0, -1.0];

/// Meridional direction at each turn point in the NORTHERN hemisphere:
/// towards the equator = -1, away from the equator = +1
const MERIDIONAL_SIGNS: [f32; 4] = [-1.0, 1.0, -1.0, -1.0];

const ZONAL_SPEED: f32 = 12.0;
const MERIDIONAL_SPEED: f32 = 4.0;
/// Below this latitude the meridional component fades out so the equator stays continuous
const EQUATOR_BLEND_DEG: f32 = 10.0;
const NOISE_FREQUENCY: f64 = 2.5;
const NOISE_OFFSET: f64 = 17.3;

/// Deterministic, plausible-looking but non-physical global wind
///
/// Noise is sampled on the unit sphere, so the field is seamless across the
/// antimeridian and the same seed always produces the same field.
#[derive(Debug, Clone)]
pub struct ProceduralField {
    perlin: Perlin,
    seed: u32,
}

impl ProceduralField {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Wind at a coordinate, evaluated directly (no grid)
    pub fn wind_at(&self, lat: f32, lng: f32) -> WindVector {
        let abs_lat = lat.abs().min(90.0);

        let segment = if abs_lat < 30.0 {
            0
        } else if abs_lat < 60.0 {
            1
        } else {
            2
        };
        let p0 = TURN_POINTS[segment];
        let p1 = TURN_POINTS[segment + 1];
        let t = (abs_lat - p0) / (p1 - p0);
        // Smoothstep for smooth blending: s(t) = 3t² - 2t³
        let s = 3.0 * t * t - 2.0 * t * t * t;

        let zonal = ZONAL_SIGNS[segment] + (ZONAL_SIGNS[segment + 1] - ZONAL_SIGNS[segment]) * s;
        let meridional = MERIDIONAL_SIGNS[segment]
            + (MERIDIONAL_SIGNS[segment + 1] - MERIDIONAL_SIGNS[segment]) * s;

        let mut u = zonal * ZONAL_SPEED;
        let mut v = meridional * MERIDIONAL_SPEED * (abs_lat / EQUATOR_BLEND_DEG).min(1.0);
        // Towards the equator means northward in the southern hemisphere
        if lat < 0.0 {
            v = -v;
        }

        let dir = sphere_point(lat, lng).as_dvec3() * NOISE_FREQUENCY;
        let n1 = self.perlin.get([dir.x, dir.y, dir.z]) as f32;
        let n2 = self
            .perlin
            .get([dir.x + NOISE_OFFSET, dir.y + NOISE_OFFSET, dir.z + NOISE_OFFSET])
            as f32;

        u += n1 * 6.0 + n2 * 3.0;
        v += n2 * 6.0 + n1 * 3.0;
        WindVector::new(u, v)
    }

    /// Sample the generator onto a regular grid
    pub fn build(&self, bounds: GeoBounds, grid_size: usize) -> Result<VectorField, FieldError> {
        let count = super::validate(grid_size, &bounds)?;
        let mut cells = Vec::with_capacity(count);
        for y in 0..=grid_size {
            for x in 0..=grid_size {
                let (lat, lng) = node_position(&bounds, grid_size, x, y);
                cells.push(self.wind_at(lat, lng));
            }
        }
        VectorField::new(grid_size, bounds, cells, FieldOrigin::Procedural)
    }
}

/// Unit vector for a geographic coordinate, Y up through the north pole
fn sphere_point(lat: f32, lng: f32) -> Vec3 {
    let lat = lat.to_radians();
    let lng = lng.to_radians();
    Vec3::new(lat.cos() * lng.cos(), lat.sin(), -lat.cos() * lng.sin())
}
