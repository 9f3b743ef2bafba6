// Field construction from sparse samples or a prebuilt grid

use super::{FieldError, FieldOrigin, VectorField, node_position, validate};
use crate::geo::{GeoBounds, longitude_delta};
use crate::sample::{GridPayload, WindSample};
use crate::wind::WindVector;

/// Default distance floor in degrees, keeps weights finite on coincident nodes
pub const IDW_EPSILON: f32 = 1e-4;

/// Builds vector fields from data source output
#[derive(Debug, Clone, Copy)]
pub struct FieldBuilder {
    epsilon: f32,
}

impl Default for FieldBuilder {
    fn default() -> Self {
        Self::new(IDW_EPSILON)
    }
}

impl FieldBuilder {
    pub fn new(epsilon: f32) -> Self {
        let epsilon = if epsilon.is_finite() && epsilon > 0.0 {
            epsilon
        } else {
            IDW_EPSILON
        };
        Self { epsilon }
    }

    /// Interpolate a regular grid from irregular samples with inverse-distance weighting
    ///
    /// Every node is weighted against every sample (`w = 1 / d²`), so the cost is
    /// `O(nodes × samples)`. With grids of at most ~60×60 and a few thousand samples
    /// this stays cheap; a k-d tree over the samples is the way to go if sample
    /// counts grow much beyond that.
    ///
    /// Distances are planar in degrees, with longitude differences taken the short
    /// way around the globe. Samples without usable wind are ignored; no samples at
    /// all give a calm field.
    pub fn build_from_samples(
        &self,
        samples: &[WindSample],
        bounds: GeoBounds,
        grid_size: usize,
    ) -> Result<VectorField, FieldError> {
        let count = validate(grid_size, &bounds)?;

        let points: Vec<(f32, f32, WindVector)> = samples
            .iter()
            .filter_map(|s| s.wind().map(|w| (s.lat, s.lng, w)))
            .collect();

        if points.is_empty() {
            log::debug!("No usable wind samples, building a calm {grid_size}x{grid_size} field");
            return VectorField::zero(bounds, grid_size);
        }

        let mut cells = Vec::with_capacity(count);
        for y in 0..=grid_size {
            for x in 0..=grid_size {
                let (lat, lng) = node_position(&bounds, grid_size, x, y);
                cells.push(self.interpolate(&points, lat, lng));
            }
        }

        log::debug!(
            "Interpolated {grid_size}x{grid_size} field from {} samples",
            points.len()
        );
        VectorField::new(grid_size, bounds, cells, FieldOrigin::Samples)
    }

    /// Wrap a dense grid without interpolation, keeping the supplied bounds and size
    ///
    /// Short rows and `null` cells are filled with calm wind. Grid sizes above
    /// [`MAX_GRID_SIZE`](super::MAX_GRID_SIZE) are rejected before anything is allocated.
    pub fn from_grid(&self, payload: &GridPayload) -> Result<VectorField, FieldError> {
        let bounds = GeoBounds::new(
            payload.lat_min,
            payload.lat_max,
            payload.lng_min,
            payload.lng_max,
        );
        let n = payload.grid_size;
        let count = validate(n, &bounds)?;

        let mut missing = 0usize;
        let mut cells = Vec::with_capacity(count);
        for y in 0..=n {
            let row = payload.grid.get(y);
            for x in 0..=n {
                match row.and_then(|r| r.get(x)).copied().flatten() {
                    Some(cell) if cell.is_finite() => cells.push(cell),
                    _ => {
                        missing += 1;
                        cells.push(WindVector::ZERO);
                    }
                }
            }
        }

        if missing > 0 {
            log::debug!("Grid payload had {missing} missing cells, treated as calm");
        }
        VectorField::new(n, bounds, cells, FieldOrigin::Grid)
    }

    fn interpolate(&self, points: &[(f32, f32, WindVector)], lat: f32, lng: f32) -> WindVector {
        let mut sum_u = 0.0;
        let mut sum_v = 0.0;
        let mut sum_w = 0.0;

        for &(p_lat, p_lng, wind) in points {
            let d_lat = lat - p_lat;
            let d_lng = longitude_delta(lng, p_lng);
            let d = d_lat.hypot(d_lng).max(self.epsilon);
            let w = 1.0 / (d * d);
            sum_u += wind.u * w;
            sum_v += wind.v * w;
            sum_w += w;
        }

        WindVector::new(sum_u / sum_w, sum_v / sum_w)
    }
}
