// Regular lat/lng wind grid with bilinear sampling

pub mod builder;
pub mod procedural;

pub use builder::FieldBuilder;
pub use procedural::ProceduralField;

use crate::geo::GeoBounds;
use crate::wind::WindVector;
use thiserror::Error;

/// Keeps fractional grid coordinates strictly inside the last cell
const GRID_EPSILON: f32 = 1e-3;

/// Largest accepted grid size; payloads claiming more are rejected before allocating
pub const MAX_GRID_SIZE: usize = 1024;

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("grid size must be at least 1")]
    InvalidGridSize,
    #[error("grid size {0} exceeds the limit of {max}", max = MAX_GRID_SIZE)]
    GridTooLarge(usize),
    #[error("invalid field bounds {0:?}")]
    InvalidBounds(GeoBounds),
    #[error("expected {expected} grid cells, got {actual}")]
    CellCount { expected: usize, actual: usize },
}

/// Where the current field came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrigin {
    Grid,
    Samples,
    Procedural,
    Empty,
}

impl FieldOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            FieldOrigin::Grid => "grid",
            FieldOrigin::Samples => "samples",
            FieldOrigin::Procedural => "procedural",
            FieldOrigin::Empty => "empty",
        }
    }
}

/// Immutable wind grid of `(grid_size + 1)²` nodes
///
/// Nodes are stored row-major: increasing latitude, then increasing longitude.
/// A field is never edited after construction; refreshes build a new one.
#[derive(Debug, Clone)]
pub struct VectorField {
    cells: Vec<WindVector>,
    grid_size: usize,
    bounds: GeoBounds,
    origin: FieldOrigin,
}

impl VectorField {
    /// Build a field from row-major nodes. Non-finite nodes become calm.
    pub fn new(
        grid_size: usize,
        bounds: GeoBounds,
        cells: Vec<WindVector>,
        origin: FieldOrigin,
    ) -> Result<Self, FieldError> {
        let expected = validate(grid_size, &bounds)?;
        if cells.len() != expected {
            return Err(FieldError::CellCount {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            cells: cells.into_iter().map(WindVector::sanitized).collect(),
            grid_size,
            bounds,
            origin,
        })
    }

    /// Calm field; particles sampled from it stay put
    pub fn zero(bounds: GeoBounds, grid_size: usize) -> Result<Self, FieldError> {
        let count = validate(grid_size, &bounds)?;
        Ok(Self {
            cells: vec![WindVector::ZERO; count],
            grid_size,
            bounds,
            origin: FieldOrigin::Empty,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn origin(&self) -> FieldOrigin {
        self.origin
    }

    pub fn cells(&self) -> &[WindVector] {
        &self.cells
    }

    /// Node at column `x` (longitude) and row `y` (latitude)
    pub fn node(&self, x: usize, y: usize) -> WindVector {
        let n = self.grid_size;
        self.cells[y.min(n) * (n + 1) + x.min(n)]
    }

    /// Geographic position (lat, lng) of a node
    pub fn node_position(&self, x: usize, y: usize) -> (f32, f32) {
        node_position(&self.bounds, self.grid_size, x, y)
    }

    /// Interpolated wind at any coordinate
    ///
    /// Latitude saturates at the field bounds, longitude wraps modulo 360.
    pub fn sample_at(&self, lat: f32, lng: f32) -> WindVector {
        if !lat.is_finite() || !lng.is_finite() {
            return WindVector::ZERO;
        }

        let b = &self.bounds;
        let lat = lat.clamp(b.lat_min, b.lat_max);
        let lng = self.wrap_into_range(lng);

        // Fractional grid coordinates in [0, grid_size)
        let n = self.grid_size as f32;
        let x = ((lng - b.lng_min) / b.lng_span() * n).clamp(0.0, n - GRID_EPSILON);
        let y = ((lat - b.lat_min) / b.lat_span() * n).clamp(0.0, n - GRID_EPSILON);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.grid_size);
        let y1 = (y0 + 1).min(self.grid_size);

        let dx = x - x0 as f32;
        let dy = y - y0 as f32;

        let v00 = self.node(x0, y0);
        let v10 = self.node(x1, y0);
        let v01 = self.node(x0, y1);
        let v11 = self.node(x1, y1);

        let w00 = (1.0 - dx) * (1.0 - dy);
        let w10 = dx * (1.0 - dy);
        let w01 = (1.0 - dx) * dy;
        let w11 = dx * dy;

        WindVector::new(
            v00.u * w00 + v10.u * w10 + v01.u * w01 + v11.u * w11,
            v00.v * w00 + v10.v * w10 + v01.v * w01 + v11.v * w11,
        )
    }

    pub fn speed_at(&self, lat: f32, lng: f32) -> f32 {
        self.sample_at(lat, lng).speed()
    }

    pub fn max_speed(&self) -> f32 {
        self.cells.iter().map(WindVector::speed).fold(0.0, f32::max)
    }

    /// Box-filtered copy of the field; `radius` is in grid cells
    ///
    /// Cyclic fields wrap across the antimeridian, regional ones clamp at their edges.
    pub fn smoothed(&self, radius: usize) -> VectorField {
        if radius == 0 {
            return self.clone();
        }

        let n = self.grid_size;
        let r = radius as isize;
        let cyclic = self.bounds.is_cyclic();
        let mut cells = Vec::with_capacity(self.cells.len());

        for y in 0..=n {
            for x in 0..=n {
                let mut sum_u = 0.0;
                let mut sum_v = 0.0;
                let mut count = 0.0;
                for dy in -r..=r {
                    let ny = (y as isize + dy).clamp(0, n as isize) as usize;
                    for dx in -r..=r {
                        let nx = if cyclic {
                            // Column n duplicates column 0 on a global grid
                            (x as isize + dx).rem_euclid(n as isize) as usize
                        } else {
                            (x as isize + dx).clamp(0, n as isize) as usize
                        };
                        let cell = self.node(nx, ny);
                        sum_u += cell.u;
                        sum_v += cell.v;
                        count += 1.0;
                    }
                }
                cells.push(WindVector::new(sum_u / count, sum_v / count));
            }
        }

        VectorField {
            cells,
            grid_size: n,
            bounds: self.bounds,
            origin: self.origin,
        }
    }

    /// Map a longitude onto the field's range
    ///
    /// Regional fields narrower than 360° snap a longitude falling in their gap to the
    /// cyclically nearer edge.
    fn wrap_into_range(&self, lng: f32) -> f32 {
        let b = &self.bounds;
        let span = b.lng_span();
        let offset = (lng - b.lng_min).rem_euclid(360.0);
        if offset <= span {
            return b.lng_min + offset;
        }
        let past_max = offset - span;
        let before_min = 360.0 - offset;
        if past_max <= before_min { b.lng_max } else { b.lng_min }
    }
}

pub(crate) fn node_count(grid_size: usize) -> Result<usize, FieldError> {
    grid_size
        .checked_add(1)
        .and_then(|side| side.checked_mul(side))
        .ok_or(FieldError::GridTooLarge(grid_size))
}

pub(crate) fn node_position(bounds: &GeoBounds, grid_size: usize, x: usize, y: usize) -> (f32, f32) {
    let n = grid_size as f32;
    let lat = bounds.lat_min + bounds.lat_span() * y as f32 / n;
    let lng = bounds.lng_min + bounds.lng_span() * x as f32 / n;
    (lat, lng)
}

/// Check a grid size and bounds, returning the node count they imply
pub(crate) fn validate(grid_size: usize, bounds: &GeoBounds) -> Result<usize, FieldError> {
    if grid_size == 0 {
        return Err(FieldError::InvalidGridSize);
    }
    if grid_size > MAX_GRID_SIZE {
        return Err(FieldError::GridTooLarge(grid_size));
    }
    if !bounds.is_valid() {
        return Err(FieldError::InvalidBounds(*bounds));
    }
    node_count(grid_size)
}
