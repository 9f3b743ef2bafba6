use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Wind vector in local east/north components
///
/// Convention: u = east/west, v = north/south, both in m/s.
/// East = (1, 0), North = (0, 1). Positive v moves a particle towards higher latitude.
///
/// Speed/direction pairs use the meteorological convention: the direction is where the
/// wind blows FROM, in degrees clockwise from north. A 90° wind is an easterly and
/// pushes particles west.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindVector {
    pub u: f32,
    pub v: f32,
}

impl WindVector {
    pub const ZERO: WindVector = WindVector { u: 0.0, v: 0.0 };

    pub const fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }

    /// Build components from a speed and a meteorological direction in degrees
    pub fn from_speed_direction(speed: f32, direction_deg: f32) -> Self {
        let theta = direction_deg.to_radians();
        Self {
            u: -speed * theta.sin(),
            v: -speed * theta.cos(),
        }
    }

    pub fn speed(&self) -> f32 {
        self.u.hypot(self.v)
    }

    /// Meteorological direction in [0, 360): where the wind is coming from
    pub fn direction(&self) -> f32 {
        let deg = (-self.u).atan2(-self.v).to_degrees();
        deg.rem_euclid(360.0)
    }

    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    /// Replace non-finite components with a calm cell
    pub fn sanitized(self) -> Self {
        if self.is_finite() { self } else { Self::ZERO }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.u, self.v)
    }
}

impl From<Vec2> for WindVector {
    fn from(value: Vec2) -> Self {
        Self::new(value.x, value.y)
    }
}
