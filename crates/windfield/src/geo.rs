// Geographic bounds and coordinate helpers

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Latitude limit used for particles (Web-Mercator safe)
pub const MAX_MERCATOR_LATITUDE: f32 = 85.0;

/// Wrap a longitude into [-180, 180]
pub fn wrap_longitude(lng: f32) -> f32 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Shortest angular distance between two longitudes, in [0, 180]
pub fn longitude_delta(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 { 360.0 - d } else { d }
}

/// Rectangular lat/lng region covered by a vector field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub lat_min: f32,
    pub lat_max: f32,
    pub lng_min: f32,
    pub lng_max: f32,
}

impl GeoBounds {
    /// Whole globe, clipped to the Mercator-safe latitude band
    pub const GLOBAL: GeoBounds = GeoBounds {
        lat_min: -MAX_MERCATOR_LATITUDE,
        lat_max: MAX_MERCATOR_LATITUDE,
        lng_min: -180.0,
        lng_max: 180.0,
    };

    pub const fn new(lat_min: f32, lat_max: f32, lng_min: f32, lng_max: f32) -> Self {
        Self {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        }
    }

    pub fn lat_span(&self) -> f32 {
        self.lat_max - self.lat_min
    }

    pub fn lng_span(&self) -> f32 {
        self.lng_max - self.lng_min
    }

    /// Bounds are usable for a grid: finite, non-empty, at most one turn of longitude
    pub fn is_valid(&self) -> bool {
        [self.lat_min, self.lat_max, self.lng_min, self.lng_max]
            .iter()
            .all(|v| v.is_finite())
            && self.lat_min < self.lat_max
            && self.lng_min < self.lng_max
            && self.lng_span() <= 360.0
    }

    /// Field wraps around the whole globe in longitude
    pub fn is_cyclic(&self) -> bool {
        self.lng_span() >= 360.0
    }

    /// Antimeridian-aware containment test
    pub fn contains(&self, lat: f32, lng: f32) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        self.is_cyclic() || (lng - self.lng_min).rem_euclid(360.0) <= self.lng_span()
    }
}

/// Visible map area as reported by the host map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub south: f32,
    pub west: f32,
    pub north: f32,
    pub east: f32,
}

impl ViewportBounds {
    pub const fn new(south: f32, west: f32, north: f32, east: f32) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Whole Mercator-safe world
    pub const fn global() -> Self {
        Self::new(-MAX_MERCATOR_LATITUDE, -180.0, MAX_MERCATOR_LATITUDE, 180.0)
    }

    pub fn lat_span(&self) -> f32 {
        self.north - self.south
    }

    /// Longitude span; an `east` smaller than `west` means the view crosses the antimeridian
    pub fn lng_span(&self) -> f32 {
        if self.east >= self.west {
            self.east - self.west
        } else {
            self.east + 360.0 - self.west
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.north > self.south
            && self.lng_span() > 0.0
    }

    /// Grow the viewport outward by `fraction` of its span on every side
    pub fn expanded(&self, fraction: f32) -> Self {
        let lat_margin = self.lat_span() * fraction;
        let lng_margin = self.lng_span() * fraction;
        Self {
            south: self.south - lat_margin,
            west: self.west - lng_margin,
            north: self.north + lat_margin,
            east: self.west + self.lng_span() + lng_margin,
        }
    }

    /// Containment test that handles views crossing the antimeridian
    pub fn contains(&self, lat: f32, lng: f32) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        let span = self.lng_span();
        span >= 360.0 || (lng - self.west).rem_euclid(360.0) <= span
    }

    /// Uniform random position inside the viewport, latitude kept within `max_latitude`
    pub fn random_point(&self, rng: &mut impl Rng, max_latitude: f32) -> (f32, f32) {
        let south = self.south.max(-max_latitude);
        let north = self.north.min(max_latitude);
        let lat = if north > south {
            south + rng.random::<f32>() * (north - south)
        } else {
            south.clamp(-max_latitude, max_latitude)
        };
        let span = self.lng_span().min(360.0);
        let lng = wrap_longitude(self.west + rng.random::<f32>() * span);
        (lat, lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(190.0, -170.0)]
    #[case(-190.0, 170.0)]
    #[case(540.0, -180.0)]
    #[case(179.5, 179.5)]
    fn test_wrap_longitude(#[case] input: f32, #[case] expected: f32) {
        assert_relative_eq!(wrap_longitude(input), expected, epsilon = 1e-4);
    }

    #[rstest]
    #[case(179.0, -179.0, 2.0)]
    #[case(10.0, -10.0, 20.0)]
    #[case(0.0, 180.0, 180.0)]
    fn test_longitude_delta(#[case] a: f32, #[case] b: f32, #[case] expected: f32) {
        assert_relative_eq!(longitude_delta(a, b), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_viewport_crossing_antimeridian() {
        let view = ViewportBounds::new(-10.0, 170.0, 10.0, -170.0);
        assert_relative_eq!(view.lng_span(), 20.0);
        assert!(view.contains(0.0, 179.0));
        assert!(view.contains(0.0, -175.0));
        assert!(!view.contains(0.0, 0.0));
    }

    #[test]
    fn test_expanded_viewport_keeps_span_relative_to_west() {
        let view = ViewportBounds::new(-10.0, -20.0, 10.0, 20.0).expanded(0.5);
        assert_relative_eq!(view.south, -20.0);
        assert_relative_eq!(view.north, 20.0);
        assert_relative_eq!(view.west, -40.0);
        assert_relative_eq!(view.east, 40.0);
    }

    #[test]
    fn test_random_point_stays_inside_viewport() {
        let mut rng = StdRng::seed_from_u64(7);
        let view = ViewportBounds::new(40.0, 170.0, 60.0, -160.0);
        for _ in 0..500 {
            let (lat, lng) = view.random_point(&mut rng, MAX_MERCATOR_LATITUDE);
            assert!(view.contains(lat, lng), "({lat}, {lng}) escaped the viewport");
        }
    }

    #[test]
    fn test_random_point_respects_latitude_limit() {
        let mut rng = StdRng::seed_from_u64(3);
        let view = ViewportBounds::new(-90.0, -180.0, 90.0, 180.0);
        for _ in 0..500 {
            let (lat, _) = view.random_point(&mut rng, 85.0);
            assert!(lat.abs() <= 85.0);
        }
    }

    #[test]
    fn test_geo_bounds_validity() {
        assert!(GeoBounds::GLOBAL.is_valid());
        assert!(GeoBounds::GLOBAL.is_cyclic());
        assert!(!GeoBounds::new(10.0, -10.0, 0.0, 5.0).is_valid());
        assert!(!GeoBounds::new(-10.0, 10.0, -200.0, 200.0).is_valid());
    }
}
