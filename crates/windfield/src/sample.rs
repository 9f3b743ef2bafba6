use crate::wind::WindVector;
use serde::{Deserialize, Serialize};

/// A single weather observation as delivered by the data source
///
/// Wind comes either as `{u, v}` components or as `windSpeed` plus a meteorological
/// `windDirection`. Samples are only read while a field is built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindSample {
    pub lat: f32,
    pub lng: f32,
    /// Scalar layer value (temperature, rain, ...), carried but not used for wind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f32>,
}

/// Dense regular grid as delivered by the data source
///
/// `grid[y][x]` follows the field layout: rows by increasing latitude, columns by
/// increasing longitude. Missing cells (`null`) are treated as calm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPayload {
    pub grid: Vec<Vec<Option<WindVector>>>,
    pub grid_size: usize,
    pub lat_min: f32,
    pub lat_max: f32,
    pub lng_min: f32,
    pub lng_max: f32,
}

impl WindSample {
    pub fn from_components(lat: f32, lng: f32, u: f32, v: f32) -> Self {
        Self {
            lat,
            lng,
            u: Some(u),
            v: Some(v),
            ..Default::default()
        }
    }

    pub fn from_speed_direction(lat: f32, lng: f32, speed: f32, direction: f32) -> Self {
        Self {
            lat,
            lng,
            wind_speed: Some(speed),
            wind_direction: Some(direction),
            ..Default::default()
        }
    }

    /// Wind carried by this sample, `None` when it has no usable wind or position
    pub fn wind(&self) -> Option<WindVector> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return None;
        }
        let wind = match (self.u, self.v, self.wind_speed) {
            (Some(u), Some(v), _) => WindVector::new(u, v),
            (_, _, Some(speed)) => {
                WindVector::from_speed_direction(speed, self.wind_direction.unwrap_or(0.0))
            }
            _ => return None,
        };
        wind.is_finite().then_some(wind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_components_take_precedence() {
        let mut sample = WindSample::from_components(0.0, 0.0, 3.0, 4.0);
        sample.wind_speed = Some(100.0);
        assert_eq!(sample.wind(), Some(WindVector::new(3.0, 4.0)));
    }

    #[test]
    fn test_speed_direction_is_converted() {
        let sample = WindSample::from_speed_direction(10.0, 20.0, 5.0, 270.0);
        let wind = sample.wind().unwrap();
        assert_relative_eq!(wind.u, 5.0, epsilon = 1e-4);
        assert_relative_eq!(wind.v, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sample_without_wind_is_skipped() {
        let sample = WindSample {
            lat: 1.0,
            lng: 2.0,
            value: Some(21.5),
            ..Default::default()
        };
        assert_eq!(sample.wind(), None);
    }

    #[test]
    fn test_grid_payload_accepts_null_cells() {
        let json = r#"{
            "grid": [[{"u": 1.0, "v": 0.0}, null], [{"u": 0.0, "v": 2.0}, {"u": 1.0, "v": 1.0}]],
            "gridSize": 1, "latMin": -85.0, "latMax": 85.0, "lngMin": -180.0, "lngMax": 180.0
        }"#;
        let payload: GridPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.grid_size, 1);
        assert_eq!(payload.grid[0][1], None);
    }

    #[test]
    fn test_parses_api_field_names() {
        let json = r#"{"lat": 48.1, "lng": 11.5, "value": 12.0, "windSpeed": 8.0, "windDirection": 180.0}"#;
        let sample: WindSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.wind_speed, Some(8.0));
        let wind = sample.wind().unwrap();
        assert_relative_eq!(wind.v, 8.0, epsilon = 1e-4);
    }
}
