use super::{DataSource, DataSourceError};
use crate::geo::GeoBounds;
use crate::sample::{GridPayload, WindSample};

/// In-memory data source, whatever is not set reports as unavailable
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub grid: Option<GridPayload>,
    pub samples: Option<Vec<WindSample>>,
}

impl StaticSource {
    pub fn with_grid(grid: GridPayload) -> Self {
        Self {
            grid: Some(grid),
            samples: None,
        }
    }

    pub fn with_samples(samples: Vec<WindSample>) -> Self {
        Self {
            grid: None,
            samples: Some(samples),
        }
    }
}

impl DataSource for StaticSource {
    fn fetch_vector_field(&self) -> Result<GridPayload, DataSourceError> {
        self.grid
            .clone()
            .ok_or_else(|| DataSourceError::Unavailable("no grid loaded".to_string()))
    }

    fn fetch_samples(&self, region: &GeoBounds) -> Result<Vec<WindSample>, DataSourceError> {
        let samples = self
            .samples
            .as_ref()
            .ok_or_else(|| DataSourceError::Unavailable("no samples loaded".to_string()))?;
        Ok(samples
            .iter()
            .filter(|s| region.contains(s.lat, s.lng))
            .cloned()
            .collect())
    }
}
