// Where wind fields come from

pub mod file;
pub mod memory;

pub use file::JsonFileSource;
pub use memory::StaticSource;

use crate::config::{FieldConfig, SourceConfig, SourceKind};
use crate::field::{FieldBuilder, FieldError, ProceduralField, VectorField};
use crate::geo::GeoBounds;
use crate::sample::{GridPayload, WindSample};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The source answered but has nothing for us (unreachable, `success: false`, ...)
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Raw weather data provider
///
/// `Err` means the fetch failed and the caller should fall back; `Ok` with no
/// samples is a legitimate empty answer.
pub trait DataSource: Send + Sync {
    fn fetch_vector_field(&self) -> Result<GridPayload, DataSourceError>;

    fn fetch_samples(&self, region: &GeoBounds) -> Result<Vec<WindSample>, DataSourceError>;
}

#[derive(Debug, Error)]
pub enum FieldSourceError {
    #[error(transparent)]
    Source(#[from] DataSourceError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Anything that can produce a complete vector field
pub trait FieldSource: Send + Sync {
    fn produce(&self) -> Result<VectorField, FieldSourceError>;

    /// Short name for logs and the UI
    fn label(&self) -> &'static str;
}

/// Dense grid straight from the data source
pub struct GridFieldSource<D> {
    source: D,
    builder: FieldBuilder,
}

impl<D: DataSource> GridFieldSource<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            builder: FieldBuilder::default(),
        }
    }
}

impl<D: DataSource> FieldSource for GridFieldSource<D> {
    fn produce(&self) -> Result<VectorField, FieldSourceError> {
        let payload = self.source.fetch_vector_field()?;
        Ok(self.builder.from_grid(&payload)?)
    }

    fn label(&self) -> &'static str {
        "grid"
    }
}

/// Sparse samples interpolated onto a grid
pub struct SampleFieldSource<D> {
    source: D,
    region: GeoBounds,
    grid_size: usize,
    builder: FieldBuilder,
    smoothing_radius: usize,
}

impl<D: DataSource> SampleFieldSource<D> {
    pub fn new(source: D, region: GeoBounds, grid_size: usize) -> Self {
        Self {
            source,
            region,
            grid_size,
            builder: FieldBuilder::default(),
            smoothing_radius: 0,
        }
    }

    pub fn with_builder(mut self, builder: FieldBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_smoothing(mut self, radius: usize) -> Self {
        self.smoothing_radius = radius;
        self
    }
}

impl<D: DataSource> FieldSource for SampleFieldSource<D> {
    fn produce(&self) -> Result<VectorField, FieldSourceError> {
        let samples = self.source.fetch_samples(&self.region)?;
        let field = self
            .builder
            .build_from_samples(&samples, self.region, self.grid_size)?;
        if self.smoothing_radius > 0 {
            return Ok(field.smoothed(self.smoothing_radius));
        }
        Ok(field)
    }

    fn label(&self) -> &'static str {
        "samples"
    }
}

/// Synthetic global field, never needs external data
#[derive(Debug, Clone)]
pub struct ProceduralFieldSource {
    generator: ProceduralField,
    grid_size: usize,
}

impl ProceduralFieldSource {
    /// Global procedural fields span the Mercator-safe latitudes and the full longitude circle
    pub const BOUNDS: GeoBounds = GeoBounds::GLOBAL;

    pub fn new(seed: u32, grid_size: usize) -> Self {
        Self {
            generator: ProceduralField::new(seed),
            grid_size: grid_size.max(1),
        }
    }

    pub fn build(&self) -> Result<VectorField, FieldError> {
        self.generator.build(Self::BOUNDS, self.grid_size)
    }
}

impl Default for ProceduralFieldSource {
    fn default() -> Self {
        let config = FieldConfig::default();
        Self::new(config.procedural_seed, config.procedural_grid_size)
    }
}

impl FieldSource for ProceduralFieldSource {
    fn produce(&self) -> Result<VectorField, FieldSourceError> {
        Ok(self.build()?)
    }

    fn label(&self) -> &'static str {
        "procedural"
    }
}

/// Produce a field from `source`, falling back to the procedural generator on any failure
pub fn produce_or_fallback(
    source: &dyn FieldSource,
    fallback: &ProceduralFieldSource,
) -> Result<VectorField, FieldError> {
    match source.produce() {
        Ok(field) => Ok(field),
        Err(err) => {
            log::warn!(
                "Wind source '{}' failed ({err}), using procedural field",
                source.label()
            );
            fallback.build()
        }
    }
}

/// Build the configured field source
pub fn field_source_from_config(
    source: &SourceConfig,
    field: &FieldConfig,
) -> Arc<dyn FieldSource> {
    match source.kind {
        SourceKind::Grid => Arc::new(GridFieldSource::new(JsonFileSource::new(&source.path))),
        SourceKind::Samples => Arc::new(
            SampleFieldSource::new(
                JsonFileSource::new(&source.path),
                source.region,
                field.grid_size,
            )
            .with_builder(FieldBuilder::new(field.idw_epsilon))
            .with_smoothing(field.smoothing_radius),
        ),
        SourceKind::Procedural => Arc::new(ProceduralFieldSource::new(
            field.procedural_seed,
            field.procedural_grid_size,
        )),
    }
}
