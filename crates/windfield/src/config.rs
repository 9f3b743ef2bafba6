use crate::geo::GeoBounds;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};

pub const CONFIG_PATH: &str = "windflow_config.toml";

static CONFIG: OnceLock<Mutex<WindConfig>> = OnceLock::new();

/// Get a copy of the current configuration, loading from file if not already loaded
///
/// A missing or invalid file is not fatal: the defaults are used and a warning is logged.
pub fn get_config() -> WindConfig {
    let config_mutex = CONFIG.get_or_init(|| Mutex::new(load_or_default(CONFIG_PATH)));
    config_mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

pub fn reload_config() -> Result<(), Box<dyn std::error::Error>> {
    reload_config_from_file(CONFIG_PATH)
}

fn load_or_default(path: &str) -> WindConfig {
    match WindConfig::load_from_file(path) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Could not load {path} ({err}), using default wind configuration");
            WindConfig::default()
        }
    }
}

fn reload_config_from_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let new_config = WindConfig::load_from_file(path)?;
    let config_mutex = CONFIG.get_or_init(|| Mutex::new(new_config.clone()));
    *config_mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindConfig {
    pub field: FieldConfig,
    pub particles: ParticleConfig,
    pub render: RenderConfig,
    pub refresh: RefreshConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Cells per axis for fields interpolated from samples
    pub grid_size: usize,
    /// Distance floor (degrees) for inverse-distance weighting
    pub idw_epsilon: f32,
    /// Box smoothing radius in cells, 0 disables smoothing
    pub smoothing_radius: usize,
    pub procedural_grid_size: usize,
    pub procedural_seed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub count: usize,
    pub min_lifespan: u32,
    pub max_lifespan: u32,
    /// Initial ages are drawn from [0, initial_age_limit) so particles don't expire together
    pub initial_age_limit: u32,
    /// Spawn area around the viewport, as a fraction of its span per side
    pub spawn_margin: f32,
    /// Particles further than this fraction of the span outside the viewport are respawned
    pub cull_margin: f32,
    /// Degrees per frame per m/s at the reference zoom
    pub speed_base: f32,
    pub zoom_reference: f32,
    pub min_zoom_multiplier: f32,
    pub max_zoom_multiplier: f32,
    /// Upper bound on frame-time scaling after a stall
    pub max_frame_scale: f32,
    /// Share of particles moved into the viewport when it changes
    pub viewport_reseed_fraction: f32,
    pub max_latitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Longer screen-space jumps are not drawn (antimeridian wrap, respawn)
    pub max_segment_px: f32,
    pub offscreen_margin_px: f32,
    pub line_width: f32,
    /// Alpha removed from retained trails every frame
    pub trail_fade: f32,
    pub min_trail_alpha: f32,
    /// Smallest trail buffer; it grows to hold a full trail for every particle
    pub max_trail_segments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub interval_secs: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Dense grid document, wrapped without interpolation
    Grid,
    /// Sparse samples, interpolated with IDW
    Samples,
    Procedural,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: String,
    pub region: GeoBounds,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            grid_size: 40,
            idw_epsilon: 1e-4,
            smoothing_radius: 0,
            procedural_grid_size: 60,
            procedural_seed: 7,
        }
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 3000,
            min_lifespan: 60,
            max_lifespan: 110,
            initial_age_limit: 100,
            spawn_margin: 0.3,
            cull_margin: 0.3,
            speed_base: 0.015,
            zoom_reference: 5.0,
            min_zoom_multiplier: 0.5,
            max_zoom_multiplier: 2.0,
            max_frame_scale: 3.0,
            viewport_reseed_fraction: 0.3,
            max_latitude: crate::geo::MAX_MERCATOR_LATITUDE,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_segment_px: 50.0,
            offscreen_margin_px: 20.0,
            line_width: 1.2,
            trail_fade: 0.06,
            min_trail_alpha: 0.02,
            max_trail_segments: 60_000,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30.0 * 60.0,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Samples,
            path: "data/wind_samples.json".to_string(),
            region: GeoBounds::GLOBAL,
        }
    }
}

impl WindConfig {
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: WindConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ParticleConfig {
    /// Lifespan bounds in ascending order, whatever order the file used
    pub fn lifespan_range(&self) -> (u32, u32) {
        let low = self.min_lifespan.min(self.max_lifespan);
        let high = self.min_lifespan.max(self.max_lifespan);
        (low, high.max(1))
    }
}
