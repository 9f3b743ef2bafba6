pub mod config;
pub mod engine;
pub mod field;
pub mod geo;
pub mod particles;
pub mod render;
pub mod sample;
pub mod source;
pub mod subscription;
pub mod wind;

pub use config::{get_config, reload_config};
pub use engine::{EngineState, RefreshJob, RefreshOutcome, WindEngine};
pub use field::{FieldBuilder, FieldError, FieldOrigin, VectorField};
pub use geo::{GeoBounds, ViewportBounds};
pub use render::{FrameOutput, HostMap, TrailSegment, ViewportNotifier, ViewportSubscription};
pub use wind::WindVector;
