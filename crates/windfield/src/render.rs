// Per-frame coupling between the particle system and the host map

use crate::config::RenderConfig;
use crate::field::VectorField;
use crate::geo::ViewportBounds;
use crate::particles::ParticleSystem;
use glam::Vec2;
use std::collections::VecDeque;

pub use crate::subscription::{ViewportNotifier, ViewportSubscription};

/// The map the particles are drawn over
///
/// Screen coordinates are pixels with the origin in the top-left corner.
pub trait HostMap {
    /// Visible area, `None` while the map is not ready
    fn viewport_bounds(&self) -> Option<ViewportBounds>;

    fn zoom(&self) -> f32;

    fn project(&self, lat: f32, lng: f32) -> Vec2;

    fn screen_size(&self) -> Vec2;

    fn notifier(&self) -> &ViewportNotifier;
}

/// One line from a particle's previous to its current screen position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailSegment {
    pub from: Vec2,
    pub to: Vec2,
    pub speed: f32,
    pub opacity: f32,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub lat: f32,
    pub lng: f32,
    pub screen: Vec2,
    pub speed: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub particles: Vec<ParticleView>,
    pub segments: Vec<TrailSegment>,
    pub respawned: usize,
}

impl FrameOutput {
    fn clear(&mut self) {
        self.particles.clear();
        self.segments.clear();
        self.respawned = 0;
    }
}

/// Brightest a freshly drawn segment can be
pub const MAX_TRAIL_OPACITY: f32 = 0.7 * 0.7;

/// Upper bound on how many frames a segment is kept when fading is very slow
const MAX_RETAINED_FRAMES: usize = 240;

/// Faster particles are brighter, every particle fades out towards the end of its life
pub fn trail_opacity(speed: f32, life_fraction: f32) -> f32 {
    let base = (0.25 + speed.max(0.0) * 0.02).min(0.7);
    base * life_fraction.clamp(0.0, 1.0) * 0.7
}

/// Segments from recent frames, fading a little every frame
///
/// Drawing the buffer each frame gives the same look as painting over the
/// previous frame with a translucent clear.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    segments: VecDeque<TrailSegment>,
    capacity: usize,
    min_capacity: usize,
    fade: f32,
    min_alpha: f32,
}

impl TrailBuffer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            segments: VecDeque::new(),
            capacity: config.max_trail_segments,
            min_capacity: config.max_trail_segments,
            fade: config.trail_fade.clamp(0.0, 1.0),
            min_alpha: config.min_trail_alpha.max(0.0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames until the brightest segment fades below the drop threshold
    pub fn retained_frames(&self) -> usize {
        let keep = 1.0 - self.fade;
        if keep <= 0.0 || self.min_alpha >= MAX_TRAIL_OPACITY {
            return 1;
        }
        if keep >= 1.0 || self.min_alpha <= 0.0 {
            return MAX_RETAINED_FRAMES;
        }
        let fades = (self.min_alpha / MAX_TRAIL_OPACITY).ln() / keep.ln();
        (fades.floor() as usize + 1).clamp(1, MAX_RETAINED_FRAMES)
    }

    /// Grow the capacity so `particle_count` particles keep their whole trail
    ///
    /// The configured segment limit stays the floor.
    pub fn fit_particles(&mut self, particle_count: usize) {
        self.capacity = particle_count
            .saturating_mul(self.retained_frames())
            .max(self.min_capacity);
        while self.segments.len() > self.capacity {
            self.segments.pop_front();
        }
    }

    /// Age the retained segments by one frame and drop the invisible ones
    pub fn fade(&mut self) {
        let keep = 1.0 - self.fade;
        let min_alpha = self.min_alpha;
        self.segments.retain_mut(|segment| {
            segment.opacity *= keep;
            segment.opacity >= min_alpha
        });
    }

    pub fn extend(&mut self, segments: &[TrailSegment]) {
        self.segments.extend(segments.iter().copied());
        while self.segments.len() > self.capacity {
            self.segments.pop_front();
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &TrailSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

/// Steps the particles against the host map and turns them into drawable segments
pub struct RenderLoop {
    config: RenderConfig,
    output: FrameOutput,
}

impl RenderLoop {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            output: FrameOutput::default(),
        }
    }

    pub fn output(&self) -> &FrameOutput {
        &self.output
    }

    /// Run one animation frame, `None` when the host has no usable viewport
    pub fn frame(
        &mut self,
        particles: &mut ParticleSystem,
        field: Option<&VectorField>,
        host: &dyn HostMap,
        dt: f32,
    ) -> Option<&FrameOutput> {
        let viewport = host.viewport_bounds().filter(ViewportBounds::is_valid)?;
        let respawned = particles.step(field, &viewport, host.zoom(), dt);

        let screen = host.screen_size();
        let margin = self.config.offscreen_margin_px;
        let on_screen = |p: Vec2| {
            p.is_finite()
                && p.x >= -margin
                && p.y >= -margin
                && p.x <= screen.x + margin
                && p.y <= screen.y + margin
        };

        self.output.clear();
        self.output.respawned = respawned;
        for particle in particles.particles() {
            let to = host.project(particle.lat, particle.lng);
            self.output.particles.push(ParticleView {
                lat: particle.lat,
                lng: particle.lng,
                screen: to,
                speed: particle.speed,
            });

            if particle.respawned || !on_screen(to) {
                continue;
            }
            let from = host.project(particle.prev_lat, particle.prev_lng);
            // Long jumps are wraps around the antimeridian, not motion
            if !from.is_finite() || from.distance(to) >= self.config.max_segment_px {
                continue;
            }
            self.output.segments.push(TrailSegment {
                from,
                to,
                speed: particle.speed,
                opacity: trail_opacity(particle.speed, particle.life_fraction()),
                width: self.config.line_width,
            });
        }
        Some(&self.output)
    }
}
