// Explicit engine instance tying the field, particles and host map together

use crate::config::WindConfig;
use crate::field::{FieldOrigin, VectorField};
use crate::geo::ViewportBounds;
use crate::particles::ParticleSystem;
use crate::render::{FrameOutput, HostMap, RenderLoop, TrailBuffer, ViewportSubscription};
use crate::source::{FieldSource, ProceduralFieldSource, field_source_from_config, produce_or_fallback};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Currently published field plus the run it belongs to
///
/// `generation` changes on every start and stop, so refreshes started by an
/// earlier run can tell that their result is no longer wanted.
#[derive(Debug, Default)]
struct FieldSlot {
    field: Option<Arc<VectorField>>,
    generation: u64,
}

type SharedSlot = Arc<RwLock<FieldSlot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    /// Started but hidden: no stepping, no drawing
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published(FieldOrigin),
    /// The engine was stopped, restarted or dropped while the field was built
    Discarded,
    Failed,
}

/// A field rebuild that can run on any thread
///
/// Holds only a weak reference to the engine's field slot.
pub struct RefreshJob {
    source: Arc<dyn FieldSource>,
    fallback: ProceduralFieldSource,
    slot: Weak<RwLock<FieldSlot>>,
    generation: u64,
    finished: Arc<AtomicBool>,
}

impl RefreshJob {
    pub fn run(self) -> RefreshOutcome {
        let field = match produce_or_fallback(self.source.as_ref(), &self.fallback) {
            Ok(field) => field,
            Err(err) => {
                log::error!("Could not build a wind field, keeping the previous one: {err}");
                return RefreshOutcome::Failed;
            }
        };

        let Some(slot) = self.slot.upgrade() else {
            log::debug!("Wind engine dropped during refresh, discarding field");
            return RefreshOutcome::Discarded;
        };
        let mut slot = write_slot(&slot);
        if slot.generation != self.generation {
            log::debug!("Wind engine restarted during refresh, discarding field");
            return RefreshOutcome::Discarded;
        }

        let origin = field.origin();
        log::info!(
            "Published {} wind field ({}x{}, max {:.1} m/s)",
            origin.label(),
            field.grid_size(),
            field.grid_size(),
            field.max_speed()
        );
        slot.field = Some(Arc::new(field));
        RefreshOutcome::Published(origin)
    }
}

impl Drop for RefreshJob {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// Wind animation engine driven by the host once per frame
pub struct WindEngine {
    config: WindConfig,
    source: Arc<dyn FieldSource>,
    fallback: ProceduralFieldSource,
    slot: SharedSlot,
    pending: Option<Arc<AtomicBool>>,
    since_refresh: f32,
    refresh_requested: bool,
    particles: ParticleSystem,
    render: RenderLoop,
    trails: TrailBuffer,
    subscription: Option<ViewportSubscription>,
    state: EngineState,
}

impl WindEngine {
    pub fn new(config: WindConfig, source: Arc<dyn FieldSource>) -> Self {
        let fallback = ProceduralFieldSource::new(
            config.field.procedural_seed,
            config.field.procedural_grid_size,
        );
        Self {
            particles: ParticleSystem::new(config.particles.clone()),
            render: RenderLoop::new(config.render.clone()),
            trails: TrailBuffer::new(&config.render),
            config,
            source,
            fallback,
            slot: SharedSlot::default(),
            pending: None,
            since_refresh: 0.0,
            refresh_requested: false,
            subscription: None,
            state: EngineState::Stopped,
        }
    }

    /// Engine reading from the source named in the configuration
    pub fn from_config(config: WindConfig) -> Self {
        let source = field_source_from_config(&config.source, &config.field);
        Self::new(config, source)
    }

    /// Reproducible particle placement
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.particles = ParticleSystem::with_seed(self.config.particles.clone(), seed);
        self
    }

    /// Begin animating `count` particles over the host map
    ///
    /// Subscribes to the host's viewport notifications and asks for a field refresh.
    /// A field published by an earlier run stays in use until the new one arrives.
    pub fn start(&mut self, count: usize, host: &dyn HostMap) {
        if self.state != EngineState::Stopped {
            self.stop();
        }
        self.bump_generation();

        let viewport = host
            .viewport_bounds()
            .filter(ViewportBounds::is_valid)
            .unwrap_or_else(ViewportBounds::global);
        self.particles.initialize(count, &viewport);
        self.trails.fit_particles(count);
        self.subscription = Some(host.notifier().subscribe());
        self.refresh_requested = true;
        self.since_refresh = 0.0;
        self.state = EngineState::Running;
        log::info!(
            "Wind engine started with {count} particles from the {} source",
            self.source.label()
        );
    }

    /// Halt the animation and release the particles, trails and viewport subscription
    ///
    /// Refreshes still running will not publish their result.
    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.bump_generation();
        self.subscription = None;
        self.pending = None;
        self.particles.clear();
        self.trails.clear();
        self.state = EngineState::Stopped;
        log::info!("Wind engine stopped");
    }

    /// Show or hide a started engine without losing its particles
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state = match (self.state, enabled) {
            (EngineState::Paused, true) => EngineState::Running,
            (EngineState::Running, false) => {
                self.trails.clear();
                EngineState::Paused
            }
            (state, _) => state,
        };
    }

    /// Advance one animation frame
    ///
    /// Returns `None` when the engine is not running or the host has no viewport.
    pub fn step(&mut self, host: &dyn HostMap, dt: f32) -> Option<&FrameOutput> {
        if self.state != EngineState::Running {
            return None;
        }

        let changed = self
            .subscription
            .as_ref()
            .is_some_and(ViewportSubscription::take_changed);
        if changed {
            if let Some(viewport) = host.viewport_bounds().filter(ViewportBounds::is_valid) {
                let fraction = self.config.particles.viewport_reseed_fraction;
                let moved = self.particles.reseed_fraction(fraction, &viewport);
                log::debug!("Viewport changed, reseeded {moved} particles");
            }
            self.trails.clear();
        }

        let field = self.field();
        let output = self
            .render
            .frame(&mut self.particles, field.as_deref(), host, dt)?;
        self.trails.fade();
        self.trails.extend(&output.segments);
        Some(output)
    }

    /// Hand out a refresh job when one is due
    ///
    /// A refresh is due right after start, after [`WindEngine::request_refresh`],
    /// and every `refresh.interval_secs`. Only one job is in flight at a time.
    pub fn poll_refresh(&mut self, dt: f32) -> Option<RefreshJob> {
        if self.state == EngineState::Stopped {
            return None;
        }
        if dt.is_finite() && dt > 0.0 {
            self.since_refresh += dt;
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|finished| !finished.load(Ordering::Acquire))
        {
            return None;
        }

        let due = self.refresh_requested
            || self.since_refresh >= self.config.refresh.interval_secs
            || read_slot(&self.slot).field.is_none();
        if !due {
            return None;
        }

        self.refresh_requested = false;
        self.since_refresh = 0.0;
        let finished = Arc::new(AtomicBool::new(false));
        self.pending = Some(finished.clone());
        Some(RefreshJob {
            source: self.source.clone(),
            fallback: self.fallback.clone(),
            slot: Arc::downgrade(&self.slot),
            generation: read_slot(&self.slot).generation,
            finished,
        })
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Snapshot of the current field
    pub fn field(&self) -> Option<Arc<VectorField>> {
        read_slot(&self.slot).field.clone()
    }

    pub fn trails(&self) -> &TrailBuffer {
        &self.trails
    }

    pub fn last_frame(&self) -> &FrameOutput {
        self.render.output()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn refresh_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|finished| !finished.load(Ordering::Acquire))
    }

    pub fn source_label(&self) -> &'static str {
        self.source.label()
    }

    pub fn config(&self) -> &WindConfig {
        &self.config
    }

    fn bump_generation(&mut self) {
        let mut slot = write_slot(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
    }
}

fn read_slot(slot: &RwLock<FieldSlot>) -> RwLockReadGuard<'_, FieldSlot> {
    slot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_slot(slot: &RwLock<FieldSlot>) -> RwLockWriteGuard<'_, FieldSlot> {
    slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
