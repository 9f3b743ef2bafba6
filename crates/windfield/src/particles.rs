// Particle pool advected through the wind field

use crate::config::ParticleConfig;
use crate::field::VectorField;
use crate::geo::{ViewportBounds, wrap_longitude};
use crate::wind::WindVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frame time the speed constants are tuned for
const REFERENCE_FRAME_SECS: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub lat: f32,
    pub lng: f32,
    /// Frames since the last respawn
    pub age: u32,
    pub max_age: u32,
    pub prev_lat: f32,
    pub prev_lng: f32,
    /// Wind speed sampled during the last step (m/s)
    pub speed: f32,
    /// Set when the particle was moved to a new spawn point during the last step
    pub respawned: bool,
}

impl Particle {
    /// Remaining life in [0, 1], 1 right after spawning
    pub fn life_fraction(&self) -> f32 {
        if self.max_age == 0 {
            return 0.0;
        }
        (1.0 - self.age as f32 / self.max_age as f32).clamp(0.0, 1.0)
    }
}

/// Fixed-size set of particles; respawning replaces particles, never adds or removes them
pub struct ParticleSystem {
    particles: Vec<Particle>,
    config: ParticleConfig,
    rng: StdRng,
}

impl ParticleSystem {
    pub fn new(config: ParticleConfig) -> Self {
        Self {
            particles: Vec::new(),
            config,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic system for reproducible runs
    pub fn with_seed(config: ParticleConfig, seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Replace the pool with `count` particles spread over the viewport and its margin
    ///
    /// Ages are staggered so the particles don't all expire on the same frame.
    pub fn initialize(&mut self, count: usize, viewport: &ViewportBounds) {
        let spawn_area = viewport.expanded(self.config.spawn_margin.max(0.0));
        let (min_life, max_life) = self.config.lifespan_range();
        let max_latitude = self.config.max_latitude;
        let age_limit = self.config.initial_age_limit;

        self.particles.clear();
        self.particles.reserve(count);
        for _ in 0..count {
            let (lat, lng) = spawn_area.random_point(&mut self.rng, max_latitude);
            let max_age = self.rng.random_range(min_life..=max_life);
            // Never start older than the particle's own lifespan
            let age = self.rng.random_range(0..age_limit.min(max_age).max(1));
            self.particles.push(Particle {
                lat,
                lng,
                age,
                max_age,
                prev_lat: lat,
                prev_lng: lng,
                speed: 0.0,
                respawned: true,
            });
        }
        log::debug!("Initialized {count} wind particles");
    }

    /// Degrees moved per frame per m/s of wind
    pub fn speed_factor(&self, zoom: f32, dt: f32) -> f32 {
        let c = &self.config;
        let zoom_multiplier = if zoom.is_finite() && c.zoom_reference > 0.0 {
            (zoom / c.zoom_reference)
                .max(c.min_zoom_multiplier)
                .min(c.max_zoom_multiplier)
        } else {
            1.0
        };
        let frame_scale = if dt.is_finite() {
            (dt / REFERENCE_FRAME_SECS).max(0.0).min(c.max_frame_scale)
        } else {
            0.0
        };
        c.speed_base * zoom_multiplier * frame_scale
    }

    /// Advance every particle by one frame
    ///
    /// A missing field moves nothing. Particles past their lifespan or drifting
    /// beyond the culling margin are respawned inside `viewport`. Returns how many
    /// particles were respawned; an unusable viewport leaves the pool untouched.
    pub fn step(
        &mut self,
        field: Option<&VectorField>,
        viewport: &ViewportBounds,
        zoom: f32,
        dt: f32,
    ) -> usize {
        if !viewport.is_valid() {
            return 0;
        }

        let factor = self.speed_factor(zoom, dt);
        let cull_area = viewport.expanded(self.config.cull_margin.max(0.0));
        let max_latitude = self.config.max_latitude;
        let mut respawned = 0;

        for particle in &mut self.particles {
            particle.prev_lat = particle.lat;
            particle.prev_lng = particle.lng;
            particle.respawned = false;

            let wind = field.map_or(WindVector::ZERO, |f| f.sample_at(particle.lat, particle.lng));
            particle.speed = wind.speed();
            particle.lng = wrap_longitude(particle.lng + wind.u * factor);
            particle.lat = (particle.lat + wind.v * factor).clamp(-max_latitude, max_latitude);
            particle.age = particle.age.saturating_add(1);

            if particle.age > particle.max_age || !cull_area.contains(particle.lat, particle.lng) {
                respawn(particle, viewport, &self.config, &mut self.rng);
                respawned += 1;
            }
        }
        respawned
    }

    /// Move a random share of the pool into a (new) viewport so it fills right away
    pub fn reseed_fraction(&mut self, fraction: f32, viewport: &ViewportBounds) -> usize {
        if !viewport.is_valid() || self.particles.is_empty() {
            return 0;
        }
        let len = self.particles.len();
        let amount = ((len as f32 * fraction.clamp(0.0, 1.0)).round() as usize).min(len);
        let indices = rand::seq::index::sample(&mut self.rng, len, amount);
        for index in indices.iter() {
            respawn(&mut self.particles[index], viewport, &self.config, &mut self.rng);
        }
        amount
    }
}

fn respawn(
    particle: &mut Particle,
    viewport: &ViewportBounds,
    config: &ParticleConfig,
    rng: &mut impl Rng,
) {
    let (min_life, max_life) = config.lifespan_range();
    let (lat, lng) = viewport.random_point(rng, config.max_latitude);
    particle.lat = lat;
    particle.lng = lng;
    particle.prev_lat = lat;
    particle.prev_lng = lng;
    particle.age = 0;
    particle.max_age = rng.random_range(min_life..=max_life);
    particle.respawned = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldOrigin;
    use crate::geo::GeoBounds;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn system() -> ParticleSystem {
        ParticleSystem::with_seed(ParticleConfig::default(), 1234)
    }

    fn uniform_field(u: f32, v: f32) -> VectorField {
        VectorField::new(
            2,
            GeoBounds::GLOBAL,
            vec![WindVector::new(u, v); 9],
            FieldOrigin::Grid,
        )
        .unwrap()
    }

    #[rstest]
    #[case(0, ViewportBounds::global())]
    #[case(1, ViewportBounds::new(40.0, -10.0, 55.0, 20.0))]
    #[case(500, ViewportBounds::new(-20.0, 170.0, 20.0, -170.0))]
    #[case(3000, ViewportBounds::global())]
    fn test_particle_count_is_conserved(#[case] count: usize, #[case] viewport: ViewportBounds) {
        let mut particles = system();
        particles.initialize(count, &viewport);
        assert_eq!(particles.len(), count);

        let field = uniform_field(35.0, -12.0);
        for frame in 0..250 {
            let field = (frame % 3 != 0).then_some(&field);
            particles.step(field, &viewport, 5.0, 1.0 / 60.0);
            assert_eq!(particles.len(), count);
        }
        particles.reseed_fraction(0.3, &viewport);
        assert_eq!(particles.len(), count);
    }

    #[test]
    fn test_age_never_exceeds_lifespan_after_step() {
        let viewport = ViewportBounds::new(-30.0, -30.0, 30.0, 30.0);
        let mut particles = system();
        particles.initialize(400, &viewport);
        for particle in particles.particles() {
            assert!(particle.age < particle.max_age.max(1));
        }

        let field = uniform_field(2.0, 1.0);
        for _ in 0..300 {
            particles.step(Some(&field), &viewport, 5.0, 1.0 / 60.0);
            for particle in particles.particles() {
                assert!(particle.age <= particle.max_age);
                assert!((60..=110).contains(&particle.max_age));
            }
        }
    }

    #[test]
    fn test_zero_wind_only_ages() {
        let viewport = ViewportBounds::new(-10.0, -10.0, 10.0, 10.0);
        let mut particles = system();
        particles.initialize(300, &viewport);
        let initial: Vec<Particle> = particles.particles().to_vec();
        let mut ever_respawned = vec![false; initial.len()];

        let field = uniform_field(0.0, 0.0);
        for _ in 0..100 {
            let before: Vec<Particle> = particles.particles().to_vec();
            particles.step(Some(&field), &viewport, 5.0, 1.0 / 60.0);
            for (i, (old, new)) in before.iter().zip(particles.particles()).enumerate() {
                assert!(new.age <= new.max_age);
                if new.respawned {
                    ever_respawned[i] = true;
                    assert_eq!(new.age, 0);
                } else {
                    assert_eq!(new.age, old.age + 1);
                }
            }
        }

        for ((start, now), respawned) in initial
            .iter()
            .zip(particles.particles())
            .zip(&ever_respawned)
        {
            if !respawned {
                assert_eq!(start.lat.to_bits(), now.lat.to_bits());
                assert_eq!(start.lng.to_bits(), now.lng.to_bits());
            }
        }
        // Lifespans are at most 110 frames, so most particles cycled at least once
        assert!(ever_respawned.iter().filter(|r| **r).count() > initial.len() / 2);

        // Without a field at all the result is the same
        let before: Vec<Particle> = particles.particles().to_vec();
        particles.step(None, &viewport, 5.0, 1.0 / 60.0);
        for (old, new) in before.iter().zip(particles.particles()) {
            if !new.respawned {
                assert_eq!((new.lat, new.lng), (old.lat, old.lng));
                assert_eq!(new.speed, 0.0);
            }
        }
    }

    #[test]
    fn test_crossing_the_antimeridian_wraps() {
        let viewport = ViewportBounds::global();
        let mut particles = system();
        particles.initialize(1, &viewport);
        {
            let particle = &mut particles.particles[0];
            particle.lat = 0.0;
            particle.lng = 179.5;
            particle.age = 0;
            particle.max_age = 100;
        }

        // 40 m/s * 0.015 = 0.6 degrees this frame
        particles.step(Some(&uniform_field(40.0, 0.0)), &viewport, 5.0, 1.0 / 60.0);
        let particle = &particles.particles()[0];
        assert!(!particle.respawned);
        assert_relative_eq!(particle.lng, -179.9, epsilon = 1e-3);
        assert_relative_eq!(particle.lat, 0.0);
    }

    #[test]
    fn test_latitude_is_clamped() {
        let viewport = ViewportBounds::global();
        let mut particles = system();
        particles.initialize(1, &viewport);
        {
            let particle = &mut particles.particles[0];
            particle.lat = 84.9;
            particle.lng = 0.0;
            particle.age = 0;
            particle.max_age = 100;
        }
        particles.step(Some(&uniform_field(0.0, 50.0)), &viewport, 5.0, 1.0 / 60.0);
        assert_relative_eq!(particles.particles()[0].lat, 85.0);
    }

    #[test]
    fn test_particles_outside_margin_are_respawned_in_view() {
        let viewport = ViewportBounds::new(0.0, 0.0, 10.0, 10.0);
        let mut particles = system();
        particles.initialize(50, &viewport);
        for particle in &mut particles.particles {
            particle.lat = 60.0;
            particle.lng = 100.0;
            particle.age = 0;
        }
        let respawned = particles.step(None, &viewport, 5.0, 1.0 / 60.0);
        assert_eq!(respawned, 50);
        for particle in particles.particles() {
            assert!(viewport.contains(particle.lat, particle.lng));
            assert_eq!(particle.age, 0);
        }
    }

    #[test]
    fn test_invalid_viewport_is_a_no_op() {
        let viewport = ViewportBounds::new(0.0, 0.0, 10.0, 10.0);
        let mut particles = system();
        particles.initialize(20, &viewport);
        let before = particles.particles().to_vec();
        let broken = ViewportBounds::new(f32::NAN, 0.0, 10.0, 10.0);
        assert_eq!(particles.step(Some(&uniform_field(9.0, 9.0)), &broken, 5.0, 0.016), 0);
        assert_eq!(particles.particles(), &before[..]);
    }

    #[rstest]
    #[case(5.0, 1.0 / 60.0, 0.015)]
    #[case(10.0, 1.0 / 60.0, 0.03)]
    #[case(30.0, 1.0 / 60.0, 0.03)]
    #[case(1.0, 1.0 / 60.0, 0.0075)]
    #[case(5.0, 1.0 / 30.0, 0.03)]
    #[case(5.0, 2.0, 0.045)]
    #[case(5.0, f32::NAN, 0.0)]
    fn test_speed_factor(#[case] zoom: f32, #[case] dt: f32, #[case] expected: f32) {
        assert_relative_eq!(system().speed_factor(zoom, dt), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_positions_stay_finite_with_broken_input() {
        let viewport = ViewportBounds::global();
        let mut particles = system();
        particles.initialize(100, &viewport);
        let field = uniform_field(1e30, -1e30);
        for _ in 0..5 {
            particles.step(Some(&field), &viewport, f32::INFINITY, f32::NAN);
        }
        for particle in particles.particles() {
            assert!(particle.lat.is_finite() && particle.lng.is_finite());
        }
    }

    #[test]
    fn test_reseed_moves_requested_share_into_view() {
        let viewport = ViewportBounds::new(0.0, 0.0, 10.0, 10.0);
        let mut particles = system();
        particles.initialize(100, &ViewportBounds::new(-60.0, -150.0, -40.0, -120.0));
        let moved = particles.reseed_fraction(0.3, &viewport);
        assert_eq!(moved, 30);
        let inside = particles
            .particles()
            .iter()
            .filter(|p| viewport.contains(p.lat, p.lng))
            .count();
        assert_eq!(inside, 30);
    }
}
