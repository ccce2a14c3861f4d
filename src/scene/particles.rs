//! Particle Emitters
//!
//! CPU-simulated point emitters rendered as camera-facing quads in the
//! scene pass tail, after the sky and before the transparents. Simulation
//! is deliberately simple: constant spawn rate, linear velocity plus
//! gravity, age-based fade.

use glam::{Mat4, Vec3};

use crate::gfx::{DrawCall, MeshId};
use crate::render::frame::LayerMask;

#[derive(Clone, Copy, Debug)]
struct Particle {
    position: Vec3,
    velocity: Vec3,
    age: f32,
    lifetime: f32,
    size: f32,
}

#[derive(Clone, Debug)]
pub struct ParticleEmitter {
    /// Unit quad mesh shared by all particles of this emitter.
    pub quad: MeshId,
    pub position: Vec3,
    pub direction: Vec3,
    pub spread: f32,
    pub speed: f32,
    pub gravity: Vec3,
    pub spawn_rate: f32,
    pub particle_lifetime: f32,
    pub particle_size: f32,
    pub color: Vec3,
    pub max_particles: usize,
    pub layers: LayerMask,
    pub enabled: bool,

    particles: Vec<Particle>,
    spawn_accumulator: f32,
    // Deterministic LCG; good enough for emission jitter.
    rng_state: u32,
}

impl ParticleEmitter {
    #[must_use]
    pub fn new(quad: MeshId, position: Vec3) -> Self {
        Self {
            quad,
            position,
            direction: Vec3::Y,
            spread: 0.25,
            speed: 2.0,
            gravity: Vec3::new(0.0, -9.8, 0.0),
            spawn_rate: 32.0,
            particle_lifetime: 1.5,
            particle_size: 0.1,
            color: Vec3::ONE,
            max_particles: 1024,
            layers: LayerMask::PARTICLES,
            enabled: true,
            particles: Vec::new(),
            spawn_accumulator: 0.0,
            rng_state: 0x9e37_79b9,
        }
    }

    fn next_unit(&mut self) -> f32 {
        self.rng_state = self.rng_state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.rng_state >> 8) as f32 / (1 << 24) as f32
    }

    pub fn update(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }

        for particle in &mut self.particles {
            particle.age += dt;
            particle.velocity += self.gravity * dt;
            particle.position += particle.velocity * dt;
        }
        self.particles.retain(|p| p.age < p.lifetime);

        self.spawn_accumulator += self.spawn_rate * dt;
        if self.particles.len() >= self.max_particles {
            // At capacity: drop the backlog so freed slots refill at the
            // configured rate, not in a burst.
            self.spawn_accumulator = self.spawn_accumulator.min(1.0);
        }
        while self.spawn_accumulator >= 1.0 && self.particles.len() < self.max_particles {
            self.spawn_accumulator -= 1.0;
            let jitter = Vec3::new(
                self.next_unit() - 0.5,
                self.next_unit() - 0.5,
                self.next_unit() - 0.5,
            ) * self.spread;
            self.particles.push(Particle {
                position: self.position,
                velocity: (self.direction + jitter).normalize_or_zero() * self.speed,
                age: 0.0,
                lifetime: self.particle_lifetime,
                size: self.particle_size,
            });
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.particles.len()
    }

    /// Emits one billboarded draw call per live particle. Billboarding
    /// uses the camera basis so quads always face the view.
    pub fn emit_draws(&self, camera_right: Vec3, camera_up: Vec3, out: &mut Vec<DrawCall>) {
        for particle in &self.particles {
            let fade = 1.0 - particle.age / particle.lifetime;
            let scale = particle.size * (0.5 + 0.5 * fade);
            let world = Mat4::from_cols(
                (camera_right * scale).extend(0.0),
                (camera_up * scale).extend(0.0),
                camera_right.cross(camera_up).extend(0.0),
                particle.position.extend(1.0),
            );
            out.push(DrawCall {
                mesh: self.quad,
                part: 0,
                world,
                color: self.color,
                opacity: fade,
                bones: None,
            });
        }
    }
}
