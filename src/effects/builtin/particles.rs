//! Shared particle-system bookkeeping
//!
//! Spawning and integration happen once per tick through a [`TickGate`];
//! drawing happens on every apply so both surfaces show the same particles.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::effects::TickGate;

/// A bounded, self-culling list of particles
pub(crate) struct ParticleSystem<P> {
    particles: Vec<P>,
    max: usize,
    rng: StdRng,
    gate: TickGate,
}

impl<P> ParticleSystem<P> {
    pub fn new(max: usize) -> Self {
        Self {
            particles: Vec::with_capacity(max),
            max,
            rng: StdRng::from_os_rng(),
            gate: TickGate::new(),
        }
    }

    /// Replace the random source with a seeded one
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Advance the simulation for `tick`, once per tick
    ///
    /// `spawn` pushes new particles (anything past the ceiling is dropped);
    /// `update` integrates one step and returns false for particles to cull.
    pub fn step(
        &mut self,
        tick: u64,
        spawn: impl FnOnce(&mut StdRng, &mut Vec<P>),
        mut update: impl FnMut(&mut P) -> bool,
    ) -> bool {
        if !self.gate.advance(tick) {
            return false;
        }
        spawn(&mut self.rng, &mut self.particles);
        self.particles.truncate(self.max);
        self.particles.retain_mut(|p| update(p));
        true
    }

    pub fn particles(&self) -> &[P] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_step_once_per_tick() {
        let mut system: ParticleSystem<u32> = ParticleSystem::new(10);
        assert!(system.step(1, |_, out| out.push(0), |_| true));
        assert!(!system.step(1, |_, out| out.push(0), |_| true));
        assert_eq!(system.len(), 1);
    }

    #[test]
    fn test_ceiling_and_culling() {
        let mut system: ParticleSystem<u32> = ParticleSystem::new(5);
        system.seed(7);
        for tick in 0..100 {
            system.step(
                tick,
                |rng, out| {
                    for _ in 0..rng.random_range(0..4) {
                        out.push(0);
                    }
                },
                |age| {
                    *age += 1;
                    *age < 3
                },
            );
            assert!(system.len() <= system.max());
        }
        system.clear();
        assert_eq!(system.len(), 0);
    }
}
