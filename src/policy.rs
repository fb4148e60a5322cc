//! Action policies.

use crate::action::{Action, Consume, Move};
use crate::observation::Observation;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Maps an agent's observation and health to an action
pub trait Policy {
    fn get_action(&mut self, obs: &Observation, health: f32) -> Action;
}

/// Uniformly random moves and consumption, never mates
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RandomPolicy {
    fn get_action(&mut self, _obs: &Observation, _health: f32) -> Action {
        let movement = *Move::ALL.choose(&mut self.rng).unwrap_or(&Move::Stay);
        let consume = *Consume::ALL.choose(&mut self.rng).unwrap_or(&Consume::NoEat);
        Action::new(movement, consume)
    }
}

/// Returns the same action every time
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPolicy(pub Action);

impl Policy for FixedPolicy {
    fn get_action(&mut self, _obs: &Observation, _health: f32) -> Action {
        self.0
    }
}
