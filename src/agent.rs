//! Agent state and reward computation.

use crate::action::{Action, NUM_ACTIONS};
use crate::config::{Config, RewardInput};
use crate::error::ConfigError;
use crate::grid::Pos;
use crate::observation::Observation;
use crate::reward::RewardNet;
use rand::Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable agent identifier (index into the population)
pub type AgentId = usize;

/// A bee with a position, a health bar and its own reward network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    // Identity
    pub id: AgentId,

    // Physical state, `None` once removed from the grid
    pub pos: Option<Pos>,
    pub health: f32,
    pub initial_health: f32,
    pub age: u32,

    // Reward bookkeeping
    pub total_reward: f32,
    pub last_reward: f32,

    // Reproduction
    pub num_children: u32,
    pub mating_cooldown: u32,

    /// Most recently computed egocentric view
    pub observation: Observation,

    reward_inputs: BTreeSet<RewardInput>,
    reward_net: RewardNet,
}

/// JSON-style summary of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub pos: Option<Pos>,
    pub health: f32,
    pub last_reward: f32,
    pub age: u32,
    pub num_children: u32,
}

/// Input dimension of a reward network built for `config`
pub fn reward_input_dim(config: &Config) -> usize {
    let obs_width = config.env.obs_width();
    config
        .reward
        .reward_inputs
        .iter()
        .map(|input| match input {
            RewardInput::Obs => obs_width * obs_width * config.env.num_obj_types,
            RewardInput::Actions => NUM_ACTIONS,
            // Previous and current health
            RewardInput::Health => 2,
        })
        .sum()
}

impl Agent {
    /// Create an agent with a freshly initialized reward network
    pub fn new<R: Rng + ?Sized>(
        id: AgentId,
        config: &Config,
        weight_init: &Normal<f32>,
        rng: &mut R,
    ) -> Self {
        let reward_net = RewardNet::new_random(
            reward_input_dim(config),
            config.reward.n_layers,
            config.reward.hidden_dim,
            weight_init,
            rng,
        );
        Self::build(id, config, reward_net)
    }

    /// Create an agent carrying a copy of an existing reward network
    pub fn with_reward_net(
        id: AgentId,
        config: &Config,
        reward_net: &RewardNet,
    ) -> Result<Self, ConfigError> {
        let expected = reward_input_dim(config);
        if reward_net.input_dim != expected {
            return Err(ConfigError::Invalid(format!(
                "reward network expects {} inputs, configuration provides {}",
                reward_net.input_dim, expected
            )));
        }
        Ok(Self::build(id, config, reward_net.clone()))
    }

    fn build(id: AgentId, config: &Config, reward_net: RewardNet) -> Self {
        Self {
            id,
            pos: None,
            health: config.agent.initial_health,
            initial_health: config.agent.initial_health,
            age: 0,
            total_reward: 0.0,
            last_reward: 0.0,
            num_children: 0,
            mating_cooldown: config.agent.mating_cooldown_len,
            observation: Observation::zeros(config.env.sight_len, config.env.num_obj_types),
            reward_inputs: config.reward.reward_inputs.clone(),
            reward_net,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Alive and still placed on the grid
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pos.is_some() && self.is_alive()
    }

    pub fn reward_net(&self) -> &RewardNet {
        &self.reward_net
    }

    /// Replace the reward network (used by external trainers between episodes)
    pub fn set_reward_net(&mut self, reward_net: RewardNet) -> Result<(), ConfigError> {
        if reward_net.input_dim != self.reward_net.input_dim {
            return Err(ConfigError::Invalid(format!(
                "reward network expects {} inputs, agent provides {}",
                reward_net.input_dim, self.reward_net.input_dim
            )));
        }
        self.reward_net = reward_net;
        Ok(())
    }

    /// Concatenate the enabled reward inputs: observation, action, healths.
    pub fn reward_inputs(&self, prev_health: f32, action: &Action) -> Vec<f32> {
        let mut inputs = Vec::with_capacity(self.reward_net.input_dim);
        for input in &self.reward_inputs {
            match input {
                RewardInput::Obs => inputs.extend(self.observation.as_array().iter().copied()),
                RewardInput::Actions => inputs.extend_from_slice(&action.flat()),
                RewardInput::Health => inputs.extend_from_slice(&[prev_health, self.health]),
            }
        }
        inputs
    }

    /// Reward for `action` without touching the running totals
    pub fn evaluate_reward(&self, prev_health: f32, action: &Action) -> f32 {
        self.reward_net.forward(&self.reward_inputs(prev_health, action))
    }

    /// Compute the step reward and fold it into the running totals.
    pub fn compute_reward(&mut self, prev_health: f32, action: &Action) -> f32 {
        let reward = self.evaluate_reward(prev_health, action);
        self.total_reward += reward;
        self.last_reward = reward;
        reward
    }

    /// Softmax over the reward of every action from the current state.
    ///
    /// Ordered like [`Action::all`].
    pub fn optimal_action_dist(&self) -> Vec<f32> {
        let rewards: Vec<f32> = Action::all()
            .iter()
            .map(|action| self.evaluate_reward(self.health, action))
            .collect();
        softmax(&rewards)
    }

    /// Restore health and clear the episode reward.
    pub fn reset(&mut self) -> &Observation {
        self.health = self.initial_health;
        self.total_reward = 0.0;
        &self.observation
    }

    pub fn state(&self) -> AgentState {
        AgentState {
            pos: self.pos,
            health: self.health,
            last_reward: self.last_reward,
            age: self.age,
            num_children: self.num_children,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Health: {:.6}, Total reward: {:.6}",
            self.health, self.total_reward
        )
    }
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Consume, Move};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config_with(inputs: &[RewardInput]) -> Config {
        let mut config = Config::default();
        config.env.sight_len = 1;
        config.reward.n_layers = 2;
        config.reward.hidden_dim = 4;
        config.reward.reward_inputs = inputs.iter().copied().collect();
        config
    }

    fn new_agent(config: &Config, seed: u64) -> Agent {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let init = Normal::new(0.0, 1.0).unwrap();
        Agent::new(0, config, &init, &mut rng)
    }

    #[test]
    fn test_input_dim_per_component() {
        assert_eq!(reward_input_dim(&config_with(&[RewardInput::Obs])), 3 * 3 * 2);
        assert_eq!(reward_input_dim(&config_with(&[RewardInput::Actions])), NUM_ACTIONS);
        assert_eq!(reward_input_dim(&config_with(&[RewardInput::Health])), 2);
        assert_eq!(
            reward_input_dim(&config_with(&[
                RewardInput::Obs,
                RewardInput::Actions,
                RewardInput::Health
            ])),
            18 + NUM_ACTIONS + 2
        );
    }

    #[test]
    fn test_reward_inputs_order() {
        let config = config_with(&[RewardInput::Health, RewardInput::Obs, RewardInput::Actions]);
        let mut agent = new_agent(&config, 1);
        agent.health = 0.4;

        let action = Action::new(Move::Right, Consume::Eat);
        let inputs = agent.reward_inputs(0.9, &action);

        assert_eq!(inputs.len(), 18 + NUM_ACTIONS + 2);
        // Observation first, then actions, then healths
        assert!(inputs[..18].iter().all(|&v| v == 0.0));
        assert_eq!(&inputs[18..18 + NUM_ACTIONS], &action.flat());
        assert_eq!(&inputs[18 + NUM_ACTIONS..], &[0.9, 0.4]);
    }

    #[test]
    fn test_zero_network_reward_is_zero() {
        let config = config_with(&[RewardInput::Health]);
        let mut agent = Agent::with_reward_net(0, &config, &RewardNet::zeros(2, 2, 4)).unwrap();

        let reward = agent.compute_reward(0.7, &Action::default());
        assert_eq!(reward, 0.0);
        assert_eq!(agent.total_reward, 0.0);
    }

    #[test]
    fn test_compute_reward_accumulates() {
        let config = config_with(&[RewardInput::Health]);
        let mut net = RewardNet::zeros(2, 1, 0);
        net.layers[0].biases[0] = 0.5;
        let mut agent = Agent::with_reward_net(0, &config, &net).unwrap();

        agent.compute_reward(1.0, &Action::default());
        agent.compute_reward(1.0, &Action::default());

        assert_eq!(agent.last_reward, 0.5);
        assert_eq!(agent.total_reward, 1.0);
    }

    #[test]
    fn test_evaluate_reward_is_pure() {
        let config = config_with(&[RewardInput::Obs, RewardInput::Health]);
        let agent = new_agent(&config, 2);
        let before = agent.total_reward;
        let _ = agent.evaluate_reward(0.5, &Action::default());
        assert_eq!(agent.total_reward, before);
    }

    #[test]
    fn test_inherited_network_is_not_shared() {
        let config = config_with(&[RewardInput::Health]);
        let parent = new_agent(&config, 3);
        let mut child = Agent::with_reward_net(1, &config, parent.reward_net()).unwrap();

        let mut net = child.reward_net().clone();
        net.layers[0].weights.fill(0.0);
        child.set_reward_net(net).unwrap();

        assert_ne!(parent.reward_net(), child.reward_net());
    }

    #[test]
    fn test_with_reward_net_rejects_wrong_dim() {
        let config = config_with(&[RewardInput::Health]);
        assert!(Agent::with_reward_net(0, &config, &RewardNet::zeros(5, 1, 0)).is_err());
    }

    #[test]
    fn test_optimal_action_dist_uniform_for_zero_net() {
        let config = config_with(&[RewardInput::Actions]);
        let net = RewardNet::zeros(NUM_ACTIONS, 1, 0);
        let agent = Agent::with_reward_net(0, &config, &net).unwrap();

        let dist = agent.optimal_action_dist();
        assert_eq!(dist.len(), Action::all().len());
        for p in dist {
            assert!((p - 1.0 / 20.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reset_restores_health() {
        let config = config_with(&[RewardInput::Health]);
        let mut agent = new_agent(&config, 4);
        agent.health = 0.1;
        agent.total_reward = 3.0;
        agent.age = 7;

        agent.reset();
        assert_eq!(agent.health, config.agent.initial_health);
        assert_eq!(agent.total_reward, 0.0);
        assert_eq!(agent.age, 7);
    }

    #[test]
    fn test_display_and_state() {
        let config = config_with(&[RewardInput::Health]);
        let mut agent = new_agent(&config, 5);
        agent.health = 0.5;
        agent.total_reward = -1.25;
        agent.pos = Some((2, 3));

        assert_eq!(agent.to_string(), "Health: 0.500000, Total reward: -1.250000");

        let state = serde_json::to_value(agent.state()).unwrap();
        assert_eq!(state["health"], 0.5);
        assert_eq!(state["pos"], serde_json::json!([2, 3]));
    }
}
