//! Configuration system for the bees environment.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub env: EnvConfig,
    pub agent: AgentConfig,
    pub reward: RewardConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// World/environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Grid width (x axis)
    pub width: usize,
    /// Grid height (y axis)
    pub height: usize,
    /// How far an agent sees in each cardinal direction
    pub sight_len: usize,
    /// Number of object type layers in the grid (at least agent and food)
    pub num_obj_types: usize,
    /// Number of agents in the population
    pub num_agents: usize,
    /// Health lost by every living agent each step
    pub aging_rate: f32,
    /// Fraction of cells holding food after reset (0.0 - 1.0)
    pub food_density: f32,
    /// Mean of the food size distribution
    pub food_size_mean: f32,
    /// Standard deviation of the food size distribution
    pub food_size_stddev: f32,
    /// Whether agents with non-positive health still on the grid take part in movement
    #[serde(default)]
    pub dead_agents_move: bool,
}

/// Per-agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Health at creation and after every reset
    pub initial_health: f32,
    /// Steps an agent must wait between mate actions
    pub mating_cooldown_len: u32,
}

/// Inputs a reward network may be fed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardInput {
    Obs,
    Actions,
    Health,
}

/// Reward network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Number of affine layers
    pub n_layers: usize,
    /// Width of hidden layers
    pub hidden_dim: usize,
    /// Mean of the weight initialization distribution
    pub reward_weight_mean: f32,
    /// Standard deviation of the weight initialization distribution
    pub reward_weight_stddev: f32,
    /// Enabled reward network inputs
    pub reward_inputs: BTreeSet<RewardInput>,
}

/// Training analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Weight of the previous value in exponential moving averages
    pub ema_alpha: f32,
    /// Coefficient on the value loss in the total loss
    pub value_loss_coef: f32,
    /// Coefficient on the distribution entropy in the total loss
    pub entropy_coef: f32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Directory receiving the step and reward logs
    pub log_dir: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            sight_len: 2,
            num_obj_types: 2,
            num_agents: 4,
            aging_rate: 0.1,
            food_density: 0.2,
            food_size_mean: 0.1,
            food_size_stddev: 0.01,
            dead_agents_move: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            initial_health: 1.0,
            mating_cooldown_len: 10,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            n_layers: 3,
            hidden_dim: 32,
            reward_weight_mean: 0.0,
            reward_weight_stddev: 0.4,
            reward_inputs: [RewardInput::Obs, RewardInput::Actions, RewardInput::Health]
                .into_iter()
                .collect(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.99,
            value_loss_coef: 0.5,
            entropy_coef: 0.01,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl EnvConfig {
    /// Number of cells in the grid
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Number of food cells placed at reset
    pub fn initial_num_foods(&self) -> usize {
        (self.food_density * self.area() as f32).floor() as usize
    }

    /// Side length of the square observation window
    pub fn obs_width(&self) -> usize {
        2 * self.sight_len + 1
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let env = &self.env;
        if env.width == 0 || env.height == 0 {
            return Err(ConfigError::Invalid("width and height must be > 0".to_string()));
        }
        if env.num_obj_types < 2 {
            return Err(ConfigError::Invalid(
                "num_obj_types must be at least 2 (agent and food)".to_string(),
            ));
        }
        if env.num_agents == 0 {
            return Err(ConfigError::Invalid("num_agents must be > 0".to_string()));
        }
        if env.num_agents > env.area() {
            return Err(ConfigError::Invalid(format!(
                "num_agents ({}) cannot exceed the number of cells ({})",
                env.num_agents,
                env.area()
            )));
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&env.food_density) {
            return Err(ConfigError::Invalid("food_density must be in [0, 1]".to_string()));
        }
        if !env.food_size_mean.is_finite() {
            return Err(ConfigError::Invalid("food_size_mean must be finite".to_string()));
        }
        if env.food_size_stddev < 0.0 || !env.food_size_stddev.is_finite() {
            return Err(ConfigError::Invalid("food_size_stddev must be >= 0".to_string()));
        }
        if env.aging_rate < 0.0 || !env.aging_rate.is_finite() {
            return Err(ConfigError::Invalid("aging_rate must be >= 0".to_string()));
        }
        if !self.agent.initial_health.is_finite() || self.agent.initial_health > 1.0 {
            return Err(ConfigError::Invalid(
                "initial_health must be finite and at most 1".to_string(),
            ));
        }

        let reward = &self.reward;
        if reward.n_layers == 0 {
            return Err(ConfigError::Invalid("n_layers must be > 0".to_string()));
        }
        if reward.n_layers > 1 && reward.hidden_dim == 0 {
            return Err(ConfigError::Invalid(
                "hidden_dim must be > 0 when n_layers > 1".to_string(),
            ));
        }
        if !reward.reward_weight_mean.is_finite() {
            return Err(ConfigError::Invalid("reward_weight_mean must be finite".to_string()));
        }
        if reward.reward_weight_stddev < 0.0 || !reward.reward_weight_stddev.is_finite() {
            return Err(ConfigError::Invalid("reward_weight_stddev must be >= 0".to_string()));
        }
        if reward.reward_inputs.is_empty() {
            return Err(ConfigError::Invalid("reward_inputs must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.analysis.ema_alpha) {
            return Err(ConfigError::Invalid("ema_alpha must be in [0, 1]".to_string()));
        }
        Ok(())
    }
}
