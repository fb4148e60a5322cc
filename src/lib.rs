//! # BEES
//!
//! Multi-agent foraging environment where every agent carries its own
//! learned reward network.
//!
//! ## Features
//!
//! - **Grid world**: agents and food on a bounded 2D grid, four moves plus stay
//! - **Partial observability**: square egocentric windows, zero-padded at the edges
//! - **Per-agent rewards**: each bee evaluates its own small MLP
//! - **Reproducible**: one seeded generator drives every random draw in an episode
//! - **Configurable**: YAML configuration files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bees::{Config, Env};
//! use bees::policy::RandomPolicy;
//! use bees::sink::NullSink;
//!
//! let config = Config::default();
//! let mut env = Env::new_with_seed(config, 42, Box::new(NullSink)).unwrap();
//! let mut policy = RandomPolicy::with_seed(7);
//!
//! env.reset().unwrap();
//! let mut actions = env.get_action_dict(&mut policy);
//! let result = env.step(&mut actions).unwrap();
//!
//! println!("Rewards: {:?}", result.rewards);
//! println!("Done: {}", result.dones.all);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use bees::Config;
//!
//! let mut config = Config::default();
//! config.env.num_agents = 8;
//! config.reward.n_layers = 2;
//! assert!(config.validate().is_ok());
//! ```

pub mod action;
pub mod agent;
pub mod analysis;
pub mod config;
pub mod env;
pub mod error;
pub mod grid;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod sink;

// Re-export main types
pub use action::Action;
pub use agent::{Agent, AgentId};
pub use config::Config;
pub use env::{ActionDict, Env, StepResult};
pub use error::{ActionError, ConfigError, EnvError};
pub use observation::Observation;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run random-policy episodes and measure throughput
pub fn benchmark(
    episodes: u64,
    max_steps: u64,
    config: Config,
) -> Result<BenchmarkResult, EnvError> {
    use std::time::Instant;

    let mut env = Env::new_with_seed(config, 0, Box::new(sink::NullSink))?;
    let mut policy = policy::RandomPolicy::with_seed(0);

    let start = Instant::now();
    let mut steps = 0;
    for _ in 0..episodes {
        steps += env.run_episode(&mut policy, max_steps)?.steps;
    }
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        episodes,
        steps,
        elapsed_secs: elapsed.as_secs_f64(),
        steps_per_second: steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub episodes: u64,
    pub steps: u64,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Episodes: {}", self.episodes)?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        Ok(())
    }
}
