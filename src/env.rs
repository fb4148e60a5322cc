//! Environment controller: episode reset, step resolution and rendering.

use crate::action::{Action, Consume};
use crate::agent::{reward_input_dim, Agent, AgentId};
use crate::config::Config;
use crate::error::{ConfigError, EnvError};
use crate::grid::{Grid, ObjectType, Pos};
use crate::observation::Observation;
use crate::policy::Policy;
use crate::sink::StepSink;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Per-agent actions for one step
pub type ActionDict = BTreeMap<AgentId, Action>;

/// Termination flags produced by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dones {
    /// Done flag of every agent that was alive entering the step
    pub agents: BTreeMap<AgentId, bool>,
    /// True once every agent in `agents` is done
    pub all: bool,
}

impl fmt::Display for Dones {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (id, done) in &self.agents {
            write!(f, "{}: {}, ", id, done)?;
        }
        write!(f, "__all__: {}}}", self.all)
    }
}

/// Auxiliary per-agent diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentInfo {
    /// Softmax over the agent's reward for every action, ordered like `Action::all()`
    pub optimal_action_dist: Vec<f32>,
}

/// Everything a step hands back to the trainer
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub observations: BTreeMap<AgentId, Observation>,
    pub rewards: BTreeMap<AgentId, f32>,
    pub dones: Dones,
    pub infos: BTreeMap<AgentId, AgentInfo>,
}

/// Summary of an episode driven by [`Env::run_episode`]
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub steps: u64,
    pub finished: bool,
    pub mean_total_reward: f32,
    pub survivors: usize,
    pub foods_left: usize,
}

/// The bee environment
pub struct Env {
    // Configuration
    pub config: Config,

    // World state
    pub grid: Grid,
    pub agents: Vec<Agent>,
    pub num_foods: usize,
    initial_num_foods: usize,

    // Episode state
    pub iteration: u64,
    pub dones: Dones,
    resetted: bool,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
    food_size: Normal<f32>,

    // Step and reward logs
    sink: Box<dyn StepSink>,
}

impl Env {
    /// Create an environment with a random seed
    pub fn new(config: Config, sink: Box<dyn StepSink>) -> Result<Self, EnvError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed, sink)
    }

    /// Create an environment with a specific seed for reproducibility
    pub fn new_with_seed(
        config: Config,
        seed: u64,
        sink: Box<dyn StepSink>,
    ) -> Result<Self, EnvError> {
        config.validate()?;

        let food_size = Normal::new(config.env.food_size_mean, config.env.food_size_stddev)
            .map_err(|e| ConfigError::Invalid(format!("food size distribution: {}", e)))?;
        let weight_init = Normal::new(
            config.reward.reward_weight_mean,
            config.reward.reward_weight_stddev,
        )
        .map_err(|e| ConfigError::Invalid(format!("reward weight distribution: {}", e)))?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let agents = (0..config.env.num_agents)
            .map(|id| Agent::new(id, &config, &weight_init, &mut rng))
            .collect();

        Ok(Self {
            grid: Grid::new(config.env.width, config.env.height, config.env.num_obj_types),
            agents,
            num_foods: config.env.initial_num_foods(),
            initial_num_foods: config.env.initial_num_foods(),
            iteration: 0,
            dones: Dones::default(),
            resetted: false,
            rng,
            seed,
            food_size,
            sink,
            config,
        })
    }

    /// Replace the population; ids are reassigned to match positions.
    pub fn with_agents(mut self, agents: Vec<Agent>) -> Result<Self, EnvError> {
        if agents.len() > self.grid.width() * self.grid.height() {
            return Err(ConfigError::Invalid(format!(
                "{} agents do not fit on a {}x{} grid",
                agents.len(),
                self.grid.width(),
                self.grid.height()
            ))
            .into());
        }
        let expected = reward_input_dim(&self.config);
        if let Some(agent) = agents
            .iter()
            .find(|agent| agent.reward_net().input_dim != expected)
        {
            return Err(ConfigError::Invalid(format!(
                "agent {} has a reward network with {} inputs, configuration provides {}",
                agent.id,
                agent.reward_net().input_dim,
                expected
            ))
            .into());
        }

        self.agents = agents;
        for (id, agent) in self.agents.iter_mut().enumerate() {
            agent.id = id;
        }
        self.resetted = false;
        Ok(self)
    }

    /// Populate the grid with agents and food at distinct random cells.
    fn fill(&mut self) {
        self.grid.clear();
        let positions = self.grid.positions();

        let num_cells = positions.len();
        let agent_cells = rand::seq::index::sample(&mut self.rng, num_cells, self.agents.len());
        for (agent, cell) in self.agents.iter_mut().zip(agent_cells.iter()) {
            let pos = positions[cell];
            self.grid.place(ObjectType::Agent, pos);
            agent.pos = Some(pos);
        }

        let food_cells = rand::seq::index::sample(&mut self.rng, num_cells, self.initial_num_foods);
        for cell in food_cells.iter() {
            self.grid.place(ObjectType::Food, positions[cell]);
        }
        self.num_foods = self.initial_num_foods;
    }

    /// Start a new episode and return the initial observations.
    ///
    /// The mean total reward of the previous episode goes to the reward log.
    pub fn reset(&mut self) -> Result<BTreeMap<AgentId, Observation>, EnvError> {
        if self.resetted {
            let mean = self.mean_total_reward();
            self.sink.record_episode_reward(mean)?;
            log::info!(
                "Episode finished after {} steps: mean reward = {:.4}",
                self.iteration,
                mean
            );
        }

        self.iteration = 0;
        self.resetted = true;
        self.dones = Dones::default();
        self.fill();

        let sight_len = self.config.env.sight_len;
        for agent in &mut self.agents {
            if let Some(pos) = agent.pos {
                agent.observation = Observation::from_grid(&self.grid, pos, sight_len);
            }
        }

        log::debug!(
            "Reset: {} agents, {} foods on a {}x{} grid",
            self.agents.len(),
            self.num_foods,
            self.grid.width(),
            self.grid.height()
        );

        Ok(self
            .agents
            .iter_mut()
            .map(|agent| (agent.id, agent.reset().clone()))
            .collect())
    }

    /// Re-seed the episode generator, then reset
    pub fn reset_with_seed(
        &mut self,
        seed: u64,
    ) -> Result<BTreeMap<AgentId, Observation>, EnvError> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.seed = seed;
        self.reset()
    }

    /// Ask `policy` for an action for every agent still on the grid.
    pub fn get_action_dict(&self, policy: &mut dyn Policy) -> ActionDict {
        self.agents
            .iter()
            .filter(|agent| agent.is_active())
            .map(|agent| (agent.id, policy.get_action(&agent.observation, agent.health)))
            .collect()
    }

    /// Advance the world by one timestep.
    ///
    /// Moves that collide or leave the grid are rewritten to `Stay` in `actions`.
    pub fn step(&mut self, actions: &mut ActionDict) -> Result<StepResult, EnvError> {
        if !self.resetted {
            return Err(EnvError::NotReset);
        }
        if let Some(&id) = actions.keys().find(|&&id| id >= self.agents.len()) {
            return Err(EnvError::UnknownAgent(id));
        }

        // Phase 1: Snapshot health before anything moves
        let prev_health: Vec<f32> = self.agents.iter().map(|agent| agent.health).collect();

        // Phase 2: Movement in a fresh random order
        let mut order: Vec<AgentId> = actions.keys().copied().collect();
        order.shuffle(&mut self.rng);
        self.move_in_order(&order, actions);

        // Phase 3: Consumption
        self.consume(actions);

        // Phase 4: Rewards for agents still alive after eating
        let (rewards, infos) = self.compute_rewards(&prev_health, actions);

        // Phase 5: Aging, observations and dones
        let (observations, done_agents) = self.age_agents();

        // Phase 6: Remove finished agents from the grid
        for (&id, &done) in &done_agents {
            if done {
                let agent = &mut self.agents[id];
                if let Some(pos) = agent.pos.take() {
                    self.grid.remove(ObjectType::Agent, pos);
                }
                log::debug!("Agent {} done at step {}", id, self.iteration);
            }
        }

        // Phase 7: Episode termination
        let all = done_agents.values().all(|&done| done);
        self.dones = Dones {
            agents: done_agents,
            all,
        };

        // Phase 8: Log state
        let rendered = self.to_string();
        self.sink.record_step(self.iteration, &rendered)?;

        self.iteration += 1;
        if all {
            log::info!("All agents done after {} steps", self.iteration);
        }

        Ok(StepResult {
            observations,
            rewards,
            dones: self.dones.clone(),
            infos,
        })
    }

    /// Resolve movement for the agents in `order`, one at a time.
    ///
    /// Each agent sees the grid as left by the agents before it, so an agent
    /// can follow into a vacated cell but two agents cannot swap.
    pub fn move_in_order(&mut self, order: &[AgentId], actions: &mut ActionDict) {
        let dead_agents_move = self.config.env.dead_agents_move;

        for &id in order {
            let Some(action) = actions.get(&id).copied() else {
                continue;
            };
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            let Some(pos) = agent.pos else {
                continue;
            };
            if !agent.is_alive() && !dead_agents_move {
                continue;
            }

            match self.try_move(pos, &action) {
                Some(new_pos) => {
                    self.grid.remove(ObjectType::Agent, pos);
                    self.grid.place(ObjectType::Agent, new_pos);
                    self.agents[id].pos = Some(new_pos);
                }
                None => {
                    actions.insert(id, action.stay());
                }
            }
        }
    }

    /// Target cell of a move, `None` if it leaves the grid or hits another agent
    fn try_move(&self, pos: Pos, action: &Action) -> Option<Pos> {
        let (dx, dy) = action.movement.delta();
        if (dx, dy) == (0, 0) {
            return Some(pos);
        }

        let x = pos.0 as i64 + dx;
        let y = pos.1 as i64 + dy;
        if !self.grid.in_bounds(x, y) {
            return None;
        }

        let new_pos = (x as usize, y as usize);
        if self.grid.exists(ObjectType::Agent, new_pos) {
            return None;
        }
        Some(new_pos)
    }

    /// Execute `Eat` actions for living agents standing on food
    fn consume(&mut self, actions: &ActionDict) {
        for (&id, action) in actions {
            let agent = &mut self.agents[id];
            if !agent.is_alive() || action.consume != Consume::Eat {
                continue;
            }
            let Some(pos) = agent.pos else {
                continue;
            };

            if self.grid.exists(ObjectType::Food, pos) {
                self.grid.remove(ObjectType::Food, pos);
                self.num_foods = self.num_foods.saturating_sub(1);
                let food_size = self.food_size.sample(&mut self.rng);
                agent.health = (agent.health + food_size).min(1.0);
            }
        }
    }

    /// Evaluate every living agent's reward network in parallel
    fn compute_rewards(
        &mut self,
        prev_health: &[f32],
        actions: &ActionDict,
    ) -> (BTreeMap<AgentId, f32>, BTreeMap<AgentId, AgentInfo>) {
        let results: Vec<(AgentId, f32, AgentInfo)> = self
            .agents
            .par_iter_mut()
            .filter(|agent| agent.is_active())
            .map(|agent| {
                let action = actions.get(&agent.id).copied().unwrap_or_default();
                let reward = agent.compute_reward(prev_health[agent.id], &action);
                let info = AgentInfo {
                    optimal_action_dist: agent.optimal_action_dist(),
                };
                (agent.id, reward, info)
            })
            .collect();

        let mut rewards = BTreeMap::new();
        let mut infos = BTreeMap::new();
        for (id, reward, info) in results {
            rewards.insert(id, reward);
            infos.insert(id, info);
        }
        (rewards, infos)
    }

    /// Age living agents, rebuild their observations and decide who is done
    fn age_agents(&mut self) -> (BTreeMap<AgentId, Observation>, BTreeMap<AgentId, bool>) {
        let aging_rate = self.config.env.aging_rate;
        let sight_len = self.config.env.sight_len;
        let food_gone = self.num_foods == 0;
        let grid = &self.grid;

        let results: Vec<(AgentId, Observation, bool)> = self
            .agents
            .par_iter_mut()
            .filter(|agent| agent.is_active())
            .map(|agent| {
                agent.health -= aging_rate;
                agent.age += 1;
                if let Some(pos) = agent.pos {
                    agent.observation = Observation::from_grid(grid, pos, sight_len);
                }
                let done = food_gone || agent.health <= 0.0;
                (agent.id, agent.observation.clone(), done)
            })
            .collect();

        let mut observations = BTreeMap::new();
        let mut dones = BTreeMap::new();
        for (id, obs, done) in results {
            observations.insert(id, obs);
            dones.insert(id, done);
        }
        (observations, dones)
    }

    /// Reset, then step with `policy` until every agent is done or `max_steps` pass.
    pub fn run_episode(
        &mut self,
        policy: &mut dyn Policy,
        max_steps: u64,
    ) -> Result<EpisodeSummary, EnvError> {
        self.reset()?;
        let mut finished = false;

        while self.iteration < max_steps {
            let mut actions = self.get_action_dict(policy);
            let result = self.step(&mut actions)?;
            if result.dones.all {
                finished = true;
                break;
            }
        }

        Ok(EpisodeSummary {
            steps: self.iteration,
            finished,
            mean_total_reward: self.mean_total_reward(),
            survivors: self.population(),
            foods_left: self.num_foods,
        })
    }

    /// Mean of every agent's total reward
    pub fn mean_total_reward(&self) -> f32 {
        if self.agents.is_empty() {
            return 0.0;
        }
        self.agents.iter().map(|agent| agent.total_reward).sum::<f32>() / self.agents.len() as f32
    }

    /// Number of agents still on the grid
    pub fn population(&self) -> usize {
        self.agents.iter().filter(|agent| agent.is_active()).count()
    }

    /// Current observation of every agent
    pub fn observations(&self) -> BTreeMap<AgentId, Observation> {
        self.agents
            .iter()
            .map(|agent| (agent.id, agent.observation.clone()))
            .collect()
    }

    /// Whether the last step ended the episode
    pub fn is_done(&self) -> bool {
        self.dones.all
    }

    pub fn initial_num_foods(&self) -> usize {
        self.initial_num_foods
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                // Agents draw over food
                let marker = if self.grid.exists(ObjectType::Agent, (x, y)) {
                    'B'
                } else if self.grid.exists(ObjectType::Food, (x, y)) {
                    '*'
                } else {
                    '_'
                };
                write!(f, "{} ", marker)?;
            }
            writeln!(f)?;
        }

        for agent in self.agents.iter().filter(|agent| agent.is_active()) {
            writeln!(f, "Agent {}: {}", agent.id, agent)?;
        }
        writeln!(f)?;
        writeln!(f, "Dones: {}", self.dones)
    }
}
