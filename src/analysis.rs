//! Training analysis: per-agent moving averages and age-weighted aggregates.

use crate::action::{Action, Consume};
use crate::agent::AgentId;
use crate::config::Config;
use crate::env::{AgentInfo, Env};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric values tracked across training
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub policy_scores: BTreeMap<AgentId, f32>,
    pub value_losses: BTreeMap<AgentId, f32>,
    pub action_losses: BTreeMap<AgentId, f32>,
    pub dist_entropies: BTreeMap<AgentId, f32>,
    pub total_losses: BTreeMap<AgentId, f32>,
    pub food_scores: BTreeMap<AgentId, f32>,
    pub policy_score: f32,
    pub value_loss: f32,
    pub action_loss: f32,
    pub dist_entropy: f32,
    pub total_loss: f32,
    pub initial_policy_score: f32,
    pub food_score: f32,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            policy_scores: BTreeMap::new(),
            value_losses: BTreeMap::new(),
            action_losses: BTreeMap::new(),
            dist_entropies: BTreeMap::new(),
            total_losses: BTreeMap::new(),
            food_scores: BTreeMap::new(),
            policy_score: f32::INFINITY,
            value_loss: f32::INFINITY,
            action_loss: f32::INFINITY,
            dist_entropy: f32::INFINITY,
            total_loss: f32::INFINITY,
            initial_policy_score: f32::INFINITY,
            food_score: f32::INFINITY,
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-agent training losses: value, action and entropy
pub struct Losses<'a> {
    pub value: &'a BTreeMap<AgentId, f32>,
    pub action: &'a BTreeMap<AgentId, f32>,
    pub entropy: &'a BTreeMap<AgentId, f32>,
}

/// Average of `losses` weighted by the age of each agent.
///
/// Ages are normalized over the whole population; agents without an entry
/// in `losses` contribute nothing.
pub fn aggregate_loss(env: &Env, losses: &BTreeMap<AgentId, f32>) -> f32 {
    let age_sum: u64 = env.agents.iter().map(|agent| agent.age as u64).sum();
    if age_sum == 0 {
        return 0.0;
    }

    env.agents
        .iter()
        .filter_map(|agent| {
            losses
                .get(&agent.id)
                .map(|loss| loss * agent.age as f32 / age_sum as f32)
        })
        .sum()
}

/// KL divergence `KL(target || dist)`
pub fn kl_divergence(target: &[f32], dist: &[f32]) -> f32 {
    target
        .iter()
        .zip(dist)
        .filter(|(p, _)| **p > 0.0)
        .map(|(&p, &q)| p * (p.ln() - q.ln()))
        .sum()
}

#[inline]
fn ema(alpha: f32, previous: Option<f32>, value: f32) -> f32 {
    match previous {
        Some(prev) => alpha * prev + (1.0 - alpha) * value,
        None => value,
    }
}

/// Update policy scores from the agents' action distributions.
///
/// Each agent's timestep score is the divergence between the optimal action
/// distribution reported by the environment and the policy's distribution.
/// Returns a new `Metrics`; `metrics` is not mutated.
pub fn update_policy_score(
    env: &Env,
    config: &Config,
    infos: &BTreeMap<AgentId, AgentInfo>,
    action_dists: &BTreeMap<AgentId, Vec<f32>>,
    metrics: &Metrics,
) -> Metrics {
    let mut new_metrics = metrics.clone();

    for (id, info) in infos {
        let Some(dist) = action_dists.get(id) else {
            continue;
        };
        let score = kl_divergence(&info.optimal_action_dist, dist);
        let previous = metrics.policy_scores.get(id).copied();
        new_metrics
            .policy_scores
            .insert(*id, ema(config.analysis.ema_alpha, previous, score));
    }

    new_metrics.policy_score = aggregate_loss(env, &new_metrics.policy_scores);

    if new_metrics.policy_score.is_finite() && !metrics.policy_score.is_finite() {
        new_metrics.initial_policy_score = new_metrics.policy_score;
    }

    new_metrics
}

/// Score how strongly each agent's reward favors eating.
///
/// The per-agent score is `KL(uniform over Eat actions || optimal action dist)`;
/// `food_score` is their plain mean. With no agents on the grid the previous
/// `food_score` is kept. Returns a new `Metrics`; `metrics` is not mutated.
pub fn update_food_scores(env: &Env, metrics: &Metrics) -> Metrics {
    let mut new_metrics = metrics.clone();

    let actions = Action::all();
    let num_eat = actions.iter().filter(|a| a.consume == Consume::Eat).count();
    let eat_dist: Vec<f32> = actions
        .iter()
        .map(|a| if a.consume == Consume::Eat { 1.0 / num_eat as f32 } else { 0.0 })
        .collect();

    new_metrics.food_scores = env
        .agents
        .iter()
        .filter(|agent| agent.is_active())
        .map(|agent| (agent.id, kl_divergence(&eat_dist, &agent.optimal_action_dist())))
        .collect();

    if !new_metrics.food_scores.is_empty() {
        new_metrics.food_score = new_metrics.food_scores.values().sum::<f32>()
            / new_metrics.food_scores.len() as f32;
    }

    new_metrics
}

/// Store training losses and their age-weighted aggregates.
///
/// Returns a new `Metrics`; `metrics` is not mutated.
pub fn update_losses(
    env: &Env,
    config: &Config,
    losses: Losses<'_>,
    metrics: &Metrics,
) -> Metrics {
    let mut new_metrics = metrics.clone();

    new_metrics.value_losses = losses.value.clone();
    new_metrics.action_losses = losses.action.clone();
    new_metrics.dist_entropies = losses.entropy.clone();

    new_metrics.total_losses = losses
        .value
        .iter()
        .filter_map(|(id, value)| {
            let action = losses.action.get(id)?;
            let entropy = losses.entropy.get(id)?;
            Some((
                *id,
                value * config.analysis.value_loss_coef + action
                    - entropy * config.analysis.entropy_coef,
            ))
        })
        .collect();

    new_metrics.value_loss = aggregate_loss(env, &new_metrics.value_losses);
    new_metrics.action_loss = aggregate_loss(env, &new_metrics.action_losses);
    new_metrics.dist_entropy = aggregate_loss(env, &new_metrics.dist_entropies);
    new_metrics.total_loss = aggregate_loss(env, &new_metrics.total_losses);

    new_metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardInput;
    use crate::reward::RewardNet;
    use crate::sink::NullSink;

    fn env_with_ages(ages: &[u32]) -> Env {
        let mut config = Config::default();
        config.env.num_agents = ages.len();
        let mut env = Env::new_with_seed(config, 1, Box::new(NullSink)).unwrap();
        for (agent, &age) in env.agents.iter_mut().zip(ages) {
            agent.age = age;
        }
        env
    }

    #[test]
    fn test_aggregate_loss_weights_by_age() {
        let env = env_with_ages(&[1, 3]);
        let losses: BTreeMap<AgentId, f32> = [(0, 4.0), (1, 8.0)].into_iter().collect();
        assert!((aggregate_loss(&env, &losses) - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_loss_skips_missing_agents() {
        let env = env_with_ages(&[2, 2]);
        let losses: BTreeMap<AgentId, f32> = [(1, 10.0)].into_iter().collect();
        assert!((aggregate_loss(&env, &losses) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_loss_zero_ages() {
        let env = env_with_ages(&[0, 0]);
        let losses: BTreeMap<AgentId, f32> = [(0, 1.0)].into_iter().collect();
        assert_eq!(aggregate_loss(&env, &losses), 0.0);
    }

    #[test]
    fn test_kl_divergence() {
        let p = [0.5, 0.5];
        assert_eq!(kl_divergence(&p, &p), 0.0);
        let q = [0.25, 0.75];
        let expected = 0.5 * (0.5f32 / 0.25).ln() + 0.5 * (0.5f32 / 0.75).ln();
        assert!((kl_divergence(&p, &q) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_policy_score_ema_and_initial() {
        let env = env_with_ages(&[1]);
        let mut config = Config::default();
        config.analysis.ema_alpha = 0.5;

        let infos: BTreeMap<AgentId, AgentInfo> = [(
            0,
            AgentInfo {
                optimal_action_dist: vec![0.5, 0.5],
            },
        )]
        .into_iter()
        .collect();
        let far: BTreeMap<AgentId, Vec<f32>> = [(0, vec![0.25, 0.75])].into_iter().collect();
        let exact: BTreeMap<AgentId, Vec<f32>> = [(0, vec![0.5, 0.5])].into_iter().collect();

        let metrics = Metrics::new();
        let first = update_policy_score(&env, &config, &infos, &far, &metrics);
        let score = kl_divergence(&[0.5, 0.5], &[0.25, 0.75]);
        assert!((first.policy_scores[&0] - score).abs() < 1e-6);
        assert!((first.initial_policy_score - score).abs() < 1e-6);
        // Input left untouched
        assert!(metrics.policy_scores.is_empty());

        let second = update_policy_score(&env, &config, &infos, &exact, &first);
        assert!((second.policy_scores[&0] - score * 0.5).abs() < 1e-6);
        assert_eq!(second.initial_policy_score, first.initial_policy_score);
    }

    #[test]
    fn test_update_losses_total() {
        let env = env_with_ages(&[1, 1]);
        let mut config = Config::default();
        config.analysis.value_loss_coef = 0.5;
        config.analysis.entropy_coef = 0.1;

        let value: BTreeMap<AgentId, f32> = [(0, 2.0), (1, 4.0)].into_iter().collect();
        let action: BTreeMap<AgentId, f32> = [(0, 1.0), (1, 1.0)].into_iter().collect();
        let entropy: BTreeMap<AgentId, f32> = [(0, 10.0), (1, 0.0)].into_iter().collect();

        let metrics = update_losses(
            &env,
            &config,
            Losses {
                value: &value,
                action: &action,
                entropy: &entropy,
            },
            &Metrics::new(),
        );

        assert!((metrics.total_losses[&0] - 1.0).abs() < 1e-6);
        assert!((metrics.total_losses[&1] - 3.0).abs() < 1e-6);
        assert!((metrics.value_loss - 3.0).abs() < 1e-6);
        assert!((metrics.total_loss - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_food_score_for_indifferent_reward() {
        let mut config = Config::default();
        config.env.num_agents = 1;
        config.reward.n_layers = 1;
        config.reward.reward_inputs = [RewardInput::Actions].into_iter().collect();
        let mut env = Env::new_with_seed(config, 3, Box::new(NullSink)).unwrap();
        env.reset().unwrap();
        env.agents[0]
            .set_reward_net(RewardNet::zeros(crate::action::NUM_ACTIONS, 1, 0))
            .unwrap();

        let metrics = Metrics::new();
        let updated = update_food_scores(&env, &metrics);

        // Uniform over 10 eat actions against uniform over all 20
        let expected = 2.0f32.ln();
        assert!((updated.food_scores[&0] - expected).abs() < 1e-5);
        assert!((updated.food_score - expected).abs() < 1e-5);
        assert!(metrics.food_scores.is_empty());
        assert_eq!(metrics.food_score, f32::INFINITY);
    }

    #[test]
    fn test_food_score_is_mean_of_agents() {
        let mut config = Config::default();
        config.env.num_agents = 3;
        let mut env = Env::new_with_seed(config, 4, Box::new(NullSink)).unwrap();
        env.reset().unwrap();

        let updated = update_food_scores(&env, &Metrics::new());
        assert_eq!(updated.food_scores.len(), 3);
        let mean = updated.food_scores.values().sum::<f32>() / 3.0;
        assert!((updated.food_score - mean).abs() < 1e-6);
        assert!(updated.food_scores.values().all(|&score| score >= -1e-6));
    }

    #[test]
    fn test_food_score_skips_removed_agents() {
        let mut config = Config::default();
        config.env.num_agents = 2;
        let mut env = Env::new_with_seed(config, 5, Box::new(NullSink)).unwrap();
        env.reset().unwrap();
        env.agents[1].pos = None;

        let updated = update_food_scores(&env, &Metrics::new());
        assert_eq!(updated.food_scores.keys().copied().collect::<Vec<_>>(), vec![0]);
    }
}
