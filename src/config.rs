// src/config.rs
//
// Central configuration for the optistop trainer.
//
// One plain struct shared by both training regimes. Validation is fail-fast:
// a bad configuration is rejected before any model is built or any training
// work starts.

use anyhow::{bail, Result};

use crate::stop::HorizonPolicy;

/// Configuration shared by the supervised and reinforcement loops.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of candidates per scenario (the episode horizon T).
    pub horizon: usize,
    /// GRU hidden state size.
    pub hidden: usize,
    /// Samples per supervised mini-batch.
    pub batch_size: usize,
    /// Adam step size.
    pub step_size: f64,
    /// Supervised gradient steps to run.
    pub iterations: usize,
    /// Emit a supervised log line every this many iterations.
    pub log_interval: usize,
    /// Reinforcement rounds to run.
    pub rounds: usize,
    /// On-policy episodes collected per round.
    pub episodes_per_round: usize,
    /// Gradient steps taken on each round's episode batch.
    pub steps_per_round: usize,
    /// Probability of overriding the greedy action with a uniform random one.
    ///
    /// `None` auto-derives epsilon so that a never-stopping policy reaches
    /// the final timestep without a forced random stop with probability 1/T.
    pub exploration: Option<f64>,
    /// How the stopping distribution treats leftover mass at the horizon.
    pub horizon_policy: HorizonPolicy,
    /// Base RNG seed for sample generation and exploration.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            horizon: 50,
            hidden: 40,
            batch_size: 4,
            step_size: 1e-3,
            iterations: 20_000,
            log_interval: 4,
            rounds: 200,
            episodes_per_round: 32,
            steps_per_round: 8,
            exploration: None,
            horizon_policy: HorizonPolicy::Absorb,
            seed: 0,
        }
    }
}

impl TrainConfig {
    /// Rejects configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            bail!("horizon must be positive");
        }
        if self.hidden == 0 {
            bail!("hidden size must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            bail!("step size must be positive and finite");
        }
        if self.log_interval == 0 {
            bail!("log interval must be positive");
        }
        if self.episodes_per_round == 0 || self.steps_per_round == 0 {
            bail!("episodes/steps per round must be positive");
        }
        if let Some(eps) = self.exploration {
            if !(0.0..=1.0).contains(&eps) {
                bail!("exploration must lie in [0, 1], got {eps}");
            }
        }
        Ok(())
    }

    /// Effective exploration coefficient.
    ///
    /// When unset, solves `(1 - eps/2)^T = 1/T`: under a never-stopping
    /// policy, random overrides force a stop before the horizon with
    /// probability `1 - 1/T`.
    pub fn effective_exploration(&self) -> f64 {
        match self.exploration {
            Some(eps) => eps,
            None => {
                let t = self.horizon as f64;
                2.0 * (1.0 - (1.0 / t).powf(1.0 / t))
            }
        }
    }
}
