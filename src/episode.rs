// src/episode.rs
//
// On-policy episode rollout for reinforcement fine-tuning.
//
// One episode walks a fresh random permutation, feeding each comparison bit
// through the model a step at a time. Actions are greedy over the predicted
// value pair with epsilon-random overrides for exploration. Targets are
// bootstrapped: a step's continue value is regressed toward the next step's
// max prediction (one-step TD), and the stop value of the terminal step
// toward the terminal reward. Components the episode never resolves keep the
// model's own prediction as their target, so they contribute no gradient.

use rand::Rng;

use crate::config::TrainConfig;
use crate::model::{Model, CHOOSE, CONTINUE};
use crate::sample::Sample;

/// Everything recorded from one rollout.
#[derive(Debug, Clone)]
pub struct EpisodeTrace {
    /// Comparison bits actually observed (truncated at the stop).
    pub bits: Vec<bool>,
    /// Per-step regression targets, same length as `bits`.
    pub targets: Vec<[f64; 2]>,
    /// Terminal reward: 1.0 iff the stopped candidate was the overall best.
    pub reward: f64,
    /// Index the policy stopped at; None if it ran off the horizon.
    pub stopped_at: Option<usize>,
}

/// Rollout driver: horizon plus exploration coefficient.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeSimulator {
    pub horizon: usize,
    pub exploration: f64,
}

impl EpisodeSimulator {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self {
            horizon: cfg.horizon,
            exploration: cfg.effective_exploration(),
        }
    }

    /// Runs one episode on a fresh random permutation.
    pub fn run<R: Rng>(&self, model: &Model, rng: &mut R) -> EpisodeTrace {
        let sample = Sample::random(self.horizon, rng);
        self.run_sample(model, &sample, rng)
    }

    /// Runs one episode on the given scenario.
    pub fn run_sample<R: Rng>(&self, model: &Model, sample: &Sample, rng: &mut R) -> EpisodeTrace {
        let comparisons = sample.comparisons();
        let mut state = model.init_state();
        let mut bits = Vec::new();
        let mut targets: Vec<[f64; 2]> = Vec::new();
        let mut pending: Option<[f64; 2]> = None;

        for (j, &bit) in comparisons.iter().enumerate() {
            let values = model.step(&mut state, bit);
            bits.push(bit);

            // The previous step chose to continue; bootstrap its continue
            // target from this step's best predicted value.
            if let Some(mut tgt) = pending.take() {
                tgt[CONTINUE] = values[CHOOSE].max(values[CONTINUE]);
                targets.push(tgt);
            }

            let greedy_stop = values[CHOOSE] > values[CONTINUE];
            let stop = if rng.gen::<f64>() < self.exploration {
                rng.gen::<bool>()
            } else {
                greedy_stop
            };

            if stop {
                let reward = if sample.is_best(j) { 1.0 } else { 0.0 };
                let mut tgt = values;
                tgt[CHOOSE] = reward;
                targets.push(tgt);
                return EpisodeTrace {
                    bits,
                    targets,
                    reward,
                    stopped_at: Some(j),
                };
            }
            pending = Some(values);
        }

        // Ran off the horizon still continuing: nothing further is
        // obtainable, so the last continue target is zero.
        let mut tgt = pending.expect("horizon is validated positive");
        tgt[CONTINUE] = 0.0;
        targets.push(tgt);
        EpisodeTrace {
            bits,
            targets,
            reward: 0.0,
            stopped_at: None,
        }
    }
}
