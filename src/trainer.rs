// src/trainer.rs
//
// Training drivers for both regimes over one shared model.
//
// - Supervised: mini-batches of labeled random permutations, dot-product
//   cost against the stopping distribution, Adam steps.
// - Reinforcement: rounds of on-policy rollouts, then several gradient
//   steps on the frozen round's bootstrapped targets (the data goes
//   slightly stale relative to the parameters during those steps; accepted).
//
// Cost + gradient assembly lives in free functions on purpose: the
// finite-difference tests perturb parameters directly and re-evaluate them.
//
// Cancellation is cooperative: a shared flag polled once per gradient step
// and at round boundaries, never mid-step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::TrainConfig;
use crate::episode::{EpisodeSimulator, EpisodeTrace};
use crate::metrics::OnlineStats;
use crate::model::{Model, CHOOSE, CONTINUE};
use crate::sample::Sample;
use crate::stop::{stop_backward, stop_forward, HorizonPolicy};

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cooperative-cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Train-event sink
// ============================================================================

/// One supervised log point.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisedLog {
    pub iteration: usize,
    /// Cost of the current batch under the pre-step parameters.
    pub cost: f64,
    /// Cost of the previously logged batch under the current parameters,
    /// for drift monitoring. None on the first log point.
    pub last_batch_cost: Option<f64>,
}

/// One reinforcement-round log point.
#[derive(Debug, Clone, Serialize)]
pub struct RoundLog {
    pub round: usize,
    pub episodes: usize,
    /// Mean terminal reward across the round's episodes.
    pub mean_reward: f64,
    /// Mean episode length in steps.
    pub mean_length: f64,
    /// Episode cost after the round's last gradient step.
    pub cost: f64,
}

/// Train events emitted through the sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainEvent {
    Supervised(SupervisedLog),
    Round(RoundLog),
}

/// Abstract sink for periodic training telemetry.
pub trait TrainSink {
    fn record(&mut self, event: &TrainEvent);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TrainSink for NoopSink {
    fn record(&mut self, _event: &TrainEvent) {
        // intentionally no-op
    }
}

/// Sink printing one line per event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl TrainSink for StdoutSink {
    fn record(&mut self, event: &TrainEvent) {
        match event {
            TrainEvent::Supervised(s) => match s.last_batch_cost {
                Some(last) => {
                    println!("iter {}: cost={:.6} last={:.6}", s.iteration, s.cost, last)
                }
                None => println!("iter {}: cost={:.6}", s.iteration, s.cost),
            },
            TrainEvent::Round(r) => println!(
                "round {}: reward={:.4} len={:.1} cost={:.4}",
                r.round, r.mean_reward, r.mean_length, r.cost
            ),
        }
    }
}

// ============================================================================
// Adam
// ============================================================================

/// Adam over the flat parameter vector.
#[derive(Debug, Clone)]
pub struct Adam {
    step_size: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(step_size: f64, dim: usize) -> Self {
        Self {
            step_size,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: vec![0.0; dim],
            v: vec![0.0; dim],
        }
    }

    /// One bias-corrected descent step.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        debug_assert_eq!(params.len(), self.m.len());
        debug_assert_eq!(grads.len(), self.m.len());
        self.t += 1;
        let c1 = 1.0 - self.beta1.powi(self.t);
        let c2 = 1.0 - self.beta2.powi(self.t);
        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = self.m[i] / c1;
            let v_hat = self.v[i] / c2;
            params[i] -= self.step_size * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

// ============================================================================
// Cost assembly
// ============================================================================

/// Supervised batch cost: minus the mean probability the stopping
/// distribution assigns to the true best candidate's position.
pub fn supervised_cost(model: &Model, batch: &[Sample], policy: HorizonPolicy) -> f64 {
    let mut cost = 0.0;
    for sample in batch {
        let bits = sample.comparisons();
        let values = model.action_values(&bits);
        let energies: Vec<f64> = values.iter().map(|v| v[CHOOSE] - v[CONTINUE]).collect();
        let fwd = stop_forward(&energies, policy);
        cost -= fwd.probs[sample.best_index()];
    }
    cost / batch.len() as f64
}

/// Supervised cost plus its gradient, accumulated into `grads`.
pub fn supervised_cost_and_grad(
    model: &Model,
    batch: &[Sample],
    policy: HorizonPolicy,
    grads: &mut [f64],
) -> f64 {
    let scale = 1.0 / batch.len() as f64;
    let mut cost = 0.0;
    for sample in batch {
        let bits = sample.comparisons();
        let (values, tape) = model.forward(&bits);
        let energies: Vec<f64> = values.iter().map(|v| v[CHOOSE] - v[CONTINUE]).collect();
        let fwd = stop_forward(&energies, policy);
        let best = sample.best_index();
        cost -= fwd.probs[best] * scale;

        let mut upstream = vec![0.0; bits.len()];
        upstream[best] = -scale;
        let d_energy = stop_backward(&fwd, &upstream);
        let d_values: Vec<[f64; 2]> = d_energy.iter().map(|&g| [g, -g]).collect();
        model.backward(&tape, &d_values, grads);
    }
    cost
}

/// Episode batch cost: squared error between predicted value pairs and the
/// recorded bootstrap targets, summed across timesteps and episodes.
pub fn episode_cost(model: &Model, traces: &[EpisodeTrace]) -> f64 {
    let mut cost = 0.0;
    for trace in traces {
        let values = model.action_values(&trace.bits);
        for (v, tgt) in values.iter().zip(&trace.targets) {
            for k in [CHOOSE, CONTINUE] {
                let d = v[k] - tgt[k];
                cost += d * d;
            }
        }
    }
    cost
}

/// Episode cost plus its semi-gradient (targets held constant), accumulated
/// into `grads`.
pub fn episode_cost_and_grad(model: &Model, traces: &[EpisodeTrace], grads: &mut [f64]) -> f64 {
    let mut cost = 0.0;
    for trace in traces {
        let (values, tape) = model.forward(&trace.bits);
        let mut d_values = vec![[0.0; 2]; values.len()];
        for (t, (v, tgt)) in values.iter().zip(&trace.targets).enumerate() {
            for k in [CHOOSE, CONTINUE] {
                let d = v[k] - tgt[k];
                cost += d * d;
                d_values[t][k] = 2.0 * d;
            }
        }
        model.backward(&tape, &d_values, grads);
    }
    cost
}

// ============================================================================
// Trainer
// ============================================================================

/// Owns the model, optimizer state, and the run RNG for both regimes.
#[derive(Debug)]
pub struct Trainer {
    pub model: Model,
    cfg: TrainConfig,
    opt: Adam,
    rng: ChaCha8Rng,
}

impl Trainer {
    pub fn new(model: Model, cfg: TrainConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let opt = Adam::new(cfg.step_size, model.num_params());
        let rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        Ok(Self {
            model,
            cfg,
            opt,
            rng,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.cfg
    }

    /// Supervised pretraining: fresh batch per iteration, one Adam step
    /// each, periodic drift logging against the previously logged batch.
    pub fn run_supervised(&mut self, sink: &mut dyn TrainSink, cancel: &CancelToken) {
        let mut grads = vec![0.0; self.model.num_params()];
        let mut last_batch: Option<Vec<Sample>> = None;

        for iteration in 0..self.cfg.iterations {
            if cancel.is_cancelled() {
                break;
            }
            let batch: Vec<Sample> = (0..self.cfg.batch_size)
                .map(|_| Sample::random(self.cfg.horizon, &mut self.rng))
                .collect();

            grads.iter_mut().for_each(|g| *g = 0.0);
            let cost = supervised_cost_and_grad(
                &self.model,
                &batch,
                self.cfg.horizon_policy,
                &mut grads,
            );
            self.opt.step(self.model.params_mut(), &grads);

            if iteration % self.cfg.log_interval == 0 {
                let last_batch_cost = last_batch
                    .as_ref()
                    .map(|b| supervised_cost(&self.model, b, self.cfg.horizon_policy));
                sink.record(&TrainEvent::Supervised(SupervisedLog {
                    iteration,
                    cost,
                    last_batch_cost,
                }));
                last_batch = Some(batch);
            }
        }
    }

    /// Reinforcement fine-tuning: each round collects on-policy episodes
    /// under the current parameters, then takes several gradient steps on
    /// that frozen batch of traces.
    pub fn run_reinforce(&mut self, sink: &mut dyn TrainSink, cancel: &CancelToken) {
        let sim = EpisodeSimulator::from_config(&self.cfg);
        let mut grads = vec![0.0; self.model.num_params()];

        'rounds: for round in 0..self.cfg.rounds {
            if cancel.is_cancelled() {
                break;
            }
            let mut rewards = OnlineStats::default();
            let mut lengths = OnlineStats::default();
            let traces: Vec<EpisodeTrace> = (0..self.cfg.episodes_per_round)
                .map(|_| {
                    let trace = sim.run(&self.model, &mut self.rng);
                    rewards.add(trace.reward);
                    lengths.add(trace.bits.len() as f64);
                    trace
                })
                .collect();

            let mut cost = 0.0;
            for _ in 0..self.cfg.steps_per_round {
                if cancel.is_cancelled() {
                    break 'rounds;
                }
                grads.iter_mut().for_each(|g| *g = 0.0);
                cost = episode_cost_and_grad(&self.model, &traces, &mut grads);
                self.opt.step(self.model.params_mut(), &grads);
            }

            sink.record(&TrainEvent::Round(RoundLog {
                round,
                episodes: traces.len(),
                mean_reward: rewards.mean(),
                mean_length: lengths.mean(),
                cost,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_round_trips() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn adam_descends_a_quadratic() {
        // Minimize (p - 3)^2 from 0; gradient 2(p - 3).
        let mut params = vec![0.0];
        let mut adam = Adam::new(0.1, 1);
        for _ in 0..500 {
            let grads = vec![2.0 * (params[0] - 3.0)];
            adam.step(&mut params, &grads);
        }
        assert!((params[0] - 3.0).abs() < 1e-3, "got {}", params[0]);
    }
}
