// src/model.rs
//
// The stopping policy model: GRU encoder over comparison bits plus a dense
// two-output decision head, all on one flat parameter vector.
//
// Value pair convention: index 0 is the expected reward of choosing the
// current candidate, index 1 of continuing. Inference compares the two at
// the final timestep; training runs whole sequences through `forward` /
// `backward` with the tape caching per-step activations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::gru::{GruCell, StepCache};

/// Index of the choose/stop value in a decision pair.
pub const CHOOSE: usize = 0;
/// Index of the continue value in a decision pair.
pub const CONTINUE: usize = 1;

/// Checkpoint schema version. Increment when the layout changes.
const MODEL_VERSION: u32 = 1;

/// Fraction of stopping probability the fresh-init policy leaves for the
/// final timestep; sets the initial choose bias.
const INIT_TAIL_MASS: f64 = 0.2;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    version: u32,
    hidden: usize,
    params: Vec<f64>,
}

/// Per-step activation tape for backpropagation through a sequence.
#[derive(Debug, Clone, Default)]
pub struct Tape {
    steps: Vec<StepCache>,
}

impl Tape {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// The trainable policy.
#[derive(Debug, Clone)]
pub struct Model {
    cell: GruCell,
    params: Vec<f64>,
}

impl Model {
    /// Fresh model with randomized weights.
    ///
    /// Weights are uniform in ±1/sqrt(H); biases start at zero except the
    /// choose bias, set to `ln(1 - 0.2^(1/T))` so that under the initial
    /// policy roughly 0.2 probability mass survives to the final timestep
    /// instead of collapsing to always-stop.
    pub fn new<R: Rng>(hidden: usize, horizon: usize, rng: &mut R) -> Self {
        let cell = GruCell::new(hidden);
        let layout = cell.layout;
        let mut params = vec![0.0; layout.total()];

        let scale = 1.0 / (hidden as f64).sqrt();
        for range in [
            layout.wz(),
            layout.wr(),
            layout.wc(),
            layout.uz(),
            layout.ur(),
            layout.uc(),
            layout.head_w(),
        ] {
            for p in &mut params[range] {
                *p = rng.gen_range(-scale..=scale);
            }
        }
        params[layout.head_b().start + CHOOSE] = start_bias(horizon);

        Self { cell, params }
    }

    pub fn hidden(&self) -> usize {
        self.cell.layout.hidden
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    /// Zero hidden state for incremental stepping.
    pub fn init_state(&self) -> Vec<f64> {
        self.cell.init_state()
    }

    /// Advance one timestep in place and return the decision-value pair.
    pub fn step(&self, state: &mut Vec<f64>, bit: bool) -> [f64; 2] {
        let cache = self.cell.step(&self.params, state, encode_bit(bit));
        let values = self.head(&cache.h);
        *state = cache.h;
        values
    }

    /// Decision-value pairs for a whole comparison sequence (inference).
    pub fn action_values(&self, bits: &[bool]) -> Vec<[f64; 2]> {
        let mut state = self.init_state();
        bits.iter().map(|&b| self.step(&mut state, b)).collect()
    }

    /// Whether to select the final candidate of the sequence.
    pub fn should_choose(&self, bits: &[bool]) -> bool {
        match self.action_values(bits).last() {
            Some(v) => v[CHOOSE] > v[CONTINUE],
            None => false,
        }
    }

    /// Whole-sequence forward pass with a tape for backprop.
    pub fn forward(&self, bits: &[bool]) -> (Vec<[f64; 2]>, Tape) {
        let mut tape = Tape::default();
        let mut state = self.init_state();
        let mut values = Vec::with_capacity(bits.len());
        for &bit in bits {
            let cache = self.cell.step(&self.params, &state, encode_bit(bit));
            values.push(self.head(&cache.h));
            state.clone_from(&cache.h);
            tape.steps.push(cache);
        }
        (values, tape)
    }

    /// Backpropagate per-step value-pair gradients through the head and the
    /// recurrence, accumulating into `grads` (flat, same layout as params).
    pub fn backward(&self, tape: &Tape, d_values: &[[f64; 2]], grads: &mut [f64]) {
        assert_eq!(d_values.len(), tape.steps.len(), "tape/gradient mismatch");
        let h = self.cell.layout.hidden;
        let mut carried = vec![0.0; h];
        for (cache, dv) in tape.steps.iter().zip(d_values).rev() {
            let mut d_h = carried;
            self.head_backward(&cache.h, dv, &mut d_h, grads);
            carried = self.cell.step_backward(&self.params, cache, &d_h, grads);
        }
    }

    fn head(&self, hidden: &[f64]) -> [f64; 2] {
        let layout = self.cell.layout;
        let h = layout.hidden;
        let w = &self.params[layout.head_w()];
        let b = &self.params[layout.head_b()];
        let mut out = [b[CHOOSE], b[CONTINUE]];
        for (k, o) in out.iter_mut().enumerate() {
            let row = k * h;
            for j in 0..h {
                *o += w[row + j] * hidden[j];
            }
        }
        out
    }

    fn head_backward(&self, hidden: &[f64], d_out: &[f64; 2], d_hidden: &mut [f64], grads: &mut [f64]) {
        let layout = self.cell.layout;
        let h = layout.hidden;
        let w_off = layout.head_w().start;
        let b_off = layout.head_b().start;
        for k in 0..2 {
            let g = d_out[k];
            grads[b_off + k] += g;
            let row = w_off + k * h;
            for j in 0..h {
                grads[row + j] += g * hidden[j];
                d_hidden[j] += self.params[row + j] * g;
            }
        }
    }

    /// Loads a checkpoint. Missing, unreadable, or malformed files all mean
    /// "no existing model": the caller falls back to a fresh init.
    pub fn load(path: &Path) -> Option<Model> {
        let data = fs::read_to_string(path).ok()?;
        let file: ModelFile = serde_json::from_str(&data).ok()?;
        if file.version != MODEL_VERSION || file.hidden == 0 {
            return None;
        }
        let cell = GruCell::new(file.hidden);
        if file.params.len() != cell.layout.total() {
            return None;
        }
        Some(Model {
            cell,
            params: file.params,
        })
    }

    /// Writes the checkpoint. Failures here are fatal to the caller: the
    /// saved artifact is the whole point of a training run.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ModelFile {
            version: MODEL_VERSION,
            hidden: self.hidden(),
            params: self.params.clone(),
        };
        let data = serde_json::to_string(&file).context("serialize model")?;
        fs::write(path, data).with_context(|| format!("write model file {}", path.display()))?;
        Ok(())
    }
}

fn encode_bit(bit: bool) -> f64 {
    if bit {
        1.0
    } else {
        0.0
    }
}

/// Choose bias giving a fresh policy `tail^(1/T)` per-step continue odds.
fn start_bias(horizon: usize) -> f64 {
    let t = horizon.max(1) as f64;
    (1.0 - INIT_TAIL_MASS.powf(1.0 / t)).ln()
}
