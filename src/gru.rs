// src/gru.rs
//
// A hand-differentiated gated recurrent unit over a flat parameter vector.
//
// The whole model (GRU gates + the dense decision head in model.rs) lives in
// one `Vec<f64>`; `Layout` names the ranges. Keeping parameters flat makes
// the optimizer a pair of same-shaped vectors and makes checkpointing a
// single array, at the cost of indexing through the layout here.
//
// Gate equations (input is the scalar comparison bit x, hidden size H):
//
//   z = sigmoid(Wz x + Uz h_prev + bz)        update gate
//   r = sigmoid(Wr x + Ur h_prev + br)        reset gate
//   c = tanh(Wc x + Uc (r .* h_prev) + bc)    candidate state
//   h = (1 - z) .* h_prev + z .* c
//
// The backward pass is the exact reverse-mode derivative of these equations,
// accumulating parameter gradients into a caller-supplied buffer and
// returning the gradient with respect to the previous hidden state so a
// sequence can be folded back step by step.

use std::ops::Range;

/// Named ranges into the flat parameter vector.
///
/// Order: input weights (Wz, Wr, Wc), recurrent matrices (Uz, Ur, Uc,
/// row-major, row i = destination unit), gate biases (bz, br, bc), then the
/// decision head (2xH weights, 2 biases).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub hidden: usize,
}

impl Layout {
    pub fn new(hidden: usize) -> Self {
        Self { hidden }
    }

    /// Total parameter count: 3H^2 + 8H + 2.
    pub fn total(&self) -> usize {
        let h = self.hidden;
        3 * h * h + 8 * h + 2
    }

    pub fn wz(&self) -> Range<usize> {
        let h = self.hidden;
        0..h
    }

    pub fn wr(&self) -> Range<usize> {
        let h = self.hidden;
        h..2 * h
    }

    pub fn wc(&self) -> Range<usize> {
        let h = self.hidden;
        2 * h..3 * h
    }

    pub fn uz(&self) -> Range<usize> {
        let h = self.hidden;
        3 * h..3 * h + h * h
    }

    pub fn ur(&self) -> Range<usize> {
        let h = self.hidden;
        3 * h + h * h..3 * h + 2 * h * h
    }

    pub fn uc(&self) -> Range<usize> {
        let h = self.hidden;
        3 * h + 2 * h * h..3 * h + 3 * h * h
    }

    pub fn bz(&self) -> Range<usize> {
        let h = self.hidden;
        3 * h + 3 * h * h..4 * h + 3 * h * h
    }

    pub fn br(&self) -> Range<usize> {
        let h = self.hidden;
        4 * h + 3 * h * h..5 * h + 3 * h * h
    }

    pub fn bc(&self) -> Range<usize> {
        let h = self.hidden;
        5 * h + 3 * h * h..6 * h + 3 * h * h
    }

    /// Decision head weights: row 0 = choose, row 1 = continue.
    pub fn head_w(&self) -> Range<usize> {
        let h = self.hidden;
        6 * h + 3 * h * h..8 * h + 3 * h * h
    }

    pub fn head_b(&self) -> Range<usize> {
        let h = self.hidden;
        8 * h + 3 * h * h..8 * h + 3 * h * h + 2
    }
}

/// Everything the backward pass needs from one forward step.
#[derive(Debug, Clone)]
pub struct StepCache {
    pub x: f64,
    pub h_prev: Vec<f64>,
    z: Vec<f64>,
    r: Vec<f64>,
    c: Vec<f64>,
    /// The new hidden state.
    pub h: Vec<f64>,
}

/// The recurrent cell itself; all parameters live in the caller's flat vec.
#[derive(Debug, Clone, Copy)]
pub struct GruCell {
    pub layout: Layout,
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl GruCell {
    pub fn new(hidden: usize) -> Self {
        Self {
            layout: Layout::new(hidden),
        }
    }

    /// Zero initial hidden state.
    pub fn init_state(&self) -> Vec<f64> {
        vec![0.0; self.layout.hidden]
    }

    /// Advance one timestep; the returned cache carries the new state in
    /// `h` plus the intermediates the backward pass needs.
    pub fn step(&self, params: &[f64], h_prev: &[f64], x: f64) -> StepCache {
        let h = self.layout.hidden;
        debug_assert_eq!(params.len(), self.layout.total());
        debug_assert_eq!(h_prev.len(), h);

        let wz = &params[self.layout.wz()];
        let wr = &params[self.layout.wr()];
        let wc = &params[self.layout.wc()];
        let uz = &params[self.layout.uz()];
        let ur = &params[self.layout.ur()];
        let uc = &params[self.layout.uc()];
        let bz = &params[self.layout.bz()];
        let br = &params[self.layout.br()];
        let bc = &params[self.layout.bc()];

        let mut z = vec![0.0; h];
        let mut r = vec![0.0; h];
        for i in 0..h {
            let row = i * h;
            let mut az = wz[i] * x + bz[i];
            let mut ar = wr[i] * x + br[i];
            for j in 0..h {
                az += uz[row + j] * h_prev[j];
                ar += ur[row + j] * h_prev[j];
            }
            z[i] = sigmoid(az);
            r[i] = sigmoid(ar);
        }

        let mut c = vec![0.0; h];
        for i in 0..h {
            let row = i * h;
            let mut ac = wc[i] * x + bc[i];
            for j in 0..h {
                ac += uc[row + j] * r[j] * h_prev[j];
            }
            c[i] = ac.tanh();
        }

        let mut h_new = vec![0.0; h];
        for i in 0..h {
            h_new[i] = (1.0 - z[i]) * h_prev[i] + z[i] * c[i];
        }

        StepCache {
            x,
            h_prev: h_prev.to_vec(),
            z,
            r,
            c,
            h: h_new,
        }
    }

    /// Reverse one timestep: `d_h` is the gradient flowing into the step's
    /// output state. Parameter gradients accumulate into `grads`
    /// (same layout as the params); the return value is the gradient with
    /// respect to the previous hidden state.
    pub fn step_backward(
        &self,
        params: &[f64],
        cache: &StepCache,
        d_h: &[f64],
        grads: &mut [f64],
    ) -> Vec<f64> {
        let h = self.layout.hidden;
        debug_assert_eq!(d_h.len(), h);
        debug_assert_eq!(grads.len(), self.layout.total());

        let uz_off = self.layout.uz().start;
        let ur_off = self.layout.ur().start;
        let uc_off = self.layout.uc().start;
        let wz_off = self.layout.wz().start;
        let wr_off = self.layout.wr().start;
        let wc_off = self.layout.wc().start;
        let bz_off = self.layout.bz().start;
        let br_off = self.layout.br().start;
        let bc_off = self.layout.bc().start;

        let x = cache.x;
        let h_prev = &cache.h_prev;

        // Pre-activation gradients for the update gate and candidate.
        let mut da_z = vec![0.0; h];
        let mut da_c = vec![0.0; h];
        let mut d_hprev = vec![0.0; h];
        for i in 0..h {
            let z = cache.z[i];
            let c = cache.c[i];
            let dz = d_h[i] * (c - h_prev[i]);
            da_z[i] = dz * z * (1.0 - z);
            da_c[i] = d_h[i] * z * (1.0 - c * c);
            d_hprev[i] = d_h[i] * (1.0 - z);
        }

        // Gradient reaching the reset-gated state r .* h_prev.
        let mut d_rh = vec![0.0; h];
        for i in 0..h {
            let row = uc_off + i * h;
            let g = da_c[i];
            for j in 0..h {
                d_rh[j] += params[row + j] * g;
            }
        }

        let mut da_r = vec![0.0; h];
        for j in 0..h {
            let r = cache.r[j];
            let dr = d_rh[j] * h_prev[j];
            da_r[j] = dr * r * (1.0 - r);
            d_hprev[j] += d_rh[j] * r;
        }

        // Recurrent contributions back into the previous state.
        for i in 0..h {
            let zrow = uz_off + i * h;
            let rrow = ur_off + i * h;
            for j in 0..h {
                d_hprev[j] += params[zrow + j] * da_z[i] + params[rrow + j] * da_r[i];
            }
        }

        // Parameter gradient accumulation.
        for i in 0..h {
            grads[wz_off + i] += da_z[i] * x;
            grads[wr_off + i] += da_r[i] * x;
            grads[wc_off + i] += da_c[i] * x;
            grads[bz_off + i] += da_z[i];
            grads[br_off + i] += da_r[i];
            grads[bc_off + i] += da_c[i];
            let row = i * h;
            for j in 0..h {
                grads[uz_off + row + j] += da_z[i] * h_prev[j];
                grads[ur_off + row + j] += da_r[i] * h_prev[j];
                grads[uc_off + row + j] += da_c[i] * cache.r[j] * h_prev[j];
            }
        }

        d_hprev
    }
}
