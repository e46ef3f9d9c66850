// src/stop.rs
//
// The stop activation: a "temporal softmax" over an episode horizon.
//
// Each timestep t carries a raw energy e_t. Softmax over the pair (0, e_t)
// gives the conditional probability of stopping at t given we have not
// stopped yet, which reduces to sigmoid(e_t). The absolute stopping
// probability is that conditional times the probability mass still
// remaining, tracked by a single scalar accumulator across the sweep. Both
// the forward transform and its exact reverse-mode gradient are linear in
// the horizon length.
//
// Exposed as pure functions on plain slices so the gradient can be verified
// against finite differences without touching any model code.

/// What happens to probability mass still unspent at the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonPolicy {
    /// The literal recurrence: the distribution may sum to less than 1,
    /// with the leftover mass "leaking" past the horizon.
    Leak,
    /// The final timestep absorbs all remaining mass, so the distribution
    /// sums to exactly 1. The final energy then has no direct gradient path
    /// of its own; it is constrained only through earlier timesteps.
    Absorb,
}

impl HorizonPolicy {
    /// Stable lowercase name (used in logs and run headers).
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizonPolicy::Leak => "leak",
            HorizonPolicy::Absorb => "absorb",
        }
    }
}

/// Forward-pass record: outputs plus the cached intermediates the backward
/// sweep needs.
#[derive(Debug, Clone)]
pub struct StopForward {
    /// Absolute stopping probability per timestep.
    pub probs: Vec<f64>,
    /// Conditional stop probability per timestep, sigmoid(e_t).
    cond: Vec<f64>,
    /// Remaining mass entering each timestep; cum[0] = 1.
    cum: Vec<f64>,
    policy: HorizonPolicy,
}

impl StopForward {
    /// Log of each absolute stopping probability.
    pub fn log_probs(&self) -> Vec<f64> {
        self.probs.iter().map(|p| p.ln()).collect()
    }

    /// Total mass assigned within the horizon.
    pub fn total_mass(&self) -> f64 {
        self.probs.iter().sum()
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Maps per-timestep energies to absolute stopping probabilities.
///
/// Single forward sweep carrying one scalar of remaining mass. An empty
/// energy slice yields an empty distribution.
pub fn stop_forward(energies: &[f64], policy: HorizonPolicy) -> StopForward {
    let n = energies.len();
    let mut cond = Vec::with_capacity(n);
    let mut cum = Vec::with_capacity(n);
    let mut probs = Vec::with_capacity(n);

    let mut remaining = 1.0;
    for &e in energies {
        let p = sigmoid(e);
        cond.push(p);
        cum.push(remaining);
        probs.push(remaining * p);
        remaining *= 1.0 - p;
    }

    if policy == HorizonPolicy::Absorb {
        if let Some(last) = probs.last_mut() {
            // The final step resolves unconditionally.
            *last = cum[n - 1];
        }
    }

    StopForward {
        probs,
        cond,
        cum,
        policy,
    }
}

/// Exact gradient of the stopping probabilities with respect to the
/// energies, given the upstream gradient on the outputs.
///
/// Single reverse sweep with one scalar accumulator: at each step the
/// gradient on the conditional is `cum[t] * (u[t] - acc)`, after which the
/// accumulator folds in this timestep as `cond[t]*u[t] + (1-cond[t])*acc`.
/// Under `Absorb` the sweep is seeded with the upstream gradient of the
/// final (unconditional) output instead of zero, and the final conditional
/// itself gets no gradient.
pub fn stop_backward(fwd: &StopForward, upstream: &[f64]) -> Vec<f64> {
    let n = fwd.cond.len();
    assert_eq!(upstream.len(), n, "upstream gradient length mismatch");
    let mut grad = vec![0.0; n];
    if n == 0 {
        return grad;
    }

    let (mut acc, start) = match fwd.policy {
        HorizonPolicy::Leak => (0.0, n),
        HorizonPolicy::Absorb => (upstream[n - 1], n - 1),
    };

    for t in (0..start).rev() {
        let p = fwd.cond[t];
        let d_cond = fwd.cum[t] * (upstream[t] - acc);
        // Sigmoid local derivative takes the conditional back to the energy.
        grad[t] = d_cond * p * (1.0 - p);
        acc = p * upstream[t] + (1.0 - p) * acc;
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_horizon_yields_empty_distribution() {
        for policy in [HorizonPolicy::Leak, HorizonPolicy::Absorb] {
            let fwd = stop_forward(&[], policy);
            assert!(fwd.probs.is_empty());
            assert!(stop_backward(&fwd, &[]).is_empty());
        }
    }

    #[test]
    fn absorb_assigns_all_mass_to_lone_step() {
        let fwd = stop_forward(&[-30.0], HorizonPolicy::Absorb);
        assert_eq!(fwd.probs, vec![1.0]);
    }

    #[test]
    fn strong_continue_energies_leak_past_horizon() {
        let fwd = stop_forward(&[-30.0; 6], HorizonPolicy::Leak);
        assert!(fwd.total_mass() < 1e-6);
    }
}
