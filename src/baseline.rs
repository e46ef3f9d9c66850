// src/baseline.rs
//
// Monte-Carlo evaluation of the classical 1/e cutoff rule: observe the
// first T/e candidates without choosing, then take the first record after
// the cutoff. Used only as a reference point for trained policies; consumes
// no model state.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::metrics::OnlineStats;
use crate::sample::Sample;

/// Summary of a baseline run.
#[derive(Debug, Clone, Copy)]
pub struct BaselineReport {
    pub horizon: usize,
    pub trials: usize,
    /// Fraction of trials that selected the overall best candidate.
    pub success_rate: f64,
    /// Sample variance of the success indicator.
    pub variance: f64,
}

/// Whether the cutoff rule selects the best candidate of this scenario.
fn cutoff_rule_wins(sample: &Sample, cutoff: usize) -> bool {
    let perm = &sample.0;
    let mut best_head = perm.len();
    for &rank in &perm[..cutoff.min(perm.len())] {
        best_head = best_head.min(rank);
    }
    for &rank in &perm[cutoff.min(perm.len())..] {
        if rank < best_head {
            return rank == 0;
        }
    }
    false
}

/// Empirical success rate of the cutoff rule over random scenarios.
pub fn cutoff_rule_success(horizon: usize, trials: usize, seed: u64) -> BaselineReport {
    let cutoff = (horizon as f64 / std::f64::consts::E + 0.5) as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stats = OnlineStats::default();
    for _ in 0..trials {
        let sample = Sample::random(horizon, &mut rng);
        stats.add(if cutoff_rule_wins(&sample, cutoff) {
            1.0
        } else {
            0.0
        });
    }
    BaselineReport {
        horizon,
        trials,
        success_rate: stats.mean(),
        variance: stats.variance(),
    }
}
