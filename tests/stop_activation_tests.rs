// tests/stop_activation_tests.rs
//
// Numerical contract of the stop activation:
// 1. Forward output matches the literal remaining-mass recurrence.
// 2. Outputs are a valid (sub-)distribution for arbitrary energies.
// 3. The analytic backward pass matches centered finite differences, both
//    per-energy and along random directions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use optistop::stop::{stop_backward, stop_forward, HorizonPolicy};

const FD_STEP: f64 = 1e-5;
const FD_TOL: f64 = 1e-6;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Scalar loss used by the finite-difference checks: upstream . probs.
fn loss(energies: &[f64], upstream: &[f64], policy: HorizonPolicy) -> f64 {
    stop_forward(energies, policy)
        .probs
        .iter()
        .zip(upstream)
        .map(|(p, u)| p * u)
        .sum()
}

#[test]
fn forward_matches_manual_recurrence() {
    let energies = [1.0, -1.0, 2.0];
    let fwd = stop_forward(&energies, HorizonPolicy::Leak);

    let mut remaining = 1.0;
    for (t, &e) in energies.iter().enumerate() {
        let p = sigmoid(e);
        let expected = remaining * p;
        assert!(
            (fwd.probs[t] - expected).abs() < 1e-12,
            "t={t}: {} vs {expected}",
            fwd.probs[t]
        );
        remaining *= 1.0 - p;
    }
}

#[test]
fn absorb_moves_exactly_the_leftover_mass_to_the_end() {
    let energies = [0.3, -1.2, 0.7, -0.4];
    let leak = stop_forward(&energies, HorizonPolicy::Leak);
    let absorb = stop_forward(&energies, HorizonPolicy::Absorb);

    for t in 0..energies.len() - 1 {
        assert_eq!(leak.probs[t], absorb.probs[t]);
    }
    assert!((absorb.total_mass() - 1.0).abs() < 1e-12);
    assert!(absorb.probs[energies.len() - 1] >= leak.probs[energies.len() - 1]);
}

#[test]
fn outputs_form_a_valid_distribution() {
    let mut rng = ChaCha8Rng::seed_from_u64(100);
    for policy in [HorizonPolicy::Leak, HorizonPolicy::Absorb] {
        for t in [1usize, 3, 8, 50] {
            for _ in 0..20 {
                let energies: Vec<f64> = (0..t).map(|_| rng.gen_range(-6.0..6.0)).collect();
                let fwd = stop_forward(&energies, policy);
                assert!(fwd.probs.iter().all(|&p| p >= 0.0));
                let total = fwd.total_mass();
                assert!(total <= 1.0 + 1e-9, "{policy:?} T={t}: total {total}");
                if policy == HorizonPolicy::Absorb {
                    assert!((total - 1.0).abs() < 1e-9, "T={t}: total {total}");
                }
            }
        }
    }
}

#[test]
fn backward_matches_finite_differences_per_energy() {
    let mut rng = ChaCha8Rng::seed_from_u64(200);
    for policy in [HorizonPolicy::Leak, HorizonPolicy::Absorb] {
        for t in [1usize, 2, 5, 12] {
            let mut energies: Vec<f64> = (0..t).map(|_| rng.gen_range(-3.0..3.0)).collect();
            let upstream: Vec<f64> = (0..t).map(|_| rng.gen_range(-1.0..1.0)).collect();

            let fwd = stop_forward(&energies, policy);
            let grad = stop_backward(&fwd, &upstream);

            for i in 0..t {
                let orig = energies[i];
                energies[i] = orig + FD_STEP;
                let plus = loss(&energies, &upstream, policy);
                energies[i] = orig - FD_STEP;
                let minus = loss(&energies, &upstream, policy);
                energies[i] = orig;
                let numeric = (plus - minus) / (2.0 * FD_STEP);
                assert!(
                    (grad[i] - numeric).abs() < FD_TOL,
                    "{policy:?} T={t} i={i}: analytic {} vs numeric {numeric}",
                    grad[i]
                );
            }
        }
    }
}

#[test]
fn backward_matches_random_directional_derivatives() {
    let mut rng = ChaCha8Rng::seed_from_u64(300);
    for policy in [HorizonPolicy::Leak, HorizonPolicy::Absorb] {
        for _ in 0..10 {
            let t = rng.gen_range(1..=16);
            let energies: Vec<f64> = (0..t).map(|_| rng.gen_range(-3.0..3.0)).collect();
            let upstream: Vec<f64> = (0..t).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let direction: Vec<f64> = (0..t).map(|_| rng.gen_range(-1.0..1.0)).collect();

            let fwd = stop_forward(&energies, policy);
            let grad = stop_backward(&fwd, &upstream);
            let analytic: f64 = grad.iter().zip(&direction).map(|(g, d)| g * d).sum();

            let shifted = |scale: f64| -> Vec<f64> {
                energies
                    .iter()
                    .zip(&direction)
                    .map(|(e, d)| e + scale * d)
                    .collect()
            };
            let numeric = (loss(&shifted(FD_STEP), &upstream, policy)
                - loss(&shifted(-FD_STEP), &upstream, policy))
                / (2.0 * FD_STEP);

            assert!(
                (analytic - numeric).abs() < FD_TOL * t as f64,
                "{policy:?} T={t}: analytic {analytic} vs numeric {numeric}"
            );
        }
    }
}
