// tests/training_tests.rs
//
// Whole-model gradient checks against finite differences, plus training
// smoke tests: supervised pretraining must improve held-out cost, the
// reinforcement loop must stay numerically sane, and cancellation must
// leave parameters untouched when observed before the first step.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use optistop::config::TrainConfig;
use optistop::episode::EpisodeSimulator;
use optistop::model::Model;
use optistop::sample::Sample;
use optistop::stop::HorizonPolicy;
use optistop::trainer::{
    episode_cost, episode_cost_and_grad, supervised_cost, supervised_cost_and_grad, CancelToken,
    NoopSink, Trainer,
};

const FD_STEP: f64 = 1e-5;
const FD_TOL: f64 = 2e-6;

#[test]
fn supervised_gradient_matches_finite_differences() {
    let mut rng = ChaCha8Rng::seed_from_u64(400);
    for policy in [HorizonPolicy::Leak, HorizonPolicy::Absorb] {
        let mut model = Model::new(4, 6, &mut rng);
        let batch: Vec<Sample> = (0..3).map(|_| Sample::random(6, &mut rng)).collect();

        let mut grads = vec![0.0; model.num_params()];
        let cost = supervised_cost_and_grad(&model, &batch, policy, &mut grads);
        assert!(
            (cost - supervised_cost(&model, &batch, policy)).abs() < 1e-12,
            "cost paths disagree"
        );

        for i in 0..model.num_params() {
            let orig = model.params()[i];
            model.params_mut()[i] = orig + FD_STEP;
            let plus = supervised_cost(&model, &batch, policy);
            model.params_mut()[i] = orig - FD_STEP;
            let minus = supervised_cost(&model, &batch, policy);
            model.params_mut()[i] = orig;
            let numeric = (plus - minus) / (2.0 * FD_STEP);
            assert!(
                (grads[i] - numeric).abs() < FD_TOL,
                "{policy:?} param {i}: analytic {} vs numeric {numeric}",
                grads[i]
            );
        }
    }
}

#[test]
fn episode_gradient_matches_finite_differences() {
    let mut rng = ChaCha8Rng::seed_from_u64(500);
    let horizon = 5;
    let mut model = Model::new(4, horizon, &mut rng);
    let sim = EpisodeSimulator {
        horizon,
        exploration: 0.5,
    };
    // Targets recorded once and held constant: the semi-gradient setting.
    let traces: Vec<_> = (0..4).map(|_| sim.run(&model, &mut rng)).collect();

    let mut grads = vec![0.0; model.num_params()];
    let cost = episode_cost_and_grad(&model, &traces, &mut grads);
    assert!((cost - episode_cost(&model, &traces)).abs() < 1e-12);

    for i in 0..model.num_params() {
        let orig = model.params()[i];
        model.params_mut()[i] = orig + FD_STEP;
        let plus = episode_cost(&model, &traces);
        model.params_mut()[i] = orig - FD_STEP;
        let minus = episode_cost(&model, &traces);
        model.params_mut()[i] = orig;
        let numeric = (plus - minus) / (2.0 * FD_STEP);
        assert!(
            (grads[i] - numeric).abs() < FD_TOL,
            "param {i}: analytic {} vs numeric {numeric}",
            grads[i]
        );
    }
}

#[test]
fn supervised_training_improves_evaluation_cost() {
    let cfg = TrainConfig {
        horizon: 6,
        hidden: 12,
        batch_size: 16,
        step_size: 0.01,
        iterations: 800,
        log_interval: 100,
        seed: 123,
        horizon_policy: HorizonPolicy::Absorb,
        ..TrainConfig::default()
    };

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let model = Model::new(cfg.hidden, cfg.horizon, &mut rng);

    let mut eval_rng = ChaCha8Rng::seed_from_u64(999);
    let eval: Vec<Sample> = (0..256)
        .map(|_| Sample::random(cfg.horizon, &mut eval_rng))
        .collect();

    let before = supervised_cost(&model, &eval, cfg.horizon_policy);
    let mut trainer = Trainer::new(model, cfg.clone()).expect("valid config");
    trainer.run_supervised(&mut NoopSink, &CancelToken::new());
    let after = supervised_cost(&trainer.model, &eval, cfg.horizon_policy);

    assert!(after.is_finite() && before.is_finite());
    assert!(
        after < before - 0.01,
        "no improvement: before {before}, after {after}"
    );
}

#[test]
fn reinforce_rounds_keep_parameters_finite() {
    let cfg = TrainConfig {
        horizon: 5,
        hidden: 8,
        rounds: 5,
        episodes_per_round: 8,
        steps_per_round: 2,
        step_size: 0.005,
        seed: 17,
        ..TrainConfig::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let model = Model::new(cfg.hidden, cfg.horizon, &mut rng);

    let mut trainer = Trainer::new(model, cfg).expect("valid config");
    trainer.run_reinforce(&mut NoopSink, &CancelToken::new());
    assert!(trainer.model.params().iter().all(|p| p.is_finite()));
}

#[test]
fn cancellation_before_the_first_step_changes_nothing() {
    let cfg = TrainConfig {
        horizon: 5,
        hidden: 8,
        iterations: 100,
        rounds: 100,
        seed: 2,
        ..TrainConfig::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let model = Model::new(cfg.hidden, cfg.horizon, &mut rng);
    let snapshot = model.params().to_vec();

    let cancel = CancelToken::new();
    cancel.cancel();

    let mut trainer = Trainer::new(model, cfg).expect("valid config");
    trainer.run_supervised(&mut NoopSink, &cancel);
    trainer.run_reinforce(&mut NoopSink, &cancel);
    assert_eq!(trainer.model.params(), snapshot.as_slice());
}
