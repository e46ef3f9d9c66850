// src/main.rs
//
// Training CLI for the optistop policy.
//
// Constraints:
// - Either regime runs over the same model file: supervised pretraining
//   first, reinforcement fine-tuning on top of the saved checkpoint.
// - Missing or unreadable model files mean a fresh seeded init, never an
//   error; a failed save at the end is fatal (the checkpoint is the whole
//   point of the run).
// - Ctrl-C requests cooperative cancellation; the loop finishes its current
//   gradient step and the model is saved as-is.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use optistop::config::TrainConfig;
use optistop::model::Model;
use optistop::stop::HorizonPolicy;
use optistop::trainer::{CancelToken, StdoutSink, Trainer};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Regime {
    /// Imitation pretraining on full-information labels.
    Supervised,
    /// On-policy fine-tuning with bootstrapped TD targets.
    Reinforce,
}

#[derive(Debug, Parser)]
#[command(
    name = "optistop",
    about = "Secretary-problem stopping policy trainer",
    version
)]
struct Args {
    /// Training regime.
    #[arg(long, value_enum, default_value = "supervised")]
    regime: Regime,

    /// Model checkpoint path.
    #[arg(long, default_value = "out_net.json")]
    file: PathBuf,

    /// Number of candidates per scenario (episode horizon).
    #[arg(long, default_value_t = 50)]
    len: usize,

    /// GRU hidden size (fresh inits only; an existing checkpoint keeps its own).
    #[arg(long, default_value_t = 40)]
    hidden: usize,

    /// Supervised mini-batch size.
    #[arg(long, default_value_t = 4)]
    batch: usize,

    /// Adam step size.
    #[arg(long, default_value_t = 1e-3)]
    step: f64,

    /// Supervised iterations.
    #[arg(long, default_value_t = 20_000)]
    iters: usize,

    /// Log interval in iterations.
    #[arg(long, default_value_t = 4)]
    log: usize,

    /// Reinforcement rounds.
    #[arg(long, default_value_t = 200)]
    rounds: usize,

    /// Episodes collected per round.
    #[arg(long, default_value_t = 32)]
    episodes: usize,

    /// Gradient steps per round.
    #[arg(long, default_value_t = 8)]
    steps: usize,

    /// Exploration coefficient in [0, 1]. Omit to auto-derive from the horizon.
    #[arg(long)]
    explore: Option<f64>,

    /// RNG seed for init, sampling, and exploration.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Let stopping probability leak past the horizon instead of forcing the
    /// final timestep to absorb the remaining mass.
    #[arg(long)]
    leak: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = TrainConfig {
        horizon: args.len,
        hidden: args.hidden,
        batch_size: args.batch,
        step_size: args.step,
        iterations: args.iters,
        log_interval: args.log,
        rounds: args.rounds,
        episodes_per_round: args.episodes,
        steps_per_round: args.steps,
        exploration: args.explore,
        horizon_policy: if args.leak {
            HorizonPolicy::Leak
        } else {
            HorizonPolicy::Absorb
        },
        seed: args.seed,
    };
    cfg.validate()?;

    let model = match Model::load(&args.file) {
        Some(model) => {
            println!("loaded model from {}", args.file.display());
            model
        }
        None => {
            println!(
                "no usable model at {}; starting from a fresh init",
                args.file.display()
            );
            let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
            Model::new(cfg.hidden, cfg.horizon, &mut rng)
        }
    };

    let cancel = CancelToken::new();
    {
        let token = cancel.clone();
        ctrlc::set_handler(move || token.cancel()).context("install interrupt handler")?;
    }

    println!(
        "optistop | regime={:?} len={} hidden={} step={} horizon_policy={} seed={}",
        args.regime,
        cfg.horizon,
        model.hidden(),
        cfg.step_size,
        cfg.horizon_policy.as_str(),
        cfg.seed
    );

    let mut trainer = Trainer::new(model, cfg)?;
    let mut sink = StdoutSink;
    match args.regime {
        Regime::Supervised => trainer.run_supervised(&mut sink, &cancel),
        Regime::Reinforce => trainer.run_reinforce(&mut sink, &cancel),
    }
    if cancel.is_cancelled() {
        println!("interrupted; saving current parameters");
    }

    trainer.model.save(&args.file)?;
    println!("saved model to {}", args.file.display());
    Ok(())
}
