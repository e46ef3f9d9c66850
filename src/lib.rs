//! Optistop core library.
//!
//! This crate trains a sequential stopping policy for the classical
//! secretary problem: candidates arrive one at a time in random order, the
//! policy only observes whether each candidate is the best seen so far, and
//! it must decide at each step whether to select the current candidate or
//! keep going. The binaries (`src/main.rs`, `src/bin/baseline.rs`) are thin
//! harnesses around these components.
//!
//! # Architecture
//!
//! The codebase keeps a clean split between pure numerics and the training
//! drivers:
//!
//! - **Samples** (`sample`): random permutations, their comparison (record)
//!   sequences, and full-information labels for supervised pretraining.
//!
//! - **Stop activation** (`stop`): the "temporal softmax" mapping raw
//!   per-timestep energies to a valid stopping distribution, with its exact
//!   linear-time reverse-mode gradient. Pure functions, no model coupling.
//!
//! - **Model** (`gru`, `model`): a hand-differentiated GRU cell plus a dense
//!   two-output decision head over a single flat parameter vector, with
//!   stepwise and whole-sequence forward/backward passes and JSON
//!   checkpointing.
//!
//! - **Episodes** (`episode`): on-policy rollouts with epsilon exploration
//!   and one-step bootstrapped TD targets for reinforcement fine-tuning.
//!
//! - **Trainer** (`trainer`): Adam over the flat parameter vector, the
//!   supervised and reinforcement loops, cooperative cancellation, and the
//!   train-event sink used for monitoring.
//!
//! All randomness flows through seeded `ChaCha8Rng` instances, so every run
//! is reproducible from its seed.

pub mod baseline;
pub mod config;
pub mod episode;
pub mod gru;
pub mod metrics;
pub mod model;
pub mod sample;
pub mod stop;
pub mod trainer;

// --- Re-exports for ergonomic external use ---------------------------------

pub use baseline::{cutoff_rule_success, BaselineReport};
pub use config::TrainConfig;
pub use episode::{EpisodeSimulator, EpisodeTrace};
pub use metrics::OnlineStats;
pub use model::{Model, CHOOSE, CONTINUE};
pub use sample::Sample;
pub use stop::{stop_backward, stop_forward, HorizonPolicy, StopForward};
pub use trainer::{
    CancelToken, NoopSink, RoundLog, StdoutSink, SupervisedLog, TrainEvent, TrainSink, Trainer,
};
