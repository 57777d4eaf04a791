// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//   train — leave-one-chunk-out training with per-epoch scoring
//   eval  — re-score a held-out chunk from a checkpoint
//   roc   — ROC / AUC of a score file against ground truth
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    eval_use_case::EvalConfig,
    roc_use_case::RocConfig,
    train_use_case::TrainConfig,
};
use crate::domain::device::DeviceSelector;
use crate::ml::LogModelConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train LSTM models, holding out one chunk each
    Train(TrainArgs),

    /// Re-score a held-out chunk with a saved checkpoint
    Eval(EvalArgs),

    /// ROC analysis of a score file
    Roc(RocArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Preprocessed log store (JSON)
    #[arg(long)]
    pub log_store: PathBuf,

    /// Held-out chunk index; every chunk in turn when omitted
    #[arg(long)]
    pub chunk: Option<usize>,

    /// Train until this epoch (inclusive)
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// LSTM hidden size
    #[arg(long, default_value_t = 1000)]
    pub n_units: usize,

    /// Truncated-BPTT window length, in event pairs
    #[arg(long, default_value_t = 100)]
    pub tr_sq_ln: usize,

    /// Device: -1 for CPU, n >= 0 for accelerator n
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub gpu: i32,

    /// Directory for checkpoints, stat logs and score files
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Adam step size
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Continue from the latest checkpoint of each chunk
    #[arg(long)]
    pub resume: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            log_store: a.log_store,
            chunk:     a.chunk,
            epochs:    a.epochs,
            resume:    a.resume,
            model: LogModelConfig {
                n_units:       a.n_units,
                tr_sq_ln:      a.tr_sq_ln,
                device:        DeviceSelector::new(a.gpu),
                output_dir:    a.output_dir,
                learning_rate: a.lr,
                show_progress: !a.no_progress,
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[arg(long)]
    pub log_store: PathBuf,

    #[arg(long)]
    pub chunk: usize,

    #[arg(long, default_value_t = 1000)]
    pub n_units: usize,

    /// Checkpoint epoch; latest when omitted
    #[arg(long)]
    pub epoch: Option<usize>,

    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub gpu: i32,

    /// Directory holding the checkpoints
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl From<EvalArgs> for EvalConfig {
    fn from(a: EvalArgs) -> Self {
        EvalConfig {
            log_store:  a.log_store,
            output_dir: a.output_dir,
            chunk:      a.chunk,
            n_units:    a.n_units,
            epoch:      a.epoch,
            device:     DeviceSelector::new(a.gpu),
        }
    }
}

#[derive(Args, Debug)]
pub struct RocArgs {
    /// Log store carrying anomaly labels
    #[arg(long)]
    pub log_store: PathBuf,

    /// Score file written by train or eval
    #[arg(long)]
    pub scores: PathBuf,

    /// Write the curve points to this CSV
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<RocArgs> for RocConfig {
    fn from(a: RocArgs) -> Self {
        RocConfig {
            log_store:  a.log_store,
            score_file: a.scores,
            output:     a.output,
        }
    }
}
