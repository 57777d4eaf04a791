// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and dispatches to Layer 2. The only
// layer that prints to stdout.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, RocArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "log-outlier",
    version,
    about = "Leave-one-chunk-out LSTM anomaly scoring for categorical event logs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
            Commands::Roc(args)   => run_roc(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on log store: {}", args.log_store.display());
    let summary = TrainUseCase::new(args.into()).execute()?;

    for s in summary {
        match s.perplexity {
            Some(p) => println!("chunk {}: epoch {} perplexity {:.4}", s.chunk, s.epoch, p),
            None    => println!("chunk {}: epoch {}", s.chunk, s.epoch),
        }
    }
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.into()).execute()?;
    println!(
        "epoch {}: mean loss {:.4} bits, perplexity {:.4}, scores in {}",
        report.epoch, report.mean_loss, report.perplexity, report.score_file.display(),
    );
    Ok(())
}

fn run_roc(args: RocArgs) -> Result<()> {
    use crate::application::roc_use_case::RocUseCase;

    let curve = RocUseCase::new(args.into()).execute()?;
    println!("AUC {:.4} ({} anomalous, {} normal)", curve.auc, curve.positives, curve.negatives);
    Ok(())
}
