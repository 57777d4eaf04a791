// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Load the LogStore                 (Layer 3 - domain)
//   Step 2: Pick backend + device             (Layer 5 - ml)
//   Step 3: For every requested held-out chunk:
//             resume from the latest checkpoint or start fresh
//             train up to the target epoch    (Layer 5 - ml)
//   Step 4: Report the last logged perplexity (Layer 6 - infra)

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::application::load_log_store;
use crate::domain::log_store::LogStore;
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::{
    backend::{with_backend, BackendTask},
    LogModel, LogModelConfig,
};

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Preprocessed LogStore (JSON)
    pub log_store: PathBuf,
    /// Held-out chunk; `None` trains one model per chunk in turn
    pub chunk:     Option<usize>,
    /// Target epoch
    pub epochs:    usize,
    /// Continue from the latest checkpoint when one exists
    pub resume:    bool,
    pub model:     LogModelConfig,
}

/// Outcome for one held-out chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSummary {
    pub chunk:      usize,
    pub epoch:      usize,
    pub perplexity: Option<f64>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<ChunkSummary>> {
        let store = load_log_store(&self.config.log_store)?;
        self.execute_with(store)
    }

    /// Train against an already loaded store.
    pub fn execute_with(&self, store: Arc<LogStore>) -> Result<Vec<ChunkSummary>> {
        let chunks: Vec<usize> = match self.config.chunk {
            Some(chunk) => vec![chunk],
            None        => (0..store.chunk_num()).collect(),
        };
        with_backend(self.config.model.device, TrainTask { config: &self.config, store, chunks })
    }
}

struct TrainTask<'a> {
    config: &'a TrainConfig,
    store:  Arc<LogStore>,
    chunks: Vec<usize>,
}

impl BackendTask for TrainTask<'_> {
    type Output = Result<Vec<ChunkSummary>>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output {
        let cfg         = self.config;
        let checkpoints = CheckpointStore::new(&cfg.model.output_dir);

        self.chunks
            .iter()
            .map(|&chunk| -> Result<ChunkSummary> {
                let latest = if cfg.resume {
                    checkpoints.latest_epoch(chunk, cfg.model.n_units)?
                } else {
                    None
                };

                let mut model = match latest {
                    Some(epoch) => {
                        tracing::info!("Resuming chunk {} from epoch {}", chunk, epoch);
                        checkpoints.resume::<B>(self.store.clone(), chunk, epoch, &cfg.model, device.clone())?
                    }
                    None => LogModel::<B>::new(self.store.clone(), chunk, cfg.model.clone(), device.clone())?,
                };

                model
                    .train(cfg.epochs)
                    .with_context(|| format!("Training failed for held-out chunk {chunk}"))?;

                let perplexity = model.stat_log().read()?.last().map(|s| s.perplexity);
                Ok(ChunkSummary { chunk, epoch: model.current_epoch(), perplexity })
            })
            .collect()
    }
}
