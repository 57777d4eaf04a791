// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Re-scores a held-out chunk with a saved checkpoint:
//
//   Step 1: Load the LogStore
//   Step 2: Find the checkpoint (given epoch or latest)
//   Step 3: Restore the LogModel on the selected backend
//   Step 4: Rewrite the epoch's score file, return mean loss

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;

use crate::application::load_log_store;
use crate::domain::{device::DeviceSelector, log_store::LogStore};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::backend::{with_backend, BackendTask};

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub log_store:  PathBuf,
    pub output_dir: PathBuf,
    pub chunk:      usize,
    pub n_units:    usize,
    /// `None` picks the latest saved epoch
    pub epoch:      Option<usize>,
    pub device:     DeviceSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub epoch:      usize,
    pub mean_loss:  f64,
    pub perplexity: f64,
    pub score_file: PathBuf,
}

pub struct EvalUseCase {
    config: EvalConfig,
}

impl EvalUseCase {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let store = load_log_store(&self.config.log_store)?;
        self.execute_with(store)
    }

    pub fn execute_with(&self, store: Arc<LogStore>) -> Result<EvalReport> {
        let cfg         = &self.config;
        let checkpoints = CheckpointStore::new(&cfg.output_dir);

        let epoch = match cfg.epoch {
            Some(epoch) => epoch,
            None => checkpoints
                .latest_epoch(cfg.chunk, cfg.n_units)?
                .with_context(|| {
                    format!(
                        "No checkpoint for chunk {} (n_units={}) in '{}'. Have you run 'train' first?",
                        cfg.chunk, cfg.n_units, cfg.output_dir.display(),
                    )
                })?,
        };

        with_backend(cfg.device, EvalTask { config: cfg, checkpoints, store, epoch })
    }
}

struct EvalTask<'a> {
    config:      &'a EvalConfig,
    checkpoints: CheckpointStore,
    store:       Arc<LogStore>,
    epoch:       usize,
}

impl BackendTask for EvalTask<'_> {
    type Output = Result<EvalReport>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output {
        let cfg   = self.config;
        let model = self
            .checkpoints
            .load::<B>(self.store, cfg.chunk, cfg.n_units, self.epoch, device)
            .with_context(|| format!("Cannot restore checkpoint for chunk {} epoch {}", cfg.chunk, self.epoch))?;

        let mean_loss = model.eval()?;
        Ok(EvalReport {
            epoch:      self.epoch,
            mean_loss,
            perplexity: mean_loss.exp2(),
            score_file: model.score_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::log_store::synthetic_store;
    use crate::infra::scores::read_scores;
    use crate::ml::{backend::CpuBackend, LogModel, LogModelConfig};

    #[test]
    fn test_rescoring_latest_checkpoint() {
        let dir   = tempfile::tempdir().unwrap();
        let store = Arc::new(synthetic_store(3, 5, 2));
        let model_cfg = LogModelConfig {
            n_units:       4,
            tr_sq_ln:      2,
            output_dir:    dir.path().to_path_buf(),
            show_progress: false,
            ..Default::default()
        };
        let mut model = LogModel::<CpuBackend>::new(store.clone(), 0, model_cfg, Default::default()).unwrap();
        model.train(2).unwrap();

        let report = EvalUseCase::new(EvalConfig {
            log_store:  dir.path().join("unused.json"),
            output_dir: dir.path().to_path_buf(),
            chunk:      0,
            n_units:    4,
            epoch:      None,
            device:     DeviceSelector::CPU,
        })
        .execute_with(store)
        .unwrap();

        assert_eq!(report.epoch, 2);
        assert!((report.perplexity - 2f64.powf(report.mean_loss)).abs() < 1e-9);
        assert_eq!(read_scores(&report.score_file).unwrap().len(), 4);

        let logged = model.stat_log().read().unwrap();
        assert!((logged[1].perplexity - report.perplexity).abs() < 1e-4);
    }

    #[test]
    fn test_no_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvalUseCase::new(EvalConfig {
            log_store:  dir.path().join("unused.json"),
            output_dir: dir.path().to_path_buf(),
            chunk:      0,
            n_units:    4,
            epoch:      None,
            device:     DeviceSelector::CPU,
        })
        .execute_with(Arc::new(synthetic_store(2, 3, 2)))
        .unwrap_err();
        assert!(err.to_string().contains("No checkpoint"));
    }
}
