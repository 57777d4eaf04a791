// ============================================================
// Layer 5 — LogModel
// ============================================================
// Leave-one-chunk-out training and evaluation of a LogLstm for a
// single held-out chunk.
//
// train(target_epoch), for each epoch after current_epoch:
//
//   1. fresh RecurrentState
//   2. training sequence over every chunk except `chunk`
//   3. adjacent pairs (t, t+1)
//   4. windows of tr_sq_ln pairs; per window:
//        loss → backward → detach state → Adam step
//   5. current_epoch = epoch
//   6. checkpoint
//   7. evaluate the held-out chunk, append 2^loss to the stat log
//
// eval() walks the held-out chunk with a fresh state on the inner
// (non-autodiff) backend, writes one "event_id, outlier_factor"
// row per adjacent pair and returns the mean over chunk_size - 1
// pairs.
//
// Adam state is created fresh on every train() call and is not
// part of the checkpoint, so a resumed run restarts its moment
// estimates.

use std::{fmt::Debug, fs, path::PathBuf, sync::Arc};

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::ProgressIterator;

use crate::data::{adjacent_pairs, BpttWindows, ChunkSequence, TrainingExample};
use crate::domain::error::{LogModelError, LogModelResult};
use crate::domain::log_store::LogStore;
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::{EpochStat, StatLog},
    progress::progress_bar,
    scores::{score_file_name, ScoreWriter},
};
use crate::ml::config::LogModelConfig;
use crate::ml::model::{LogLstm, LogLstmConfig, RecurrentState};

pub struct LogModel<B: AutodiffBackend> {
    log_store:     Arc<LogStore>,
    model:         LogLstm<B>,
    chunk:         usize,
    current_epoch: usize,
    config:        LogModelConfig,
    device:        B::Device,
    checkpoints:   CheckpointStore,
    stats:         StatLog,
}

impl<B: AutodiffBackend> LogModel<B> {
    /// Fresh, untrained model holding out `chunk`, initialised on
    /// `device`.
    pub fn new(
        log_store: Arc<LogStore>,
        chunk:     usize,
        config:    LogModelConfig,
        device:    B::Device,
    ) -> LogModelResult<Self> {
        let model = model_config(&log_store, config.n_units).init::<B>(&device);
        Self::from_parts(log_store, chunk, config, 0, model, device)
    }

    /// Reassemble a model from checkpointed pieces.
    pub(crate) fn from_parts(
        log_store:     Arc<LogStore>,
        chunk:         usize,
        config:        LogModelConfig,
        current_epoch: usize,
        model:         LogLstm<B>,
        device:        B::Device,
    ) -> LogModelResult<Self> {
        log_store.check_chunk(chunk)?;
        if config.tr_sq_ln == 0 {
            return Err(LogModelError::EmptyWindow);
        }
        fs::create_dir_all(&config.output_dir)?;

        let checkpoints = CheckpointStore::new(&config.output_dir);
        let stats       = StatLog::new(&config.output_dir, chunk, config.n_units);

        Ok(Self { log_store, model, chunk, current_epoch, config, device, checkpoints, stats })
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn config(&self) -> &LogModelConfig {
        &self.config
    }

    pub fn module(&self) -> &LogLstm<B> {
        &self.model
    }

    pub fn model_config(&self) -> LogLstmConfig {
        model_config(&self.log_store, self.config.n_units)
    }

    pub fn log_store(&self) -> &Arc<LogStore> {
        &self.log_store
    }

    pub fn stat_log(&self) -> &StatLog {
        &self.stats
    }

    /// Score file for the current epoch.
    pub fn score_path(&self) -> PathBuf {
        self.config
            .output_dir
            .join(score_file_name(self.chunk, self.config.n_units, self.current_epoch))
    }

    // ─── Training ─────────────────────────────────────────────────────────────

    /// Train up to and including `target_epoch`.
    ///
    /// A no-op when `current_epoch >= target_epoch`: no update, no
    /// checkpoint, no stat line. A failure inside an epoch leaves
    /// the previous epoch's checkpoint as the resume point.
    pub fn train(&mut self, target_epoch: usize) -> LogModelResult<()> {
        if self.current_epoch >= target_epoch {
            tracing::debug!(
                "Chunk {} already at epoch {} (target {}), nothing to train",
                self.chunk, self.current_epoch, target_epoch,
            );
            return Ok(());
        }
        check_sequence_length(&self.log_store)?;

        // Parameters move once; every array below is allocated on self.device
        self.model = self.model.clone().fork(&self.device);

        let mut optim = AdamConfig::new()
            .with_epsilon(1e-8)
            .init::<B, LogLstm<B>>();

        let store  = Arc::clone(&self.log_store);
        let epochs = progress_bar(target_epoch - self.current_epoch, "epochs", self.config.show_progress);

        for epoch in (self.current_epoch + 1)..=target_epoch {
            let mut state = RecurrentState::new();

            let sequence = ChunkSequence::<B>::training(&store, self.chunk, self.device.clone())?;
            tracing::debug!("Epoch {} pools chunks {:?}", epoch, sequence.source_chunks());
            let windows  = BpttWindows::new(adjacent_pairs(sequence), self.config.tr_sq_ln)?;
            let bar      = progress_bar(
                BpttWindows::<()>::count_for(store.chunk_size() - 1, self.config.tr_sq_ln),
                "windows",
                self.config.show_progress,
            );

            let mut loss_sum = 0.0f64;
            let mut n_windows = 0usize;

            for window in windows {
                let window = window?;
                for (current, next) in &window {
                    self.check_device(current)?;
                    self.check_device(next)?;
                }

                let loss = self.model.window_loss(&window, &mut state);
                loss_sum += loss.clone().into_scalar().elem::<f64>();
                n_windows += 1;

                let grads = loss.backward();
                state.detach();

                let grads  = GradientsParams::from_grads(grads, &self.model);
                self.model = optim.step(self.config.learning_rate, self.model.clone(), grads);
                bar.inc(1);
            }
            bar.finish_and_clear();

            self.current_epoch = epoch;
            let checkpoint = self.save()?;
            tracing::debug!("Checkpoint saved to '{}'", checkpoint.display());

            let stat = EpochStat::from_mean_loss(epoch, self.eval()?);
            self.stats.append(stat)?;

            tracing::info!(
                "Chunk {} | epoch {:>3}/{} | train_loss/window={:.4} | held-out perplexity={:.4}",
                self.chunk,
                epoch,
                target_epoch,
                loss_sum / n_windows.max(1) as f64,
                stat.perplexity,
            );
            epochs.inc(1);
        }
        epochs.finish_and_clear();
        Ok(())
    }

    fn check_device<BE: Backend<Device = B::Device>>(&self, example: &TrainingExample<BE>) -> LogModelResult<()> {
        ensure_same_device(&self.device, &example.device())
    }

    // ─── Evaluation ───────────────────────────────────────────────────────────

    /// Per-event outlier factors for the held-out chunk, lazily, in
    /// timestep order. Item `count` scores the pair
    /// (event count, event count + 1). Runs without gradient tracking.
    pub fn outlier_factors(&self) -> LogModelResult<impl Iterator<Item = LogModelResult<f64>> + '_> {
        let model: LogLstm<B::InnerBackend> = self.model.valid().to_device(&self.device);

        let sequence = ChunkSequence::<B::InnerBackend>::evaluation(
            &self.log_store, self.chunk, self.device.clone(),
        )?;
        let bar = progress_bar(sequence.len(), "eval", self.config.show_progress);

        let mut state = RecurrentState::new();
        Ok(adjacent_pairs(sequence.progress_with(bar)).map(move |pair| {
            let (current, next) = pair?;
            Ok(model.eval_step(&current, &next, &mut state))
        }))
    }

    /// Score the held-out chunk into a fresh score file for the
    /// current epoch and return the mean loss over chunk_size - 1
    /// adjacent pairs.
    pub fn eval(&self) -> LogModelResult<f64> {
        let chunk_size = check_sequence_length(&self.log_store)?;

        let path       = self.score_path();
        let mut writer = ScoreWriter::create(&path)?;
        let mut sum    = 0.0f64;

        for (count, outlier_factor) in self.outlier_factors()?.enumerate() {
            let outlier_factor = outlier_factor?;
            writer.write(self.log_store.event_id(self.chunk, count), outlier_factor)?;
            sum += outlier_factor;
        }
        let rows = writer.finish()?;
        tracing::debug!("Scored {} events of chunk {} into '{}'", rows, self.chunk, path.display());

        Ok(sum / (chunk_size - 1) as f64)
    }

    // ─── Persistence ──────────────────────────────────────────────────────────

    /// Snapshot this model as log_model-{chunk}-{n_units}-{epoch}.
    /// Saving the same epoch twice overwrites that epoch's files.
    pub fn save(&self) -> LogModelResult<PathBuf> {
        self.checkpoints.save(self)
    }
}

fn model_config(store: &LogStore, n_units: usize) -> LogLstmConfig {
    LogLstmConfig::new(store.label_num(), store.note_num(), store.command_num(), n_units)
}

/// Evaluation averages over chunk_size - 1 pairs, so at least two
/// events per chunk are required. Returns chunk_size.
fn check_sequence_length(store: &LogStore) -> LogModelResult<usize> {
    let chunk_size = store.chunk_size();
    if chunk_size < 2 {
        return Err(LogModelError::InsufficientSequenceLength { chunk_size });
    }
    Ok(chunk_size)
}

fn ensure_same_device<D: PartialEq + Debug>(expected: &D, found: &D) -> LogModelResult<()> {
    if expected != found {
        return Err(LogModelError::DeviceMismatch {
            expected: format!("{expected:?}"),
            found:    format!("{found:?}"),
        });
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::log_store::{synthetic_store, LogStoreParts};
    use crate::infra::scores::read_scores;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use std::path::Path;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn config(dir: &Path) -> LogModelConfig {
        LogModelConfig {
            n_units:       8,
            tr_sq_ln:      2,
            output_dir:    dir.to_path_buf(),
            show_progress: false,
            ..Default::default()
        }
    }

    fn log_model(dir: &Path, store: LogStore, chunk: usize) -> LogModel<TestBackend> {
        LogModel::new(Arc::new(store), chunk, config(dir), Default::default()).unwrap()
    }

    #[test]
    fn test_train_one_epoch_end_to_end() {
        let dir       = tempfile::tempdir().unwrap();
        let mut model = log_model(dir.path(), synthetic_store(3, 4, 2), 1);

        model.train(1).unwrap();
        assert_eq!(model.current_epoch(), 1);

        let stats = model.stat_log().read().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].epoch, 1);
        assert!(stats[0].perplexity.is_finite() && stats[0].perplexity >= 1.0);

        assert!(dir.path().join("log_model-1-8-1.json").exists());
        assert!(dir.path().join("stat-1-8.csv").exists());

        let scores = read_scores(&dir.path().join("outlier-factors-1-8-1.csv")).unwrap();
        assert_eq!(scores.len(), 3);
    }

    #[test]
    fn test_train_is_idempotent() {
        let dir       = tempfile::tempdir().unwrap();
        let mut model = log_model(dir.path(), synthetic_store(3, 4, 2), 1);

        model.train(1).unwrap();
        let stat_before = fs::read_to_string(model.stat_log().path()).unwrap();

        model.train(1).unwrap();
        model.train(0).unwrap();
        assert_eq!(model.current_epoch(), 1);
        assert_eq!(fs::read_to_string(model.stat_log().path()).unwrap(), stat_before);
        assert!(!dir.path().join("log_model-1-8-2.json").exists());
    }

    #[test]
    fn test_train_is_monotonic_across_calls() {
        let dir       = tempfile::tempdir().unwrap();
        let mut model = log_model(dir.path(), synthetic_store(3, 5, 3), 0);

        model.train(1).unwrap();
        model.train(3).unwrap();
        assert_eq!(model.current_epoch(), 3);
        model.train(2).unwrap();
        assert_eq!(model.current_epoch(), 3);

        let epochs: Vec<usize> = model.stat_log().read().unwrap().iter().map(|s| s.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);
        for epoch in 1..=3 {
            assert!(dir.path().join(format!("log_model-0-8-{epoch}.json")).exists());
            assert!(dir.path().join(format!("outlier-factors-0-8-{epoch}.csv")).exists());
        }
    }

    #[test]
    fn test_score_rows_follow_event_ids() {
        let dir   = tempfile::tempdir().unwrap();
        let model = log_model(dir.path(), synthetic_store(3, 6, 2), 2);

        model.eval().unwrap();
        let ids: Vec<String> = read_scores(&model.score_path()).unwrap().into_iter().map(|r| r.id).collect();
        let expected: Vec<String> = (0..5).map(|t| format!("c2-e{t}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_eval_divides_by_pair_count() {
        let dir   = tempfile::tempdir().unwrap();
        let model = log_model(dir.path(), synthetic_store(3, 5, 2), 0);

        let mean   = model.eval().unwrap();
        let scores = read_scores(&model.score_path()).unwrap();
        assert_eq!(scores.len(), 4);
        let sum: f64 = scores.iter().map(|r| r.score).sum();
        assert!((mean - sum / 4.0).abs() < 1e-6, "mean {mean} vs {}", sum / 4.0);
    }

    #[test]
    fn test_eval_is_deterministic_for_fixed_weights() {
        let dir   = tempfile::tempdir().unwrap();
        let model = log_model(dir.path(), synthetic_store(2, 4, 2), 0);

        let first: Vec<f64>  = model.outlier_factors().unwrap().map(Result::unwrap).collect();
        let second: Vec<f64> = model.outlier_factors().unwrap().map(Result::unwrap).collect();
        assert_eq!(first.len(), 3);
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_step_chunks_are_rejected() {
        let dir       = tempfile::tempdir().unwrap();
        let mut model = log_model(dir.path(), synthetic_store(3, 1, 2), 0);

        assert!(matches!(
            model.eval(),
            Err(LogModelError::InsufficientSequenceLength { chunk_size: 1 })
        ));
        assert!(matches!(
            model.train(1),
            Err(LogModelError::InsufficientSequenceLength { chunk_size: 1 })
        ));
        assert_eq!(model.current_epoch(), 0);
        assert!(!model.stat_log().path().exists());
    }

    #[test]
    fn test_invalid_construction() {
        let dir   = tempfile::tempdir().unwrap();
        let store = Arc::new(synthetic_store(3, 4, 2));

        let err = LogModel::<TestBackend>::new(store.clone(), 3, config(dir.path()), Default::default()).err();
        assert!(matches!(err, Some(LogModelError::ChunkOutOfRange { chunk: 3, chunk_num: 3 })));

        let cfg = LogModelConfig { tr_sq_ln: 0, ..config(dir.path()) };
        let err = LogModel::<TestBackend>::new(store, 0, cfg, Default::default()).err();
        assert!(matches!(err, Some(LogModelError::EmptyWindow)));
    }

    #[test]
    fn test_training_needs_a_second_chunk() {
        let dir       = tempfile::tempdir().unwrap();
        let mut model = log_model(dir.path(), synthetic_store(1, 4, 2), 0);
        assert!(matches!(model.train(1), Err(LogModelError::TooFewChunks { chunk_num: 1 })));
        assert_eq!(model.current_epoch(), 0);
    }

    #[test]
    fn test_window_longer_than_chunk() {
        let dir   = tempfile::tempdir().unwrap();
        let store = synthetic_store(2, 3, 2);
        let cfg   = LogModelConfig { tr_sq_ln: 50, ..config(dir.path()) };
        let mut model = LogModel::<TestBackend>::new(Arc::new(store), 1, cfg, Default::default()).unwrap();
        model.train(1).unwrap();
        assert_eq!(model.current_epoch(), 1);
    }

    #[test]
    fn test_new_model_lives_on_the_requested_device() {
        let dir    = tempfile::tempdir().unwrap();
        let model  = LogModel::<TestBackend>::new(
            Arc::new(synthetic_store(3, 4, 2)), 0, config(dir.path()), NdArrayDevice::Cpu,
        )
        .unwrap();

        assert_eq!(model.module().value_proj.weight.device(), NdArrayDevice::Cpu);
    }

    #[test]
    fn test_ensure_same_device() {
        assert!(ensure_same_device(&1, &1).is_ok());
        assert!(matches!(
            ensure_same_device(&"cuda:0", &"cpu"),
            Err(LogModelError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn test_sequence_length_guard() {
        let parts = LogStoreParts { label_num: 1, note_num: 1, command_num: 1, ..Default::default() };
        let empty = LogStore::new(parts).unwrap();
        assert!(check_sequence_length(&empty).is_err());
        assert_eq!(check_sequence_length(&synthetic_store(2, 2, 2)).unwrap(), 2);
    }
}
