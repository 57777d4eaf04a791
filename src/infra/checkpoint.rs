// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores complete LogModel snapshots.
//
// Every completed epoch writes two files sharing one stem:
//
//   {output_dir}/
//     log_model-{chunk}-{n_units}-{epoch}.json  ← snapshot manifest
//     log_model-{chunk}-{n_units}-{epoch}.mpk   ← LogLstm weights
//
// The manifest is explicit and versioned:
//   format_version, chunk, current_epoch, LogModelConfig,
//   LogLstmConfig (cardinalities + n_units), weight file name
//
// Weights use burn's NamedMpkFileRecorder at full precision, so a
// restored model continues training from exactly the saved
// parameters. Adam state is not saved.
//
// Files are never deleted or merged. Saving an epoch that already
// exists overwrites that epoch only.

use std::{
    fs,
    path::PathBuf,
    sync::Arc,
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{LogModelError, LogModelResult};
use crate::domain::log_store::LogStore;
use crate::ml::{config::LogModelConfig, log_model::LogModel, model::LogLstmConfig};

/// Manifest format written by this version.
pub const SNAPSHOT_VERSION: u32 = 1;

type WeightRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Contents of a `log_model-*.json` manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogModelSnapshot {
    pub format_version: u32,
    pub chunk:          usize,
    pub current_epoch:  usize,
    pub config:         LogModelConfig,
    pub model:          LogLstmConfig,
    /// Weight file name relative to the manifest, without extension
    pub weights:        String,
}

/// Reads and writes snapshots inside one output directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn manifest_path(&self, chunk: usize, n_units: usize, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}.json", stem(chunk, n_units, epoch)))
    }

    /// Write the manifest and weights for the model's current epoch.
    /// Returns the manifest path.
    pub fn save<B: AutodiffBackend>(&self, log_model: &LogModel<B>) -> LogModelResult<PathBuf> {
        let config  = log_model.config();
        let epoch   = log_model.current_epoch();
        let weights = stem(log_model.chunk(), config.n_units, epoch);

        fs::create_dir_all(&self.dir)?;

        // The recorder appends its own .mpk extension
        Recorder::<B>::record(
            &WeightRecorder::new(),
            log_model.module().clone().into_record(),
            self.dir.join(&weights),
        )
        .map_err(|e| LogModelError::Record(e.to_string()))?;

        let snapshot = LogModelSnapshot {
            format_version: SNAPSHOT_VERSION,
            chunk:          log_model.chunk(),
            current_epoch:  epoch,
            config:         config.clone(),
            model:          log_model.model_config(),
            weights,
        };
        let path = self.manifest_path(snapshot.chunk, config.n_units, epoch);
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;

        tracing::debug!("Saved checkpoint: chunk {} epoch {}", snapshot.chunk, epoch);
        Ok(path)
    }

    pub fn read_snapshot(&self, chunk: usize, n_units: usize, epoch: usize) -> LogModelResult<LogModelSnapshot> {
        let json     = fs::read_to_string(self.manifest_path(chunk, n_units, epoch))?;
        let snapshot = serde_json::from_str::<LogModelSnapshot>(&json)?;
        if snapshot.format_version != SNAPSHOT_VERSION {
            return Err(LogModelError::SnapshotVersion {
                found:     snapshot.format_version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Restore the LogModel saved for (chunk, n_units, epoch) with
    /// the settings recorded in its snapshot.
    ///
    /// The snapshot must describe `log_store`: same chunk range and
    /// the same label/note/command cardinalities. The restored model
    /// writes its output into this store's directory and resumes
    /// training at `epoch + 1`.
    pub fn load<B: AutodiffBackend>(
        &self,
        log_store: Arc<LogStore>,
        chunk:     usize,
        n_units:   usize,
        epoch:     usize,
        device:    B::Device,
    ) -> LogModelResult<LogModel<B>> {
        let snapshot = self.read_snapshot(chunk, n_units, epoch)?;
        let config   = LogModelConfig { output_dir: self.dir.clone(), ..snapshot.config.clone() };
        self.restore(snapshot, log_store, config, device)
    }

    /// Restore a snapshot to continue training under `session`.
    ///
    /// Run settings (device, learning rate, progress bars) come from
    /// `session`. The BPTT window length stays as saved. Every
    /// setting that differs from the snapshot is logged.
    pub fn resume<B: AutodiffBackend>(
        &self,
        log_store: Arc<LogStore>,
        chunk:     usize,
        epoch:     usize,
        session:   &LogModelConfig,
        device:    B::Device,
    ) -> LogModelResult<LogModel<B>> {
        let snapshot = self.read_snapshot(chunk, session.n_units, epoch)?;
        let saved    = &snapshot.config;

        if saved.device != session.device {
            tracing::warn!("Checkpoint trained on {}, continuing on {}", saved.device, session.device);
        }
        if saved.learning_rate != session.learning_rate {
            tracing::warn!(
                "Learning rate changed from {} to {} on resume",
                saved.learning_rate, session.learning_rate,
            );
        }
        if saved.tr_sq_ln != session.tr_sq_ln {
            tracing::warn!(
                "Keeping saved tr_sq_ln {} (requested {})",
                saved.tr_sq_ln, session.tr_sq_ln,
            );
        }

        let config = LogModelConfig {
            device:        session.device,
            learning_rate: session.learning_rate,
            show_progress: session.show_progress,
            output_dir:    self.dir.clone(),
            ..saved.clone()
        };
        self.restore(snapshot, log_store, config, device)
    }

    fn restore<B: AutodiffBackend>(
        &self,
        snapshot:  LogModelSnapshot,
        log_store: Arc<LogStore>,
        config:    LogModelConfig,
        device:    B::Device,
    ) -> LogModelResult<LogModel<B>> {
        check_matches_store(&snapshot, &log_store)?;

        let record = Recorder::<B>::load(&WeightRecorder::new(), self.dir.join(&snapshot.weights), &device)
            .map_err(|e| LogModelError::Record(e.to_string()))?;
        let model = snapshot.model.init::<B>(&device).load_record(record);

        tracing::info!(
            "Loaded checkpoint '{}' (chunk {}, epoch {})",
            snapshot.weights, snapshot.chunk, snapshot.current_epoch,
        );

        LogModel::from_parts(log_store, snapshot.chunk, config, snapshot.current_epoch, model, device)
    }

    /// Highest epoch with a manifest for (chunk, n_units), if any.
    pub fn latest_epoch(&self, chunk: usize, n_units: usize) -> LogModelResult<Option<usize>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let prefix = format!("log_model-{chunk}-{n_units}-");

        let mut latest = None;
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let epoch = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|e| e.parse::<usize>().ok());
            if let Some(epoch) = epoch {
                latest = latest.max(Some(epoch));
            }
        }
        Ok(latest)
    }
}

fn stem(chunk: usize, n_units: usize, epoch: usize) -> String {
    format!("log_model-{chunk}-{n_units}-{epoch}")
}

fn check_matches_store(snapshot: &LogModelSnapshot, store: &LogStore) -> LogModelResult<()> {
    let expected = (store.label_num(), store.note_num(), store.command_num());
    let found    = (snapshot.model.label_num, snapshot.model.note_num, snapshot.model.command_num);
    if expected != found {
        return Err(LogModelError::SnapshotMismatch(format!(
            "cardinalities (label, note, command) {found:?} saved, store has {expected:?}"
        )));
    }
    if snapshot.model.n_units != snapshot.config.n_units {
        return Err(LogModelError::SnapshotMismatch(format!(
            "model n_units {} differs from config n_units {}",
            snapshot.model.n_units, snapshot.config.n_units
        )));
    }
    store.check_chunk(snapshot.chunk)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        device::DeviceSelector,
        log_store::{synthetic_store, LogStoreParts},
    };
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn trained(dir: &Path, epochs: usize) -> LogModel<TestBackend> {
        let config = LogModelConfig {
            n_units:       8,
            tr_sq_ln:      2,
            output_dir:    dir.to_path_buf(),
            show_progress: false,
            ..Default::default()
        };
        let mut model = LogModel::new(Arc::new(synthetic_store(3, 4, 2)), 1, config, Default::default()).unwrap();
        model.train(epochs).unwrap();
        model
    }

    #[test]
    fn test_each_epoch_gets_its_own_snapshot() {
        let dir   = tempfile::tempdir().unwrap();
        let model = trained(dir.path(), 2);
        let store = CheckpointStore::new(dir.path());

        for epoch in 1..=2 {
            assert!(store.manifest_path(1, 8, epoch).exists());
            assert!(dir.path().join(format!("log_model-1-8-{epoch}.mpk")).exists());
        }
        assert_eq!(store.latest_epoch(1, 8).unwrap(), Some(2));
        assert_eq!(store.latest_epoch(0, 8).unwrap(), None);
        assert_eq!(model.current_epoch(), 2);
    }

    #[test]
    fn test_snapshot_manifest_is_self_describing() {
        let dir      = tempfile::tempdir().unwrap();
        trained(dir.path(), 1);
        let snapshot = CheckpointStore::new(dir.path()).read_snapshot(1, 8, 1).unwrap();

        assert_eq!(snapshot.format_version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.chunk, 1);
        assert_eq!(snapshot.current_epoch, 1);
        assert_eq!(snapshot.config.tr_sq_ln, 2);
        assert_eq!(snapshot.model.label_num, 2);
        assert_eq!(snapshot.weights, "log_model-1-8-1");
    }

    #[test]
    fn test_restored_model_scores_identically_and_resumes() {
        let dir      = tempfile::tempdir().unwrap();
        let original = trained(dir.path(), 1);
        let before: Vec<f64> = original.outlier_factors().unwrap().map(Result::unwrap).collect();

        let ckpt         = CheckpointStore::new(dir.path());
        let mut restored = ckpt
            .load::<TestBackend>(original.log_store().clone(), 1, 8, 1, Default::default())
            .unwrap();
        assert_eq!(restored.current_epoch(), 1);
        assert_eq!(restored.chunk(), 1);

        let after: Vec<f64> = restored.outlier_factors().unwrap().map(Result::unwrap).collect();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }

        restored.train(2).unwrap();
        assert_eq!(restored.current_epoch(), 2);
        let epochs: Vec<usize> = restored.stat_log().read().unwrap().iter().map(|s| s.epoch).collect();
        assert_eq!(epochs, vec![1, 2]);
    }

    #[test]
    fn test_resume_takes_run_settings_from_the_session() {
        let dir      = tempfile::tempdir().unwrap();
        let original = trained(dir.path(), 1);

        let session = LogModelConfig {
            n_units:       8,
            tr_sq_ln:      5,
            device:        DeviceSelector::new(0),
            output_dir:    PathBuf::from("ignored"),
            learning_rate: 0.5,
            show_progress: false,
        };
        let mut resumed = CheckpointStore::new(dir.path())
            .resume::<TestBackend>(original.log_store().clone(), 1, 1, &session, Default::default())
            .unwrap();

        assert_eq!(resumed.config().device, DeviceSelector::new(0));
        assert_eq!(resumed.config().learning_rate, 0.5);
        assert!(!resumed.config().show_progress);
        assert_eq!(resumed.config().tr_sq_ln, 2);
        assert_eq!(resumed.config().output_dir, dir.path());

        resumed.train(2).unwrap();
        let snapshot = CheckpointStore::new(dir.path()).read_snapshot(1, 8, 2).unwrap();
        assert_eq!(snapshot.config.device, DeviceSelector::new(0));
        assert_eq!(snapshot.config.learning_rate, 0.5);
    }

    #[test]
    fn test_plain_load_keeps_saved_settings() {
        let dir      = tempfile::tempdir().unwrap();
        let original = trained(dir.path(), 1);
        let restored = CheckpointStore::new(dir.path())
            .load::<TestBackend>(original.log_store().clone(), 1, 8, 1, Default::default())
            .unwrap();
        assert_eq!(restored.config(), original.config());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir  = tempfile::tempdir().unwrap();
        trained(dir.path(), 1);
        let ckpt = CheckpointStore::new(dir.path());

        let path = ckpt.manifest_path(1, 8, 1);
        let mut snapshot = ckpt.read_snapshot(1, 8, 1).unwrap();
        snapshot.format_version = 99;
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert!(matches!(
            ckpt.read_snapshot(1, 8, 1),
            Err(LogModelError::SnapshotVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_rejects_store_with_other_cardinalities() {
        let dir      = tempfile::tempdir().unwrap();
        let original = trained(dir.path(), 1);

        let mut parts: LogStoreParts = (**original.log_store()).clone().into();
        parts.label_num = 5;
        let other = Arc::new(LogStore::new(parts).unwrap());

        let err = CheckpointStore::new(dir.path())
            .load::<TestBackend>(other, 1, 8, 1, Default::default())
            .err();
        assert!(matches!(err, Some(LogModelError::SnapshotMismatch(_))));
    }

    #[test]
    fn test_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CheckpointStore::new(dir.path()).read_snapshot(0, 8, 1).unwrap_err();
        assert!(matches!(err, LogModelError::Io(_)));
    }
}
