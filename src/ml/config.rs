// ============================================================
// Layer 5 — LogModel Configuration
// ============================================================
// Hyperparameters fixed for the lifetime of a LogModel. Saved
// inside every checkpoint so a restored model trains on with the
// same settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::device::DeviceSelector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogModelConfig {
    /// Hidden size of the LSTM and width of every embedding
    pub n_units:       usize,
    /// Truncated-BPTT window, in (current, next) pairs
    pub tr_sq_ln:      usize,
    pub device:        DeviceSelector,
    /// Where checkpoints, stat logs and score files are written
    pub output_dir:    PathBuf,
    /// Adam step size
    pub learning_rate: f64,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_show_progress() -> bool {
    true
}

impl Default for LogModelConfig {
    fn default() -> Self {
        Self {
            n_units:       1000,
            tr_sq_ln:      100,
            device:        DeviceSelector::CPU,
            output_dir:    PathBuf::from("."),
            learning_rate: 1e-3,
            show_progress: default_show_progress(),
        }
    }
}
