// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: load the LogStore, pick a backend,
// drive LogModel or the score analysis, and report results back
// to the CLI. No tensor code and no printing here.

// Leave-one-chunk-out training, optionally resumed from checkpoints
pub mod train_use_case;

// Re-scoring a held-out chunk from a saved checkpoint
pub mod eval_use_case;

// ROC analysis of a score file against LogStore ground truth
pub mod roc_use_case;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

use crate::domain::{log_store::LogStore, traits::Persistable};

/// Load and validate a preprocessed LogStore.
pub fn load_log_store(path: &Path) -> Result<Arc<LogStore>> {
    let store = LogStore::load(path)
        .with_context(|| format!("Cannot load log store '{}'", path.display()))?;
    tracing::info!(
        "Loaded log store '{}': {} chunks x {} events",
        path.display(),
        store.chunk_num(),
        store.chunk_size(),
    );
    Ok(Arc::new(store))
}
