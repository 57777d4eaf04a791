// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the terminal:
//
//   checkpoint.rs — versioned LogModel snapshots, one per
//                   (chunk, n_units, epoch)
//   metrics.rs    — per-(chunk, n_units) stat log of
//                   "epoch, perplexity" lines
//   scores.rs     — per-(chunk, n_units, epoch) outlier-factor
//                   files of "event_id, score" lines
//   progress.rs   — indicatif progress bars for long loops
//
// Every file name is derived from its key, so LogModels for
// different chunks or hidden sizes can share one output
// directory without colliding.

/// Model snapshot saving and loading
pub mod checkpoint;

/// Per-epoch perplexity log
pub mod metrics;

/// Outlier-factor score files
pub mod scores;

/// Terminal progress reporting
pub mod progress;
