// ============================================================
// Layer 2 — RocUseCase
// ============================================================
// Joins a score file against the LogStore's ground truth and
// computes the ROC curve of ranking events by outlier factor:
//
//   Step 1: Read "event_id, outlier_factor" rows
//   Step 2: Inner-join on event id with anomaly_seqs
//   Step 3: Sort by score, descending
//   Step 4: Cumulative true / false positive rates
//   Step 5: Area under the curve (trapezoidal)
//
// Output CSV (optional):
//   false_positive_rate,true_positive_rate
//   0,0
//   0,0.5
//   ...
//
// Plotting is left to external tools.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::application::load_log_store;
use crate::infra::scores::read_scores;

#[derive(Debug, Clone)]
pub struct RocConfig {
    pub log_store:  PathBuf,
    pub score_file: PathBuf,
    pub output:     Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate:  f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub points:    Vec<RocPoint>,
    pub auc:       f64,
    pub positives: usize,
    pub negatives: usize,
}

pub struct RocUseCase {
    config: RocConfig,
}

impl RocUseCase {
    pub fn new(config: RocConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RocCurve> {
        let cfg   = &self.config;
        let store = load_log_store(&cfg.log_store)?;
        if !store.has_ground_truth() {
            bail!("Log store '{}' carries no anomaly labels", cfg.log_store.display());
        }

        let scores = read_scores(&cfg.score_file)
            .with_context(|| format!("Cannot read score file '{}'", cfg.score_file.display()))?;
        let truth = store.anomaly_by_id();

        let joined: Vec<(f64, bool)> = scores
            .iter()
            .filter_map(|r| truth.get(r.id.as_str()).map(|&anomalous| (r.score, anomalous)))
            .collect();
        if joined.len() < scores.len() {
            tracing::warn!(
                "{} of {} scored events have no ground truth and were skipped",
                scores.len() - joined.len(),
                scores.len(),
            );
        }

        let curve = roc_curve(joined)?;
        tracing::info!(
            "ROC over {} anomalous / {} normal events: AUC={:.4}",
            curve.positives, curve.negatives, curve.auc,
        );

        if let Some(path) = &cfg.output {
            write_curve(path, &curve)?;
        }
        Ok(curve)
    }
}

/// ROC curve of ranking `(score, is_anomalous)` by descending
/// score. One point per distinct score, starting at (0, 0).
pub fn roc_curve(mut scored: Vec<(f64, bool)>) -> Result<RocCurve> {
    let positives = scored.iter().filter(|(_, anomalous)| *anomalous).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        bail!("ROC needs both anomalous and normal events (got {positives} / {negatives})");
    }

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = Vec::with_capacity(scored.len() + 1);
    points.push(RocPoint { false_positive_rate: 0.0, true_positive_rate: 0.0 });

    // Equal scores share one threshold: a run of ties moves the
    // curve diagonally in a single step.
    let (mut tp, mut fp) = (0usize, 0usize);
    for run in scored.chunk_by(|a, b| a.0 == b.0) {
        let hits = run.iter().filter(|(_, anomalous)| *anomalous).count();
        tp += hits;
        fp += run.len() - hits;
        points.push(RocPoint {
            false_positive_rate: fp as f64 / negatives as f64,
            true_positive_rate:  tp as f64 / positives as f64,
        });
    }

    let auc = points
        .windows(2)
        .map(|w| {
            let width = w[1].false_positive_rate - w[0].false_positive_rate;
            width * (w[0].true_positive_rate + w[1].true_positive_rate) / 2.0
        })
        .sum();

    Ok(RocCurve { points, auc, positives, negatives })
}

fn write_curve(path: &Path, curve: &RocCurve) -> Result<()> {
    let file  = File::create(path).with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "false_positive_rate,true_positive_rate")?;
    for p in &curve.points {
        writeln!(w, "{},{}", p.false_positive_rate, p.true_positive_rate)?;
    }
    w.flush()?;
    tracing::debug!("Wrote {} ROC points to '{}'", curve.points.len(), path.display());
    Ok(())
}
