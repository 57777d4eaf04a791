// ============================================================
// Layer 3 — LogStore
// ============================================================
// The preprocessed event log, split into `chunk_num` chunks of
// `chunk_size` events each. Every event is stored column-wise in
// five parallel sequences:
//
//   label_seqs[chunk][t]    categorical, < label_num
//   note_seqs[chunk][t]     categorical, < note_num
//   command_seqs[chunk][t]  categorical, < command_num
//   value_seqs[chunk][t]    numeric
//   id_seqs[chunk][t]       opaque event identifier
//
// plus an optional ground-truth column `anomaly_seqs` used only
// by ROC analysis.
//
// A LogStore can only be built through `LogStore::new`, which
// checks the shape invariants once. Everything downstream
// (sequence generators, evaluation, score files) indexes it
// without re-checking.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::error::{LogModelError, LogModelResult};
use crate::domain::traits::Persistable;

// ─── LogStoreParts ────────────────────────────────────────────────────────────
/// Unvalidated column data, as produced by preprocessing or read
/// from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStoreParts {
    pub label_seqs:   Vec<Vec<u32>>,
    pub note_seqs:    Vec<Vec<u32>>,
    pub command_seqs: Vec<Vec<u32>>,
    pub value_seqs:   Vec<Vec<f32>>,
    pub id_seqs:      Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomaly_seqs: Vec<Vec<bool>>,
    pub label_num:    usize,
    pub note_num:     usize,
    pub command_num:  usize,
}

// ─── LogStore ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LogStoreParts", into = "LogStoreParts")]
pub struct LogStore {
    parts:      LogStoreParts,
    chunk_size: usize,
}

impl LogStore {
    /// Validate column data and build a store.
    ///
    /// Fails with `ChunkCountMismatch` when the columns hold a
    /// different number of chunks, `MalformedChunk` when any chunk
    /// is not `chunk_size` long, and `CategoryOutOfRange` when a
    /// categorical id is not below its cardinality.
    pub fn new(parts: LogStoreParts) -> LogModelResult<Self> {
        let chunk_num  = parts.label_seqs.len();
        let chunk_size = parts.label_seqs.first().map_or(0, Vec::len);

        check_chunk_count("note_seqs",    parts.note_seqs.len(),    chunk_num)?;
        check_chunk_count("command_seqs", parts.command_seqs.len(), chunk_num)?;
        check_chunk_count("value_seqs",   parts.value_seqs.len(),   chunk_num)?;
        check_chunk_count("id_seqs",      parts.id_seqs.len(),      chunk_num)?;
        if !parts.anomaly_seqs.is_empty() {
            check_chunk_count("anomaly_seqs", parts.anomaly_seqs.len(), chunk_num)?;
        }

        for chunk in 0..chunk_num {
            check_len(chunk, "label_seqs",   parts.label_seqs[chunk].len(),   chunk_size)?;
            check_len(chunk, "note_seqs",    parts.note_seqs[chunk].len(),    chunk_size)?;
            check_len(chunk, "command_seqs", parts.command_seqs[chunk].len(), chunk_size)?;
            check_len(chunk, "value_seqs",   parts.value_seqs[chunk].len(),   chunk_size)?;
            check_len(chunk, "id_seqs",      parts.id_seqs[chunk].len(),      chunk_size)?;
            if !parts.anomaly_seqs.is_empty() {
                check_len(chunk, "anomaly_seqs", parts.anomaly_seqs[chunk].len(), chunk_size)?;
            }

            check_range(chunk, "label_seqs",   &parts.label_seqs[chunk],   parts.label_num)?;
            check_range(chunk, "note_seqs",    &parts.note_seqs[chunk],    parts.note_num)?;
            check_range(chunk, "command_seqs", &parts.command_seqs[chunk], parts.command_num)?;
        }

        tracing::debug!(
            "LogStore validated: {} chunks x {} events (labels={}, notes={}, commands={})",
            chunk_num, chunk_size, parts.label_num, parts.note_num, parts.command_num,
        );

        Ok(Self { parts, chunk_size })
    }

    pub fn chunk_num(&self) -> usize {
        self.parts.label_seqs.len()
    }

    /// Events per chunk; every chunk has the same length.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn label_num(&self) -> usize {
        self.parts.label_num
    }

    pub fn note_num(&self) -> usize {
        self.parts.note_num
    }

    pub fn command_num(&self) -> usize {
        self.parts.command_num
    }

    /// Borrow one chunk's columns, or `ChunkOutOfRange`.
    pub fn chunk(&self, chunk: usize) -> LogModelResult<ChunkView<'_>> {
        self.check_chunk(chunk)?;
        Ok(ChunkView {
            labels:   &self.parts.label_seqs[chunk],
            notes:    &self.parts.note_seqs[chunk],
            commands: &self.parts.command_seqs[chunk],
            values:   &self.parts.value_seqs[chunk],
        })
    }

    pub fn check_chunk(&self, chunk: usize) -> LogModelResult<()> {
        if chunk >= self.chunk_num() {
            return Err(LogModelError::ChunkOutOfRange { chunk, chunk_num: self.chunk_num() });
        }
        Ok(())
    }

    /// Identifier of event `step` in `chunk`. Callers index inside
    /// bounds they already checked against `chunk_size`.
    pub fn event_id(&self, chunk: usize, step: usize) -> &str {
        &self.parts.id_seqs[chunk][step]
    }

    pub fn has_ground_truth(&self) -> bool {
        !self.parts.anomaly_seqs.is_empty()
    }

    /// Ground truth keyed by event id. Empty when the store was
    /// built without `anomaly_seqs`.
    pub fn anomaly_by_id(&self) -> HashMap<&str, bool> {
        self.parts
            .id_seqs
            .iter()
            .zip(&self.parts.anomaly_seqs)
            .flat_map(|(ids, flags)| ids.iter().map(String::as_str).zip(flags.iter().copied()))
            .collect()
    }
}

impl TryFrom<LogStoreParts> for LogStore {
    type Error = LogModelError;

    fn try_from(parts: LogStoreParts) -> Result<Self, Self::Error> {
        Self::new(parts)
    }
}

impl From<LogStore> for LogStoreParts {
    fn from(store: LogStore) -> Self {
        store.parts
    }
}

impl Persistable for LogStore {
    fn save(&self, path: &Path) -> LogModelResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    fn load(path: &Path) -> LogModelResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── ChunkView ────────────────────────────────────────────────────────────────
/// Borrowed columns of a single chunk, all of length `chunk_size`.
#[derive(Debug, Clone, Copy)]
pub struct ChunkView<'a> {
    pub labels:   &'a [u32],
    pub notes:    &'a [u32],
    pub commands: &'a [u32],
    pub values:   &'a [f32],
}

// ─── Validation helpers ───────────────────────────────────────────────────────
fn check_chunk_count(field: &'static str, found: usize, expected: usize) -> LogModelResult<()> {
    if found != expected {
        return Err(LogModelError::ChunkCountMismatch { field, expected, found });
    }
    Ok(())
}

fn check_len(chunk: usize, field: &'static str, found: usize, expected: usize) -> LogModelResult<()> {
    if found != expected {
        return Err(LogModelError::MalformedChunk { chunk, field, expected, found });
    }
    Ok(())
}

fn check_range(chunk: usize, field: &'static str, values: &[u32], cardinality: usize) -> LogModelResult<()> {
    match values.iter().position(|&v| v as usize >= cardinality) {
        Some(step) => Err(LogModelError::CategoryOutOfRange {
            field, chunk, step, value: values[step], cardinality,
        }),
        None => Ok(()),
    }
}

// ─── Test fixtures ────────────────────────────────────────────────────────────
/// Deterministic synthetic store shared by tests across layers.
/// Chunk `c`, step `t` carries label `(c + t) % label_num`, values
/// `c * 10 + t` and id `"c{c}-e{t}"`, so the origin of every pooled
/// element can be read back from its value.
#[cfg(test)]
pub fn synthetic_store(chunk_num: usize, chunk_size: usize, cardinality: usize) -> LogStore {
    let mut parts = LogStoreParts {
        label_num:   cardinality,
        note_num:    cardinality,
        command_num: cardinality,
        ..Default::default()
    };
    for c in 0..chunk_num {
        let steps = 0..chunk_size;
        parts.label_seqs.push(steps.clone().map(|t| ((c + t) % cardinality) as u32).collect());
        parts.note_seqs.push(steps.clone().map(|t| ((c * 2 + t) % cardinality) as u32).collect());
        parts.command_seqs.push(steps.clone().map(|t| (t % cardinality) as u32).collect());
        parts.value_seqs.push(steps.clone().map(|t| (c * 10 + t) as f32).collect());
        parts.id_seqs.push(steps.clone().map(|t| format!("c{c}-e{t}")).collect());
        parts.anomaly_seqs.push(steps.map(|t| t % 3 == 2).collect());
    }
    LogStore::new(parts).expect("synthetic store is well formed")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let store = synthetic_store(3, 4, 2);
        assert_eq!(store.chunk_num(),  3);
        assert_eq!(store.chunk_size(), 4);
        assert_eq!(store.label_num(),  2);
        assert_eq!(store.event_id(1, 3), "c1-e3");
    }

    #[test]
    fn test_short_chunk_is_malformed() {
        let mut parts: LogStoreParts = synthetic_store(2, 4, 2).into();
        parts.value_seqs[1].pop();
        let err = LogStore::new(parts).unwrap_err();
        assert!(matches!(
            err,
            LogModelError::MalformedChunk { chunk: 1, field: "value_seqs", expected: 4, found: 3 }
        ));
    }

    #[test]
    fn test_missing_chunk_column() {
        let mut parts: LogStoreParts = synthetic_store(2, 4, 2).into();
        parts.id_seqs.pop();
        let err = LogStore::new(parts).unwrap_err();
        assert!(matches!(err, LogModelError::ChunkCountMismatch { field: "id_seqs", .. }));
    }

    #[test]
    fn test_category_out_of_range() {
        let mut parts: LogStoreParts = synthetic_store(2, 4, 2).into();
        parts.command_seqs[0][2] = 5;
        let err = LogStore::new(parts).unwrap_err();
        assert!(matches!(
            err,
            LogModelError::CategoryOutOfRange { field: "command_seqs", chunk: 0, step: 2, value: 5, .. }
        ));
    }

    #[test]
    fn test_chunk_out_of_range() {
        let store = synthetic_store(2, 4, 2);
        assert!(store.chunk(1).is_ok());
        assert!(matches!(
            store.chunk(2),
            Err(LogModelError::ChunkOutOfRange { chunk: 2, chunk_num: 2 })
        ));
    }

    #[test]
    fn test_json_round_trip_revalidates() {
        let dir   = tempfile::tempdir().unwrap();
        let path  = dir.path().join("store.json");
        let store = synthetic_store(3, 5, 3);
        store.save(&path).unwrap();

        let loaded = LogStore::load(&path).unwrap();
        assert_eq!(loaded.chunk_num(),  3);
        assert_eq!(loaded.chunk_size(), 5);
        assert!(loaded.has_ground_truth());

        // A hand-edited file that breaks the shape must be rejected on load
        let mut parts: LogStoreParts = store.into();
        parts.note_seqs[2].push(0);
        fs::write(&path, serde_json::to_string(&parts).unwrap()).unwrap();
        assert!(LogStore::load(&path).is_err());
    }

    #[test]
    fn test_anomaly_lookup_by_id() {
        let store  = synthetic_store(2, 3, 2);
        let truth  = store.anomaly_by_id();
        assert_eq!(truth.len(), 6);
        assert_eq!(truth.get("c0-e2"), Some(&true));
        assert_eq!(truth.get("c1-e0"), Some(&false));
    }
}
