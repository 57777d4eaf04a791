// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Turns LogStore columns into device tensors for the model.
//
//   LogStore
//       │
//       ▼
//   ChunkSequence      → one pooled example per timestep
//       │                (leave-one-out or single chunk)
//       ▼
//   SequenceArrayConverter → i32 / f32 tensors on the model's device
//       │
//       ▼
//   AdjacentPairs      → (step t, step t+1)
//       │
//       ▼
//   BpttWindows        → tr_sq_ln pairs at a time
//
// Every stage is a lazy iterator, so memory stays bounded by a
// single window regardless of chunk_num and chunk_size.

/// Column slices → fixed-dtype tensors
pub mod converter;

/// Leave-one-out training and single-chunk evaluation sequences,
/// adjacent pairing and truncated-BPTT windowing
pub mod sequence;

pub use converter::TrainingExample;
pub use sequence::{adjacent_pairs, BpttWindows, ChunkSequence};
