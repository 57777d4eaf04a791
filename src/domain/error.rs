// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Every failure the training core can raise. The application
// and CLI layers wrap these in anyhow with file-path context.

use thiserror::Error;

pub type LogModelResult<T> = Result<T, LogModelError>;

#[derive(Debug, Error)]
pub enum LogModelError {
    /// A parallel sequence disagrees with the store's chunk length.
    #[error("malformed chunk {chunk}: `{field}` has {found} entries, expected {expected}")]
    MalformedChunk {
        chunk:    usize,
        field:    &'static str,
        expected: usize,
        found:    usize,
    },

    /// The five parallel sequences do not hold the same number of chunks.
    #[error("malformed log store: `{field}` holds {found} chunks, expected {expected}")]
    ChunkCountMismatch {
        field:    &'static str,
        expected: usize,
        found:    usize,
    },

    /// Arrays handed to the converter are not the same length.
    #[error("malformed chunk: `{field}` array has {found} entries, expected {expected}")]
    MisalignedArrays {
        field:    &'static str,
        expected: usize,
        found:    usize,
    },

    #[error("categorical `{field}` value {value} at chunk {chunk}, step {step} exceeds cardinality {cardinality}")]
    CategoryOutOfRange {
        field:       &'static str,
        chunk:       usize,
        step:        usize,
        value:       u32,
        cardinality: usize,
    },

    #[error("chunk index {chunk} out of range (chunk_num = {chunk_num})")]
    ChunkOutOfRange { chunk: usize, chunk_num: usize },

    #[error("insufficient sequence length: chunk_size = {chunk_size}, at least 2 steps are required")]
    InsufficientSequenceLength { chunk_size: usize },

    /// Leave-one-out training needs at least one chunk besides the held-out one.
    #[error("leave-one-out training needs at least 2 chunks, store has {chunk_num}")]
    TooFewChunks { chunk_num: usize },

    #[error("truncated BPTT length must be positive")]
    EmptyWindow,

    #[error("device mismatch: model lives on {expected}, data allocated on {found}")]
    DeviceMismatch { expected: String, found: String },

    #[error("unsupported snapshot format version {found} (supported: {supported})")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error("snapshot does not match log store: {0}")]
    SnapshotMismatch(String),

    #[error("model record error: {0}")]
    Record(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
