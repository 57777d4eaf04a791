// ============================================================
// Layer 3 — Core Traits
// ============================================================
// Abstractions the other layers implement. The application
// layer works against these rather than concrete file formats.

use std::path::Path;

use crate::domain::error::LogModelResult;

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved to and restored from disk.
///
/// Implementations:
///   - LogStore → JSON document of the preprocessed log
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &Path) -> LogModelResult<()>;

    /// Load a component's state from the given path.
    fn load(path: &Path) -> LogModelResult<Self>;
}
