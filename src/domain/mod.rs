// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing what the system works on:
//
//   log_store.rs — the chunked categorical event log
//   device.rs    — CPU / accelerator selection as a value
//   error.rs     — the error vocabulary shared by every layer
//
// No burn types and no training code live here, so everything
// in this layer is testable without a backend.

/// Chunked, parallel per-event sequences plus their cardinalities
pub mod log_store;

/// Explicit device selection (-1 = CPU, n >= 0 = accelerator n)
pub mod device;

/// Typed errors raised by the core
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
