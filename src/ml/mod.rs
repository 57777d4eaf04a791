// ============================================================
// Layer 5 — ML Layer (burn)
// ============================================================
// All burn model and training code lives here.
//
//   model.rs      — LogLstm, the recurrent next-event predictor,
//                   and the RecurrentState it carries
//
//   log_model.rs  — LogModel, the leave-one-chunk-out engine:
//                   epoch loop, truncated BPTT, Adam updates,
//                   checkpointing and streaming evaluation
//
//   config.rs     — LogModelConfig hyperparameters
//
//   backend.rs    — DeviceSelector → burn backend and device

/// Recurrent model over categorical events
pub mod model;

/// Training / evaluation engine for one held-out chunk
pub mod log_model;

/// LogModel hyperparameters
pub mod config;

/// CPU / accelerator backend dispatch
pub mod backend;

pub use config::LogModelConfig;
pub use log_model::LogModel;
