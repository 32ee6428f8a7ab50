// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence that several layers share:
//
//   checkpoint.rs — model weights and run configuration
//                   Burn's CompactRecorder for numbered
//                   checkpoints (newest 10 kept), a JSON
//                   pointer to the latest one, the saved
//                   TrainConfig and the exported evaluation
//                   model with its manifest.
//
//   metrics.rs    — per-iteration CSV log
//                   step, summed loss, error rate and batch
//                   counts appended after each iteration.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoints, training config and model export
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
