// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between image files on disk and tensor batches.
//
//   image files (label_xxx.png)
//       │
//       ▼
//   ExampleDirectory  → enumerates files, derives labels
//       │
//       ├── ImagePreprocessor → grayscale [32, max_width] canvas
//       └── LabelCodec        → label text → alphabet indices
//       │
//       ▼
//   OcrDataset        → implements Burn's Dataset trait
//       │
//       ▼
//   DataManager       → train/test split, sequential RawBatches
//       │
//       ▼
//   OcrBatcher        → RawBatch → OcrBatch tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Stacks host batches into tensors
pub mod batcher;

/// Implements Burn's Dataset trait for samples
pub mod dataset;

/// Text ⇄ alphabet index conversion
pub mod label_codec;

/// Loads labelled image files from a directory
pub mod loader;

/// Train/test partitions and sequential batching
pub mod manager;

/// Grayscale conversion, resizing and padding
pub mod preprocessor;

/// Ordered, non-shuffled train/test split
pub mod splitter;
