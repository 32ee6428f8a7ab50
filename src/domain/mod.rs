// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO ML-specific code
//   - Only structs, enums, traits and the error taxonomy
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Ordered symbol set and blank class
pub mod alphabet;

// Error taxonomy shared by all layers
pub mod error;

// Sparse (row, column) → symbol label representation
pub mod labels;

// Pixel canvases and labelled samples
pub mod sample;

// Core abstractions (traits) that other layers implement
pub mod traits;
