//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the analysis logic and the systems that persist model artifacts.

mod model_store;

pub use model_store::ModelStore;
