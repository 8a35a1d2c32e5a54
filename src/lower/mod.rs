//! Lowering phase: FlowDescriptor → engine mutations.
//!
//! `trigger` and `step` are pure translations to wire requests; `builder`
//! issues them against an [`EngineClient`](crate::engine::EngineClient).

#[cfg(not(target_arch = "wasm32"))]
pub mod builder;
pub mod step;
pub mod trigger;

#[cfg(not(target_arch = "wasm32"))]
pub use builder::{CompileOptions, GraphCompiler};

/// Version range sent with every piece reference.
pub(crate) const PIECE_VERSION: &str = "~0.0.0";
