//! Flow IR: the producer's descriptor and the compiler's output shapes.

pub mod types;

pub use types::*;
