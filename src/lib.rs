pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod ir;
pub mod lower;
pub mod parse;
pub mod repair;
pub mod safety;
pub mod validate;
pub mod wasm;

#[cfg(not(target_arch = "wasm32"))]
pub mod auth;
#[cfg(not(target_arch = "wasm32"))]
pub mod pipeline;
