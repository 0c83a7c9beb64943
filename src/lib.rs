//! drydock - declarative build-and-release pipeline
//!
//! Builds a Rust workspace and its web frontend in containers, reusing
//! persistent dependency caches, assembles one minimal runtime image per
//! service, and publishes every image to a registry concurrently.

pub mod artifact;
pub mod assemble;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod orchestration;
pub mod pipeline;
pub mod release;
pub mod source;
pub mod ui;

pub use error::{DrydockError, DrydockResult};
