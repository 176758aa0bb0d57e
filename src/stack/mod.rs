//! Stack composition: configuration, the resource graph and its synthesized
//! manifest.

pub mod config;
mod graph;
mod manifest;

pub use config::StackConfig;
pub use graph::StackGraph;
pub use manifest::{ResourceManifest, StackManifest, StageManifest};
