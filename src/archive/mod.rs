// Archive module - path-addressed file trees, jar I/O and manifests

mod jar;
pub mod manifest;
mod pattern;
mod tree;

pub use jar::Archive;
pub use manifest::{Attributes, Manifest, ManifestError};
pub use pattern::PatternSet;
pub use tree::VirtualArchive;
