//! appjar - build a single runnable jar from a project and its dependencies
//!
//! The library is organised around the two halves of the build:
//!
//! 1. **Merge** - dependency jars and the project jar are merged in order
//!    into one [`Archive`], with conflicts settled by pattern rules
//!    (remove, concat, overwrite, equal) and every remaining duplicate
//!    reported at once
//! 2. **Strip** - the merged class files are parsed, the closure of
//!    everything reachable from the entry point is computed, and the rest
//!    is deleted from the archive
//!
//! [`application::Application`] ties both together with configuration,
//! manifest stamping and entry-point verification.

pub mod analysis;
pub mod application;
pub mod archive;
pub mod classfile;
pub mod config;
pub mod error;
pub mod graph;
pub mod merge;
pub mod report;

pub use analysis::{ClassPool, Reachability, ReachabilityAnalyzer, StripLog, StripOptions};
pub use application::{Application, BuildReport};
pub use archive::{Archive, Manifest, PatternSet, VirtualArchive};
pub use classfile::{BinaryUnit, ClassFile};
pub use config::Config;
pub use error::{Error, Result};
pub use graph::{EdgeKind, Symbol, SymbolGraph};
pub use merge::{DuplicateReport, MergeEngine, MergeRules, MergeSummary, SourceArchive};
pub use report::{ReportFormat, Reporter};
