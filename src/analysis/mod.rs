//! Reachability analysis and stripping of compiled classes
//!
//! The pipeline is the same as for any whole-program shrinker:
//! 1. **Class pool** - resolve classes from the archive, then the runtime classpath
//! 2. **Closure** - grow the reachable set from the roots until nothing new appears
//! 3. **Sweep** - delete unreachable classes and members from the archive

mod classpath;
mod reachability;
mod sweep;

pub use classpath::{open_runtime, ClassPool, ClassSource, DirectorySource, JarSource, Origin};
pub use reachability::{
    has_main_method, AnalyzerOptions, Reachability, ReachabilityAnalyzer, Unresolved, NATIVE_ALLOW_LIST,
};
pub use sweep::{sweep, ModifiedUnit, StripLog};

use crate::archive::VirtualArchive;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// How to strip an archive
#[derive(Debug, Clone, Default)]
pub struct StripOptions {
    /// Root symbols: `a.b.Class` or `a.b.Class.method`
    pub roots: Vec<String>,
    /// Jars, jmods or class directories that resolve but are never swept
    pub runtime_classpath: Vec<PathBuf>,
    pub analyzer: AnalyzerOptions,
    /// Where to write the strip log
    pub log: Option<PathBuf>,
}

/// Compute the closure of `options.roots` over `archive` and sweep everything else
pub fn strip(archive: &mut VirtualArchive, options: &StripOptions) -> Result<(Reachability, StripLog)> {
    let reachability = analyze(archive, &options.roots, &options.runtime_classpath, &options.analyzer)?;
    let counts = reachability.graph().counts();
    info!(
        "reachable: {} classes, {} behaviors, {} fields",
        counts.units, counts.behaviors, counts.members
    );
    let log = sweep(archive, &reachability, options.log.as_deref())?;
    Ok((reachability, log))
}

/// Closure only; the archive is left untouched
pub fn analyze(
    archive: &VirtualArchive,
    roots: &[String],
    runtime_classpath: &[PathBuf],
    options: &AnalyzerOptions,
) -> Result<Reachability> {
    let mut pool = ClassPool::new(archive);
    for path in runtime_classpath {
        pool.add_runtime(open_runtime(Path::new(path))?);
    }
    let mut analyzer = ReachabilityAnalyzer::with_options(pool, options.clone());
    for root in roots {
        analyzer.add_root(root)?;
    }
    analyzer.finish()
}
