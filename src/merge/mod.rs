//! Archive merge engine
//!
//! Sources are merged into a destination [`Archive`] strictly in the order
//! they are added. Per source:
//!
//! 1. entries matching a `remove` pattern are deleted (files only)
//! 2. entries matching a `concat` pattern are appended to the destination copy
//! 3. the plexus component registry is lifted out and accumulated
//! 4. remaining files are copied; conflicts go through `overwrite` / `equal`
//!    or are recorded as duplicates
//! 5. manifest headers are merged, later sources winning
//!
//! Duplicates never stop the merge early; [`Merge::finish`] reports all of
//! them at once.

mod duplicates;
mod registry;

pub use duplicates::{DuplicateGroup, DuplicateReport, Provenance};
pub use registry::{ComponentRegistry, REGISTRY_PATH};

use crate::archive::{Archive, PatternSet};
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Conflict resolution patterns
#[derive(Debug, Clone, Default)]
pub struct MergeRules {
    pub remove: PatternSet,
    pub concat: PatternSet,
    pub overwrite: PatternSet,
    pub equal: PatternSet,
}

/// One archive to merge, tagged with the label used in duplicate reports
#[derive(Debug, Clone)]
pub struct SourceArchive {
    pub label: String,
    pub archive: Archive,
}

impl SourceArchive {
    pub fn new(label: impl Into<String>, archive: Archive) -> Self {
        Self {
            label: label.into(),
            archive,
        }
    }

    pub fn load(label: impl Into<String>, path: &Path) -> Result<Self> {
        Ok(Self::new(label, Archive::load(path)?))
    }
}

/// What happened during a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub sources: usize,
    pub copied: usize,
    pub removed: usize,
    pub concatenated: usize,
    pub overwritten: usize,
    pub equal: usize,
    pub registry_components: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    rules: MergeRules,
}

impl MergeEngine {
    pub fn new(rules: MergeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    /// Start merging into `dest`
    pub fn begin<'a>(&'a self, dest: &'a mut Archive) -> Merge<'a> {
        Merge {
            rules: &self.rules,
            dest,
            provenance: Provenance::new(),
            duplicates: BTreeSet::new(),
            registry: None,
            summary: MergeSummary::default(),
        }
    }

    /// Merge all `sources` in order
    pub fn merge_all(
        &self,
        dest: &mut Archive,
        sources: impl IntoIterator<Item = SourceArchive>,
    ) -> Result<MergeSummary> {
        let mut merge = self.begin(dest);
        for source in sources {
            merge.add(source)?;
        }
        merge.finish()
    }
}

/// A merge in progress; owns the duplicate bookkeeping until [`Merge::finish`]
pub struct Merge<'a> {
    rules: &'a MergeRules,
    dest: &'a mut Archive,
    provenance: Provenance,
    duplicates: BTreeSet<String>,
    registry: Option<ComponentRegistry>,
    summary: MergeSummary,
}

impl Merge<'_> {
    pub fn add(&mut self, source: SourceArchive) -> Result<()> {
        let SourceArchive { label, archive } = source;
        let Archive { mut data, manifest } = archive;
        info!("+ {} ({} entries)", label, data.len());

        // 1. remove
        for dir in data.find_directories(&self.rules.remove) {
            debug!("not removing directory {}!{}", label, dir);
        }
        for path in data.find_matching(&self.rules.remove) {
            debug!("removing {}!{}", label, path);
            data.delete(&path)?;
            self.summary.removed += 1;
        }

        // 2. concat
        for path in data.find_matching(&self.rules.concat) {
            let addition = data.delete(&path)?;
            let mut combined = match self.dest.data.read(&path) {
                Ok(existing) => existing.to_vec(),
                Err(Error::NotFound { .. }) => Vec::new(),
                Err(err) => return Err(err),
            };
            if !combined.is_empty() && !combined.ends_with(b"\n") {
                combined.push(b'\n');
            }
            combined.extend_from_slice(&addition);
            debug!("concatenating {}!{}", label, path);
            self.dest.data.write(&path, combined)?;
            self.summary.concatenated += 1;
        }

        // 3. component registry
        if let Some(xml) = data.take(REGISTRY_PATH) {
            self.registry
                .get_or_insert_with(ComponentRegistry::new)
                .merge(&xml, &label)?;
        }

        // 4. copy
        for dir in data.directories() {
            self.dest.data.mkdir(&dir)?;
        }
        for (path, bytes) in data.files() {
            self.provenance.record(path, &label);
            if !self.dest.data.is_file(path) {
                self.dest.data.write(path, bytes)?;
                self.summary.copied += 1;
                continue;
            }
            let differs = self.dest.data.read(path)? != bytes;
            if differs {
                if self.rules.overwrite.is_match(path) {
                    debug!("overwrite different {}", path);
                    self.dest.data.write(path, bytes)?;
                    self.summary.overwritten += 1;
                } else {
                    self.duplicates.insert(path.to_string());
                }
            } else if self.rules.overwrite.is_match(path) {
                debug!("overwrite equal {}", path);
                self.summary.equal += 1;
            } else if self.rules.equal.is_match(path) {
                debug!("equal {}", path);
                self.summary.equal += 1;
            } else {
                self.duplicates.insert(path.to_string());
            }
        }

        // 5. manifest
        self.dest.manifest.merge(&manifest);

        self.summary.sources += 1;
        Ok(())
    }

    /// Paths found to conflict so far
    pub fn duplicates(&self) -> &BTreeSet<String> {
        &self.duplicates
    }

    /// Fail with every duplicate, or write the merged registry and return the summary
    pub fn finish(self) -> Result<MergeSummary> {
        let Merge {
            dest,
            provenance,
            duplicates,
            registry,
            mut summary,
            ..
        } = self;

        if !duplicates.is_empty() {
            return Err(Error::DuplicateEntries(provenance.into_report(&duplicates)));
        }

        if let Some(registry) = registry {
            debug!("merged plexus components");
            summary.registry_components = registry.len();
            dest.data.write(REGISTRY_PATH, registry.to_bytes()?)?;
        }
        Ok(summary)
    }
}
