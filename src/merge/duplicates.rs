use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which sources reached the copy step with which paths, for the lifetime
/// of one merge. Entries deleted by `remove` or consumed by `concat` are
/// never recorded.
#[derive(Debug, Default)]
pub struct Provenance {
    origins: BTreeMap<String, Vec<String>>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str, label: &str) {
        let labels = self.origins.entry(path.to_string()).or_default();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }

    pub fn origins(&self, path: &str) -> &[String] {
        self.origins.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the report for `duplicates`, consuming the provenance
    pub fn into_report(self, duplicates: &BTreeSet<String>) -> DuplicateReport {
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for path in duplicates {
            let origins = self.origins(path).to_vec();
            match groups.iter_mut().find(|g| g.origins == origins) {
                Some(group) => group.paths.push(path.clone()),
                None => groups.push(DuplicateGroup {
                    origins,
                    paths: vec![path.clone()],
                }),
            }
        }
        DuplicateReport { groups }
    }
}

/// Paths that share the same list of origin labels.
///
/// `origins` lists every source that offered a copy of the path for copying,
/// in merge order, including sources whose copy matched the one kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub origins: Vec<String>,
    pub paths: Vec<String>,
}

/// Every conflicting path of a merge, grouped by origins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }

    /// Origins recorded for one path
    pub fn origins(&self, path: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.paths.iter().any(|p| p == path))
            .map(|g| g.origins.as_slice())
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(f, "  [{}]:", group.origins.join(", "))?;
            for path in &group.paths {
                writeln!(f, "    {}", path)?;
            }
        }
        Ok(())
    }
}
