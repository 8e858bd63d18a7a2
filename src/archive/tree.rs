use super::pattern::PatternSet;
use crate::config::ConfigError;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// In-memory file tree addressed by relative `/`-separated paths.
///
/// Directories exist implicitly above every file; empty directories can be
/// recorded explicitly. Mutations are visible immediately, there is no
/// rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualArchive {
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
}

impl VirtualArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file below `root`
    pub fn from_directory(root: &Path) -> Result<Self> {
        let mut archive = Self::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, e.into())
            })?;
            let relative = relative_path(root, entry.path());
            if entry.file_type().is_dir() {
                archive.mkdir(&relative)?;
            } else if entry.file_type().is_file() {
                let bytes = fs::read(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
                archive.write(&relative, bytes)?;
            }
        }
        debug!("loaded {} files from {}", archive.len(), root.display());
        Ok(archive)
    }

    /// Materialise the tree below `root`, creating directories as needed
    pub fn save_to_directory(&self, root: &Path) -> Result<()> {
        for dir in self.directories() {
            let target = root.join(dir);
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        }
        for (path, bytes) in &self.files {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(&target, bytes).map_err(|e| Error::io(&target, e))?;
        }
        Ok(())
    }

    /// Leaf entries matching an ant-style glob, in path order
    pub fn find(&self, glob: &str) -> Result<Vec<String>> {
        let patterns = PatternSet::new(&[glob]).map_err(|source| ConfigError::InvalidPattern {
            pattern: glob.to_string(),
            source,
        })?;
        Ok(self.find_matching(&patterns))
    }

    pub fn find_matching(&self, patterns: &PatternSet) -> Vec<String> {
        self.files
            .keys()
            .filter(|path| patterns.is_match(path))
            .cloned()
            .collect()
    }

    /// Directories matching any of `patterns`
    pub fn find_directories(&self, patterns: &PatternSet) -> Vec<String> {
        self.directories()
            .into_iter()
            .filter(|dir| patterns.is_match(dir))
            .collect()
    }

    pub fn read(&self, path: &str) -> Result<&[u8]> {
        self.files
            .get(path)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFound { path: path.to_string() })
    }

    /// Create or replace a file; parents are created implicitly.
    /// Fails if `path` is a directory or a parent is a file.
    pub fn write(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let path = clean(path);
        if self.is_directory(&path) {
            return Err(Error::AlreadyExists { path });
        }
        self.check_parents(&path)?;
        self.files.insert(path, bytes.into());
        Ok(())
    }

    /// Create a directory (and its parents) if absent
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let path = clean(path);
        if path.is_empty() {
            return Ok(());
        }
        if self.files.contains_key(&path) {
            return Err(Error::AlreadyExists { path });
        }
        self.check_parents(&path)?;
        self.directories.insert(path);
        Ok(())
    }

    fn check_parents(&self, path: &str) -> Result<()> {
        for (idx, _) in path.match_indices('/') {
            let parent = &path[..idx];
            if self.files.contains_key(parent) {
                return Err(Error::AlreadyExists {
                    path: parent.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Delete one file; directories are never deleted through this
    pub fn delete(&mut self, path: &str) -> Result<Vec<u8>> {
        self.files
            .remove(path)
            .ok_or_else(|| Error::NotFound { path: path.to_string() })
    }

    /// Remove and return the file if present
    pub fn take(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        if path.is_empty() || self.directories.contains(path) {
            return true;
        }
        let prefix = format!("{}/", path);
        self.files
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(p, _)| p.starts_with(&prefix))
    }

    /// Byte-for-byte comparison of `path` here against `other_path` in `other`
    pub fn differs(&self, path: &str, other: &VirtualArchive, other_path: &str) -> Result<bool> {
        Ok(self.read(path)? != other.read(other_path)?)
    }

    /// Every directory, explicit or implied by a file, parents first
    pub fn directories(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = BTreeSet::new();
        let explicit = self.directories.iter().map(String::as_str);
        let implied = self.files.keys().filter_map(|p| p.rfind('/').map(|idx| &p[..idx]));
        for dir in explicit.chain(implied) {
            let mut end = dir.len();
            loop {
                all.insert(dir[..end].to_string());
                match dir[..end].rfind('/') {
                    Some(idx) => end = idx,
                    None => break,
                }
            }
        }
        all.into_iter().collect()
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn clean(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(files: &[(&str, &str)]) -> VirtualArchive {
        let mut archive = VirtualArchive::new();
        for (path, content) in files {
            archive.write(path, content.as_bytes()).unwrap();
        }
        archive
    }

    #[test]
    fn test_write_creates_parents() {
        let a = archive(&[("a/b/C.class", "x")]);
        assert!(a.is_directory("a"));
        assert!(a.is_directory("a/b"));
        assert!(!a.is_directory("a/b/C.class"));
        assert!(a.exists("a/b/C.class"));
        assert_eq!(a.directories(), vec!["a".to_string(), "a/b".to_string()]);
    }

    #[test]
    fn test_read_and_delete_missing() {
        let mut a = VirtualArchive::new();
        assert!(matches!(a.read("nope"), Err(Error::NotFound { .. })));
        assert!(matches!(a.delete("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_file_directory_clash() {
        let mut a = archive(&[("a/b", "file")]);
        assert!(matches!(a.write("a/b/c", "x"), Err(Error::AlreadyExists { .. })));
        assert!(matches!(a.write("a", "x"), Err(Error::AlreadyExists { .. })));
        assert!(matches!(a.mkdir("a/b"), Err(Error::AlreadyExists { .. })));
    }

    #[test]
    fn test_find_returns_leaves_only() {
        let a = archive(&[("a/B.class", ""), ("a/c/D.class", ""), ("a/readme.txt", "")]);
        assert_eq!(a.find("**/*.class").unwrap(), vec!["a/B.class", "a/c/D.class"]);
        assert!(a.find("a/c").unwrap().is_empty());
    }

    #[test]
    fn test_differs_compares_bytes() {
        let a = archive(&[("x", "same")]);
        let b = archive(&[("x", "same"), ("y", "other")]);
        assert!(!a.differs("x", &b, "x").unwrap());
        assert!(a.differs("x", &b, "y").unwrap());
    }

    #[test]
    fn test_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = archive(&[("META-INF/services/s", "impl"), ("a/B.class", "b")]);
        a.mkdir("empty/dir").unwrap();
        a.save_to_directory(dir.path()).unwrap();

        let loaded = VirtualArchive::from_directory(dir.path()).unwrap();
        assert_eq!(loaded.read("META-INF/services/s").unwrap(), b"impl");
        assert!(loaded.is_directory("empty/dir"));
        assert_eq!(loaded.len(), 2);
    }
}
