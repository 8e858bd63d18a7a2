// Sweep: drop unreachable classes and members from the archive

use super::reachability::Reachability;
use crate::archive::VirtualArchive;
use crate::classfile::BinaryUnit;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// A retained class that lost some of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedUnit {
    pub name: String,
    /// Removed fields and behaviors, in declaration order
    pub removed: Vec<String>,
}

/// Everything the sweep removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StripLog {
    pub deleted: Vec<String>,
    pub modified: Vec<ModifiedUnit>,
}

impl StripLog {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.modified.is_empty()
    }

    /// Number of removed fields and behaviors across all retained classes
    pub fn removed_members(&self) -> usize {
        self.modified.iter().map(|m| m.removed.len()).sum()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        write!(writer, "{}", self)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))
    }
}

impl fmt::Display for StripLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.deleted {
            writeln!(f, "- {}", name)?;
        }
        for unit in &self.modified {
            writeln!(f, "* {}", unit.name)?;
            for line in &unit.removed {
                writeln!(f, "  - {}", line)?;
            }
        }
        Ok(())
    }
}

enum Action {
    Delete,
    Rewrite(Vec<u8>),
}

/// Remove from `archive` every class file and member outside `reachability`.
///
/// The whole plan is computed, and written to `log` if given, before the
/// archive is touched. Native behaviors and `module-info` are always kept.
pub fn sweep(archive: &mut VirtualArchive, reachability: &Reachability, log: Option<&Path>) -> Result<StripLog> {
    let mut plan: Vec<(String, Action)> = Vec::new();
    let mut strip_log = StripLog::default();

    for (path, bytes) in archive.files() {
        if !path.ends_with(".class") {
            continue;
        }
        let unit = BinaryUnit::parse(bytes).map_err(|e| Error::class_format(path, e))?;
        if unit.is_module() {
            continue;
        }

        if !reachability.contains_unit(&unit.name) {
            debug!("- {}", unit.name);
            strip_log.deleted.push(unit.name.clone());
            plan.push((path.to_string(), Action::Delete));
            continue;
        }

        let mut removed = Vec::new();
        let keep_field = |field: &crate::classfile::Field| reachability.contains_member(&unit.name, &field.name);
        let keep_behavior = |behavior: &crate::classfile::Behavior| {
            behavior.is_native()
                || reachability.contains_behavior(&unit.name, &behavior.name, behavior.parameter_signature())
        };
        for field in unit.fields.iter().filter(|f| !keep_field(*f)) {
            removed.push(field.long_name());
        }
        for behavior in unit.behaviors.iter().filter(|b| !keep_behavior(*b)) {
            removed.push(behavior.display_name());
        }
        if removed.is_empty() {
            continue;
        }

        debug!("* {} ({} members)", unit.name, removed.len());
        let rewritten = unit.to_bytes_retaining(keep_field, keep_behavior);
        plan.push((path.to_string(), Action::Rewrite(rewritten)));
        strip_log.modified.push(ModifiedUnit {
            name: unit.name.clone(),
            removed,
        });
    }

    if let Some(path) = log {
        strip_log.write_to(path)?;
        debug!("strip log written to {}", path.display());
    }

    for (path, action) in plan {
        match action {
            Action::Delete => {
                archive.delete(&path)?;
            }
            Action::Rewrite(bytes) => {
                archive.delete(&path)?;
                archive.write(&path, bytes)?;
            }
        }
    }

    info!(
        "stripped {} classes and {} members",
        strip_log.deleted.len(),
        strip_log.removed_members()
    );
    Ok(strip_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClassPool, ReachabilityAnalyzer};
    use crate::classfile::builder::{ClassBuilder, Op};
    use crate::classfile::{ACC_NATIVE, ACC_PUBLIC, ACC_STATIC};

    fn archive() -> VirtualArchive {
        let mut archive = VirtualArchive::new();
        archive
            .write(
                "java/lang/Object.class",
                ClassBuilder::new("java/lang/Object").no_super_class().build(),
            )
            .unwrap();
        archive
            .write(
                "a/Main.class",
                ClassBuilder::new("a/Main")
                    .method(ACC_PUBLIC | ACC_STATIC, "run", "()V", vec![Op::Return])
                    .method(ACC_PUBLIC, "unused", "(I)Ljava/lang/String;", vec![Op::AconstNull, Op::Areturn])
                    .bodiless_method(ACC_NATIVE, "jni", "()V")
                    .build(),
            )
            .unwrap();
        archive
            .write("a/Dead.class", ClassBuilder::new("a/Dead").build())
            .unwrap();
        archive
    }

    fn strip(archive: &mut VirtualArchive, log: Option<&Path>) -> StripLog {
        let reachability = {
            let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(archive));
            analyzer.add_root("a.Main.run").unwrap();
            analyzer.finish().unwrap()
        };
        sweep(archive, &reachability, log).unwrap()
    }

    #[test]
    fn test_sweep_deletes_and_rewrites() {
        let mut archive = archive();
        let log = strip(&mut archive, None);

        assert_eq!(log.deleted, vec!["a.Dead"]);
        assert_eq!(log.modified.len(), 1);
        assert_eq!(log.modified[0].removed, vec!["java.lang.String a.Main.unused(int)"]);
        assert!(!archive.exists("a/Dead.class"));

        let main = BinaryUnit::parse(archive.read("a/Main.class").unwrap()).unwrap();
        let names: Vec<_> = main.behaviors.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["run", "jni"]);
    }

    #[test]
    fn test_log_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strip.log");
        let mut archive = archive();
        strip(&mut archive, Some(&path));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "- a.Dead\n* a.Main\n  - java.lang.String a.Main.unused(int)\n");
    }
}
