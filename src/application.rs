//! Build pipeline: merge the dependency jars, stamp the manifest, verify the
//! entry point, strip, and publish the result.
//!
//! Each step works on one in-memory [`Archive`]; nothing is written to the
//! output location until every step has succeeded.

use crate::analysis::{self, has_main_method, AnalyzerOptions, Reachability, StripLog, StripOptions, Unresolved};
use crate::archive::manifest::MAIN_CLASS;
use crate::archive::{Archive, Manifest, VirtualArchive};
use crate::classfile::descriptor::class_path;
use crate::classfile::BinaryUnit;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::SymbolCounts;
use crate::merge::{MergeEngine, MergeSummary, SourceArchive};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_VENDOR: &str = "unknown organization";
const UNKNOWN_HOST: &str = "unknownhost";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// What a build produced
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub output: PathBuf,
    pub merge: MergeSummary,
    pub main_class: Option<String>,
    pub strip: Option<StripReport>,
    /// Kept for `--why` queries; not part of the serialised report
    #[serde(skip)]
    pub reachability: Option<Reachability>,
}

#[derive(Debug, Serialize)]
pub struct StripReport {
    pub reachable: SymbolCounts,
    pub log_path: PathBuf,
    pub log: StripLog,
    pub unresolved: Vec<Unresolved>,
    pub native_methods: Vec<String>,
}

/// Pipeline progress, reported once per step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    Merging { label: &'a str, index: usize, total: usize },
    Verifying,
    Stripping,
    Writing,
}

pub struct Application {
    config: Config,
}

impl Application {
    /// Validates `config` before anything is read
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge inputs in order: scoped dependencies, then the project jar
    pub fn inputs(&self) -> Vec<(String, PathBuf)> {
        let mut inputs: Vec<(String, PathBuf)> = self
            .config
            .scoped_dependencies()
            .map(|d| (d.label.clone(), d.path.clone()))
            .collect();
        if let Some(project) = &self.config.project_jar {
            inputs.push((self.project_label(), project.clone()));
        }
        inputs
    }

    fn project_label(&self) -> String {
        match (&self.config.project.group_id, &self.config.project.artifact_id) {
            (Some(group), Some(artifact)) => format!("{}:{}", group, artifact),
            _ => self.config.name.clone(),
        }
    }

    pub fn build(&self) -> Result<BuildReport> {
        self.build_with(|_| {})
    }

    pub fn build_with(&self, mut progress: impl FnMut(Progress<'_>)) -> Result<BuildReport> {
        let (mut archive, merge) = self.assemble(&mut progress)?;

        if let Some(main) = &self.config.main {
            progress(Progress::Verifying);
            verify_entry_point(&archive.data, main)?;
        }

        let mut reachability = None;
        let strip = if self.config.strip.enabled {
            progress(Progress::Stripping);
            let (result, report) = self.strip(&mut archive.data)?;
            reachability = Some(result);
            Some(report)
        } else {
            None
        };

        progress(Progress::Writing);
        let output = self.config.output_path();
        publish(&archive, &output)?;
        info!("wrote {}", output.display());

        Ok(BuildReport {
            output,
            merge,
            main_class: self.config.main.clone(),
            strip,
            reachability,
        })
    }

    /// Merge every input and set the standard manifest headers
    pub fn assemble(&self, progress: &mut dyn FnMut(Progress<'_>)) -> Result<(Archive, MergeSummary)> {
        let engine = MergeEngine::new(self.config.merge_rules()?);
        let mut archive = Archive::new();
        let inputs = self.inputs();
        let total = inputs.len();

        let mut merge = engine.begin(&mut archive);
        for (index, (label, path)) in inputs.iter().enumerate() {
            progress(Progress::Merging { label, index, total });
            merge.add(SourceArchive::load(label.as_str(), path)?)?;
        }
        let summary = merge.finish()?;

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        standard_attributes(&mut archive.manifest, &self.config, &timestamp, &build_vendor());
        Ok((archive, summary))
    }

    fn strip(&self, data: &mut VirtualArchive) -> Result<(Reachability, StripReport)> {
        let log_path = self.config.strip_log_path();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let options = StripOptions {
            roots: self.config.roots()?,
            runtime_classpath: self.config.strip.runtime_classpath.clone(),
            analyzer: AnalyzerOptions {
                strict_unresolved: self.config.strip.strict_unresolved,
            },
            log: Some(log_path.clone()),
        };
        let (reachability, log) = analysis::strip(data, &options)?;
        let report = StripReport {
            reachable: reachability.graph().counts(),
            log_path,
            log,
            unresolved: reachability.unresolved().to_vec(),
            native_methods: reachability.native_methods().to_vec(),
        };
        Ok((reachability, report))
    }
}

/// The main class must be in the archive and declare `public static void main(String[])`
pub fn verify_entry_point(data: &VirtualArchive, main: &str) -> Result<()> {
    let missing = |reason: &str| Error::EntryPointMissing {
        main: main.to_string(),
        reason: reason.to_string(),
    };
    let path = class_path(main);
    let bytes = data.read(&path).map_err(|_| missing("class not found in the merged archive"))?;
    let unit = BinaryUnit::parse(bytes).map_err(|e| Error::class_format(&path, e))?;
    if !has_main_method(&unit) {
        return Err(missing("no public static void main(String[]) method"));
    }
    debug!("entry point {} verified", main);
    Ok(())
}

/// Specification and implementation headers plus `Main-Class`; overrides merged values
pub fn standard_attributes(manifest: &mut Manifest, config: &Config, timestamp: &str, vendor: &str) {
    let project = &config.project;
    manifest.set(
        "Specification-Title",
        project.title.clone().unwrap_or_else(|| config.name.clone()),
    );
    if let Some(version) = &project.version {
        manifest.set("Specification-Version", version.as_str());
    }
    manifest.set(
        "Specification-Vendor",
        project.vendor.clone().unwrap_or_else(|| DEFAULT_VENDOR.to_string()),
    );
    let title = match (&project.group_id, &project.artifact_id) {
        (Some(group), Some(artifact)) => format!("{}:{}", group, artifact),
        _ => config.name.clone(),
    };
    manifest.set("Implementation-Title", title);
    manifest.set("Implementation-Version", timestamp);
    manifest.set("Implementation-Vendor", vendor);
    if let Some(main) = &config.main {
        manifest.set(MAIN_CLASS, main.as_str());
    }
}

/// `user@host` of whoever runs the build
fn build_vendor() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string());
    format!("{}@{}", user, host)
}

/// Write to a temporary file next to `output`, then move it into place
fn publish(archive: &Archive, output: &Path) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
    let label = output.display().to_string();
    archive.save(staged.as_file_mut(), &label)?;
    staged.persist(output).map_err(|e| Error::io(output, e.error))?;
    Ok(())
}
