// Configuration loader

use super::{split_list, ConfigError};
use crate::archive::PatternSet;
use crate::merge::MergeRules;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `a.b.Main` or `a.b.Main.method`; `$` allowed for nested classes
const ROOT_PATTERN: &str = r"^[A-Za-z_$][\w$]*(\.[A-Za-z_$][\w$]*)*$";

/// Configuration for building an application jar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name; the jar is written as `<name>.jar`
    pub name: String,

    /// Fully qualified main class
    pub main: Option<String>,

    /// Directory the application jar is written to
    pub output_dir: PathBuf,

    /// Explicit output file, overrides `output_dir` + `name`
    pub output: Option<PathBuf>,

    /// The project's own jar or class directory, merged last
    pub project_jar: Option<PathBuf>,

    /// Resolved dependencies in merge order
    pub dependencies: Vec<DependencyConfig>,

    /// Dependency scopes to include
    pub scopes: Vec<String>,

    /// Conflict resolution patterns
    pub merge: MergeConfig,

    /// Unreachable code removal
    pub strip: StripConfig,

    /// Values for the standard manifest headers
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Origin label shown in duplicate reports, usually `group:artifact:version`
    pub label: String,

    pub path: PathBuf,

    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "compile".to_string()
}

impl DependencyConfig {
    /// Parse `LABEL=PATH` or `LABEL=PATH@SCOPE`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDependency { spec: spec.to_string() };
        let (label, rest) = spec.split_once('=').ok_or_else(invalid)?;
        let (path, scope) = match rest.rsplit_once('@') {
            Some((path, scope)) if !scope.is_empty() && scope.chars().all(|c| c.is_ascii_alphabetic()) => {
                (path, scope.to_string())
            }
            _ => (rest, default_scope()),
        };
        if label.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            label: label.to_string(),
            path: PathBuf::from(path),
            scope,
        })
    }
}

/// Comma-separated ant-style pattern lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Deleted from every source before merging
    pub remove: String,

    /// Concatenated across sources
    pub concat: String,

    /// Later sources replace earlier ones
    pub overwrite: String,

    /// Identical copies are accepted
    pub equal: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub enabled: bool,

    /// Extra roots, comma-separated: classes or `Class.method`
    pub roots: String,

    /// Jars or class directories resolvable during analysis but never stripped
    pub runtime_classpath: Vec<PathBuf>,

    /// Fail on references to classes that cannot be found
    pub strict_unresolved: bool,

    /// Strip log, defaults to `<name>-strip.log` next to the output
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub title: Option<String>,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "application".to_string(),
            main: None,
            output_dir: PathBuf::from("target"),
            output: None,
            project_jar: None,
            dependencies: vec![],
            scopes: vec!["compile".to_string(), "runtime".to_string()],
            merge: MergeConfig::default(),
            strip: StripConfig::default(),
            project: ProjectConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
            "toml" => toml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self, ConfigError> {
        let default_names = [
            ".appjar.yml",
            ".appjar.yaml",
            ".appjar.toml",
            "appjar.yml",
            "appjar.yaml",
            "appjar.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }

    /// Check everything that can be checked without touching an archive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(ConfigError::WhitespaceInName { name: self.name.clone() });
        }
        self.merge_rules()?;
        self.roots()?;
        if self.strip.enabled && self.main.is_none() && self.roots()?.is_empty() {
            return Err(ConfigError::Missing { key: "main or strip.roots" });
        }
        Ok(())
    }

    pub fn merge_rules(&self) -> Result<MergeRules, ConfigError> {
        Ok(MergeRules {
            remove: patterns("merge.remove", &self.merge.remove)?,
            concat: patterns("merge.concat", &self.merge.concat)?,
            overwrite: patterns("merge.overwrite", &self.merge.overwrite)?,
            equal: patterns("merge.equal", &self.merge.equal)?,
        })
    }

    /// Strip roots: `main`'s main method first, then the configured extras
    pub fn roots(&self) -> Result<Vec<String>, ConfigError> {
        let mut roots = Vec::new();
        if let Some(main) = &self.main {
            roots.push(format!("{}.main", main));
        }
        roots.extend(split_list("strip.roots", &self.strip.roots)?);
        for root in &roots {
            if !is_valid_root(root) {
                return Err(ConfigError::InvalidRoot { root: root.clone() });
            }
        }
        Ok(roots)
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None => self.output_dir.join(format!("{}.jar", self.name)),
        }
    }

    pub fn strip_log_path(&self) -> PathBuf {
        match &self.strip.log {
            Some(log) => log.clone(),
            None => {
                let output = self.output_path();
                let dir = output.parent().map(Path::to_path_buf).unwrap_or_default();
                dir.join(format!("{}-strip.log", self.name))
            }
        }
    }

    /// Dependencies whose scope is enabled, in declaration order
    pub fn scoped_dependencies(&self) -> impl Iterator<Item = &DependencyConfig> {
        self.dependencies
            .iter()
            .filter(|d| self.scopes.iter().any(|s| s == &d.scope))
    }
}

fn patterns(key: &'static str, value: &str) -> Result<PatternSet, ConfigError> {
    let items = split_list(key, value)?;
    PatternSet::new(&items).map_err(|source| ConfigError::InvalidPattern {
        pattern: value.to_string(),
        source,
    })
}

fn is_valid_root(root: &str) -> bool {
    Regex::new(ROOT_PATTERN)
        .map(|re| re.is_match(root))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scopes, vec!["compile", "runtime"]);
        assert!(!config.strip.enabled);
        assert_eq!(config.output_path(), PathBuf::from("target/application.jar"));
        assert_eq!(config.strip_log_path(), PathBuf::from("target/application-strip.log"));
    }

    #[test]
    fn test_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appjar.yml");
        std::fs::write(
            &path,
            "name: tool\nmain: a.Main\nmerge:\n  remove: META-INF/*.SF\nstrip:\n  enabled: true\n  roots: a.Plugin\n",
        )
        .unwrap();

        let config = Config::from_default_locations(dir.path()).unwrap();
        assert_eq!(config.name, "tool");
        assert!(config.strip.enabled);
        assert_eq!(config.roots().unwrap(), vec!["a.Main.main", "a.Plugin"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::write(
            &path,
            "name = \"tool\"\n[[dependencies]]\nlabel = \"g:a:1\"\npath = \"a.jar\"\nscope = \"test\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dependencies.len(), 1);
        assert_eq!(config.scoped_dependencies().count(), 0);
    }

    #[test]
    fn test_validate_rejects_whitespace_in_name() {
        let config = Config {
            name: "my app".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::WhitespaceInName { .. })));
    }

    #[test]
    fn test_validate_rejects_space_in_pattern_list() {
        let mut config = Config::default();
        config.merge.overwrite = "a/b c".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::SpaceInList { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_root() {
        let mut config = Config::default();
        config.strip.roots = "a.B.method()".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRoot { .. })));
    }

    #[test]
    fn test_dependency_spec() {
        let dep = DependencyConfig::parse("g:a:1=libs/a.jar@runtime").unwrap();
        assert_eq!(dep.label, "g:a:1");
        assert_eq!(dep.path, PathBuf::from("libs/a.jar"));
        assert_eq!(dep.scope, "runtime");
        assert_eq!(DependencyConfig::parse("x=y.jar").unwrap().scope, "compile");
        assert!(DependencyConfig::parse("nolabel").is_err());
    }
}
