// Configuration - file loading, CLI overrides and pre-I/O validation

mod loader;

pub use loader::{Config, DependencyConfig, MergeConfig, ProjectConfig, StripConfig};

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid whitespace in application name: '{name}'")]
    #[diagnostic(code(appjar::config::whitespace_in_name))]
    WhitespaceInName { name: String },

    #[error("invalid space character in {key}: {value}")]
    #[diagnostic(
        code(appjar::config::space_in_list),
        help("use commas to separate multiple entries")
    )]
    SpaceInList { key: &'static str, value: String },

    #[error("invalid pattern '{pattern}'")]
    #[diagnostic(code(appjar::config::invalid_pattern))]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid root '{root}'")]
    #[diagnostic(
        code(appjar::config::invalid_root),
        help("roots are fully qualified class names, optionally followed by .methodName")
    )]
    InvalidRoot { root: String },

    #[error("missing required setting: {key}")]
    #[diagnostic(code(appjar::config::missing))]
    Missing { key: &'static str },

    #[error("invalid dependency '{spec}'")]
    #[diagnostic(
        code(appjar::config::invalid_dependency),
        help("dependencies are given as LABEL=PATH or LABEL=PATH@SCOPE")
    )]
    InvalidDependency { spec: String },

    #[error("failed to read config file {path}")]
    #[diagnostic(code(appjar::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(code(appjar::config::parse))]
    Parse { path: PathBuf, message: String },
}

/// Split a comma-separated setting. Items are trimmed and empty items
/// skipped; a space inside an item is an error.
pub fn split_list(key: &'static str, value: &str) -> Result<Vec<String>, ConfigError> {
    let mut items = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        if item.contains(char::is_whitespace) {
            return Err(ConfigError::SpaceInList {
                key,
                value: value.to_string(),
            });
        }
        items.push(item.to_string());
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("remove", "").unwrap(), Vec::<String>::new());
        assert_eq!(
            split_list("remove", " META-INF/*.SF, META-INF/*.DSA ,").unwrap(),
            vec!["META-INF/*.SF", "META-INF/*.DSA"]
        );
    }

    #[test]
    fn test_split_list_rejects_inner_space() {
        assert!(matches!(
            split_list("concat", "META-INF/a b"),
            Err(ConfigError::SpaceInList { key: "concat", .. })
        ));
    }
}
