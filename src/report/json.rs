use crate::application::BuildReport;
use crate::graph::{EdgeKind, Symbol};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    #[serde(flatten)]
    build: &'a BuildReport,
}

#[derive(Serialize)]
struct JsonExplanation<'a> {
    symbol: &'a str,
    reachable: bool,
    chain: Vec<JsonStep<'a>>,
}

#[derive(Serialize)]
struct JsonStep<'a> {
    via: Option<String>,
    symbol: &'a Symbol,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, build: &BuildReport) -> Result<()> {
        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            build,
        };
        self.emit(&serde_json::to_string_pretty(&report).into_diagnostic()?)
    }

    pub fn explain(&self, symbol: &str, chain: Option<&[(Option<EdgeKind>, &Symbol)]>) -> Result<()> {
        let explanation = JsonExplanation {
            symbol,
            reachable: chain.is_some(),
            chain: chain
                .unwrap_or_default()
                .iter()
                .map(|(edge, step)| JsonStep {
                    via: edge.map(|kind| kind.to_string()),
                    symbol: step,
                })
                .collect(),
        };
        self.emit(&serde_json::to_string_pretty(&explanation).into_diagnostic()?)
    }

    fn emit(&self, json: &str) -> Result<()> {
        if let Some(path) = &self.output_path {
            std::fs::write(path, json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }
        Ok(())
    }
}
