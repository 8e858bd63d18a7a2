mod json;
mod terminal;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::application::BuildReport;
use crate::graph::{EdgeKind, Symbol};
use miette::Result;
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

/// Prints the outcome of a build
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self { format, output_path }
    }

    pub fn report(&self, build: &BuildReport) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => TerminalReporter::new().report(build),
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).report(build),
        }
    }

    /// Print how `symbol` was reached, or that it was not
    pub fn explain(&self, symbol: &str, chain: Option<Vec<(Option<EdgeKind>, &Symbol)>>) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => {
                TerminalReporter::new().explain(symbol, chain.as_deref());
                Ok(())
            }
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).explain(symbol, chain.as_deref()),
        }
    }
}
