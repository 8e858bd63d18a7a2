use crate::application::BuildReport;
use crate::graph::{EdgeKind, Symbol};
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Print every removed class and member, not just the counts
    verbose: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_details(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn report(&self, build: &BuildReport) -> Result<()> {
        println!();
        println!(
            "{} {}",
            "Built".green().bold(),
            build.output.display().to_string().cyan().bold()
        );
        if let Some(main) = &build.main_class {
            println!("  main class: {}", main);
        }

        let merge = &build.merge;
        println!(
            "  merged {} sources: {} copied, {} removed, {} concatenated, {} overwritten, {} equal",
            merge.sources, merge.copied, merge.removed, merge.concatenated, merge.overwritten, merge.equal
        );
        if merge.registry_components > 0 {
            println!("  plexus components: {}", merge.registry_components);
        }

        if let Some(strip) = &build.strip {
            println!(
                "  reachable: {} classes, {} behaviors, {} fields",
                strip.reachable.units, strip.reachable.behaviors, strip.reachable.members
            );
            println!(
                "  stripped: {} classes, {} members (log: {})",
                strip.log.deleted.len().to_string().yellow(),
                strip.log.removed_members().to_string().yellow(),
                strip.log_path.display()
            );
            if self.verbose {
                for line in strip.log.to_string().lines() {
                    println!("    {}", line.dimmed());
                }
            }
            if !strip.unresolved.is_empty() {
                println!(
                    "  {} {} unresolved symbols",
                    "warning:".yellow().bold(),
                    strip.unresolved.len()
                );
                for unresolved in &strip.unresolved {
                    println!("    {} {}", unresolved.symbol, format!("(from {})", unresolved.referrer).dimmed());
                }
            }
            for method in &strip.native_methods {
                println!("  {} native method {}", "warning:".yellow().bold(), method);
            }
        }
        println!();
        Ok(())
    }

    pub fn explain(&self, symbol: &str, chain: Option<&[(Option<EdgeKind>, &Symbol)]>) {
        let Some(chain) = chain else {
            println!("{} is {}", symbol.bold(), "not reachable".red().bold());
            return;
        };
        println!("{} is reachable:", symbol.bold());
        for (depth, (edge, step)) in chain.iter().enumerate() {
            let indent = "  ".repeat(depth + 1);
            match edge {
                None => println!("{}{} {}", indent, step.to_string().cyan(), "(root)".dimmed()),
                Some(kind) => println!("{}{} {}", indent, format!("{} ->", kind).dimmed(), step),
            }
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
