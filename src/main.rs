use appjar::application::{Application, Progress};
use appjar::config::{Config, ConfigError, DependencyConfig};
use appjar::report::{ReportFormat, Reporter, TerminalReporter};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use miette::Result;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// appjar - merge dependency jars into one application jar and strip unreachable classes
#[derive(Parser, Debug)]
#[command(name = "appjar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory; configuration is looked up here
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Application name, the jar is written as <NAME>.jar
    #[arg(long)]
    name: Option<String>,

    /// Fully qualified main class
    #[arg(short, long)]
    main: Option<String>,

    /// Output jar (overrides --output-dir and --name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory the jar is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// The project's own jar or class directory, merged last
    #[arg(long, value_name = "PATH")]
    project_jar: Option<PathBuf>,

    /// Dependency to merge, in order (can be specified multiple times)
    #[arg(short, long, value_name = "LABEL=PATH[@SCOPE]")]
    dependency: Vec<String>,

    /// Scopes to include (comma-separated)
    #[arg(long)]
    scopes: Option<String>,

    /// Patterns deleted from every source (comma-separated)
    #[arg(long)]
    remove: Option<String>,

    /// Patterns concatenated across sources (comma-separated)
    #[arg(long)]
    concat: Option<String>,

    /// Patterns where later sources win (comma-separated)
    #[arg(long)]
    overwrite: Option<String>,

    /// Patterns where identical copies are accepted (comma-separated)
    #[arg(long)]
    equal: Option<String>,

    /// Remove classes and members unreachable from the roots
    #[arg(long)]
    strip: bool,

    /// Extra strip roots: classes or Class.method (comma-separated)
    #[arg(long)]
    roots: Option<String>,

    /// Jar, jmod or class directory resolvable during analysis (can be specified multiple times)
    #[arg(long, value_name = "PATH")]
    runtime_classpath: Vec<PathBuf>,

    /// Fail when a referenced class is on no classpath
    #[arg(long)]
    strict_unresolved: bool,

    /// Strip log file
    #[arg(long, value_name = "FILE")]
    strip_log: Option<PathBuf>,

    /// Explain why a symbol was kept (a.B, a.B.field, a.B.method or a.B.method(I))
    #[arg(long, value_name = "SYMBOL")]
    why: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: OutputFormat,

    /// Report file (for json format)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("appjar v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    run(config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(&cli.path)?
    };

    // CLI arguments override the file
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(main) = &cli.main {
        config.main = Some(main.clone());
    }
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(project_jar) = &cli.project_jar {
        config.project_jar = Some(project_jar.clone());
    }
    for spec in &cli.dependency {
        config.dependencies.push(DependencyConfig::parse(spec)?);
    }
    if let Some(scopes) = &cli.scopes {
        config.scopes = appjar::config::split_list("scopes", scopes)?;
    }
    for (target, value) in [
        (&mut config.merge.remove, &cli.remove),
        (&mut config.merge.concat, &cli.concat),
        (&mut config.merge.overwrite, &cli.overwrite),
        (&mut config.merge.equal, &cli.equal),
    ] {
        if let Some(value) = value {
            *target = join_lists(target, value);
        }
    }
    if cli.strip {
        config.strip.enabled = true;
    }
    if let Some(roots) = &cli.roots {
        config.strip.roots = join_lists(&config.strip.roots, roots);
    }
    config.strip.runtime_classpath.extend(cli.runtime_classpath.iter().cloned());
    if cli.strict_unresolved {
        config.strip.strict_unresolved = true;
    }
    if let Some(log) = &cli.strip_log {
        config.strip.log = Some(log.clone());
    }

    Ok(config)
}

/// Pattern lists from the command line extend the configured ones
fn join_lists(configured: &str, extra: &str) -> String {
    if configured.is_empty() {
        extra.to_string()
    } else {
        format!("{},{}", configured, extra)
    }
}

fn run(config: Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    let app = Application::new(config)?;

    let inputs = app.inputs();
    if inputs.is_empty() {
        return Err(ConfigError::Missing {
            key: "dependencies or project_jar",
        }
        .into());
    }

    let total = inputs.len() as u64;
    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let build = app.build_with(|progress| match progress {
        Progress::Merging { label, index, .. } => {
            pb.set_position(index as u64);
            pb.set_message(label.to_string());
        }
        Progress::Verifying => {
            pb.set_position(total);
            pb.set_message("verifying entry point");
        }
        Progress::Stripping => pb.set_message("stripping"),
        Progress::Writing => pb.set_message("writing"),
    });
    pb.finish_and_clear();
    let build = build?;

    let format: ReportFormat = cli.format.clone().into();
    let reporter = Reporter::new(format, cli.report.clone());
    if format == ReportFormat::Terminal && cli.verbose {
        TerminalReporter::new().with_details(true).report(&build)?;
    } else if !cli.quiet || format == ReportFormat::Json {
        reporter.report(&build)?;
    }

    if !cli.why.is_empty() {
        match &build.reachability {
            Some(reachability) => {
                for symbol in &cli.why {
                    reporter.explain(symbol, reachability.explain(symbol))?;
                }
            }
            None => println!("{}", "--why needs --strip".yellow()),
        }
    }

    if !cli.quiet && format == ReportFormat::Terminal {
        println!(
            "{}",
            format!("Done in {:.2}s", start_time.elapsed().as_secs_f64()).dimmed()
        );
    }
    Ok(())
}
