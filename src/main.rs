use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use refgraph::analysis::{Analyzer, CycleDetector, EntryPointRegistrar};
use refgraph::baseline::Baseline;
use refgraph::config::Config;
use refgraph::graph::{GraphBuilder, ParallelGraphBuilder, RefGraph, SessionConfig};
use refgraph::model::ProgramModel;
use refgraph::report::{ReportFormat, Reporter};

/// refgraph - Whole-program reference graph for unused code analysis
#[derive(Parser, Debug)]
#[command(name = "refgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the program model JSON file
    model: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Explicit entry points by external name (can be specified multiple times)
    #[arg(short, long)]
    entry_point: Vec<String>,

    /// Patterns to retain - never report as unused (can be specified multiple times)
    #[arg(short, long)]
    retain: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: OutputFormat,

    /// Output file (for json format)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Detect and report dead cycles (mutually dependent unused code)
    #[arg(long)]
    detect_cycles: bool,

    /// Build the graph in parallel
    #[arg(long)]
    parallel: bool,

    /// Baseline file for ignoring existing issues
    #[arg(long, value_name = "FILE")]
    baseline: Option<PathBuf>,

    /// Generate a baseline file from current results
    #[arg(long, value_name = "FILE")]
    generate_baseline: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
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

    info!("refgraph v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    run_analysis(&config, &cli)?;

    Ok(())
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
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        let root = cli
            .model
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Config::from_default_locations(&root)?
    };

    // Override with CLI arguments
    if !cli.entry_point.is_empty() {
        config.entry_points.extend(cli.entry_point.clone());
    }
    if !cli.retain.is_empty() {
        config.retain_patterns.extend(cli.retain.clone());
    }
    if cli.detect_cycles {
        config.detection.dead_cycles = true;
    }

    Ok(config)
}

fn run_analysis(config: &Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load the program model
    info!("Loading program model...");
    let model = ProgramModel::from_json_file(&cli.model)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to load model from {}", cli.model.display()))?;

    info!("Model contains {} declarations", model.len());

    if model.is_empty() {
        if !cli.quiet {
            println!("{}", "Model contains no declarations.".yellow());
        }
        return Ok(());
    }

    // Step 2: Build the reference graph
    let session = SessionConfig::from_config(config)?;
    let mut graph = RefGraph::new(session);

    if cli.parallel {
        info!("Building reference graph (parallel)...");
        ParallelGraphBuilder::new(&model)
            .build(&mut graph)
            .into_diagnostic()?;
    } else {
        info!("Building reference graph...");
        GraphBuilder::new(&model)
            .build(&mut graph)
            .into_diagnostic()?;
    }

    info!("Graph contains {} nodes", graph.node_count());

    // Step 3: Pin entry points
    EntryPointRegistrar::new(config).apply(&mut graph, &model);

    // Step 4: Analyze
    info!("Running analysis...");
    let analyzer = Analyzer::new(&graph, &model, config);
    let findings = analyzer.run();

    // Step 5: Generate or apply baseline
    if let Some(ref path) = cli.generate_baseline {
        let baseline = Baseline::from_findings(&findings);
        baseline.save(path).into_diagnostic()?;
        if !cli.quiet {
            println!(
                "{}",
                format!(
                    "Baseline with {} issues written to {}",
                    findings.len(),
                    path.display()
                )
                .green()
            );
        }
        return Ok(());
    }

    let findings = if let Some(ref path) = cli.baseline {
        let baseline = Baseline::load(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to load baseline from {}", path.display()))?;
        let stats = baseline.stats(&findings);
        if !cli.quiet {
            println!("{}", format!("Baseline: {}", stats).cyan());
        }
        baseline
            .filter_new(&findings)
            .into_iter()
            .cloned()
            .collect()
    } else {
        findings
    };

    // Cycle summary, in addition to the per-cycle findings
    if config.detection.dead_cycles && !cli.quiet {
        let cycles = CycleDetector::new().find_dead_cycles(&graph);
        if !cycles.is_empty() {
            let total: usize = cycles.iter().map(|c| c.members.len()).sum();
            println!(
                "{}",
                format!("{} dead cycles ({} declarations)", cycles.len(), total).yellow()
            );
        }
    }

    // Step 6: Report
    let reporter = Reporter::new(cli.format.clone().into(), cli.output.clone())
        .with_grouping(config.report.group_by == "class");
    reporter.report(&findings)?;

    let elapsed = start_time.elapsed();
    if !cli.quiet {
        println!(
            "{}",
            format!(
                "Analyzed {} declarations in {:.2}s",
                model.len(),
                elapsed.as_secs_f64()
            )
            .dimmed()
        );
    }

    Ok(())
}
