//! xlate-bench - transpilation validation CLI
//!
//! ## Commands
//!
//! - `run`: Build, transpile and test every program listed in a metadata file
//! - `plan`: Show the flag matrix and commands a run would execute

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use xlate_bench::{
    combinations, metadata, write_results, Pipeline, PipelineConfig, ResultSet, ShellExecutor,
    Side, StageKind, StageTimeouts, TranspilePolicy,
};

#[derive(Parser)]
#[command(name = "xlate-bench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate C-to-Rust transpilation against each program's own tests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over every program and write the results
    Run(RunArgs),

    /// Print the flag combinations and commands without running anything
    Plan(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Program metadata file (JSON)
    #[arg(short, long, env = "XLATE_BENCH_METADATA", default_value = "metadata.json")]
    metadata: PathBuf,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, env = "XLATE_BENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory relative program paths are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Flags used for the build preceding transpilation: all or none
    #[arg(long)]
    transpile_flags: Option<TranspilePolicy>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Where to write the results (JSON)
    #[arg(short, long, default_value = "test_results.json")]
    output: PathBuf,

    /// Number of programs processed concurrently
    #[arg(short, long, env = "XLATE_BENCH_JOBS")]
    jobs: Option<usize>,

    /// Timeout applied to every stage, in seconds (0 disables)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Exit with an error if any program failed
    #[arg(long)]
    require_pass: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    xlate_bench::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::Plan(args) => cmd_plan(&args),
    }
}

/// Merge the config file (if any) with command-line overrides.
fn load_config(args: &ConfigArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())
        .context("Failed to load pipeline configuration")?;

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(policy) = args.transpile_flags {
        config.transpile_flags = policy;
    }
    Ok(config)
}

fn run_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = load_config(&args.config)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(secs) = args.timeout_secs {
        config.timeouts = StageTimeouts::uniform(secs);
    }
    Ok(config)
}

/// Run the pipeline and write the results file.
async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = run_config(args)?;
    let programs = metadata::load(&args.config.metadata, config.max_optional_flags)
        .context("Failed to load program metadata")?;

    info!(
        programs = programs.len(),
        jobs = config.jobs,
        transpile_flags = %config.transpile_flags,
        "Running transpilation pipeline"
    );

    let pipeline = Pipeline::new(Arc::new(ShellExecutor::new()), config);
    let set = pipeline.run(&programs).await.context("Pipeline run failed")?;

    write_results(&args.output, &set).context("Failed to write results")?;

    print_summary(&set, &args.output);

    if args.require_pass && !set.summary.all_passed() {
        anyhow::bail!("{} of {} programs failed", set.summary.failed, set.summary.total);
    }
    Ok(())
}

fn print_summary(set: &ResultSet, output: &Path) {
    println!("Run ID: {}", set.run_id);
    println!("Duration: {}ms", set.duration_ms());
    println!();

    for program in &set.programs {
        match program.failed_stage {
            None => println!("  ✓ {}", program.name),
            Some(stage) => println!("  ✗ {} (failed at {})", program.name, stage),
        }
    }

    println!();
    println!("Summary: {}/{} programs passed", set.summary.passed, set.summary.total);
    for stage in StageKind::ALL {
        let count = set.summary.failed_at(stage);
        if count > 0 {
            println!("  failed at {}: {}", stage, count);
        }
    }
    println!("Results written to {}", output.display());
}

/// Print the matrix a run would execute.
fn cmd_plan(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    let programs = metadata::load(&args.metadata, config.max_optional_flags)
        .context("Failed to load program metadata")?;
    let commands = &config.commands;

    let mut total_commands = 0usize;
    for program in &programs {
        let combos = combinations(&program.optional_flags);
        println!(
            "{} ({}) - {} combination(s), {} test(s)",
            program.name,
            program.working_dir(&config.root).display(),
            combos.len(),
            program.test_files.len()
        );
        for side in [Side::C, Side::Rust] {
            for flags in &combos {
                println!("  [{}] {}", side.name(), flags);
                println!("    {}", commands.build_command(side, flags));
                for test in &program.test_files {
                    println!("    {}", commands.link_command(side, flags, test));
                    println!("    {}", commands.execute_command(side, flags, test));
                }
                total_commands += 2 + 2 * program.test_files.len();
            }
        }
        let transpile_flags = config.transpile_flags.flags_for(program);
        println!("  [transpile] {}", commands.transpile_command(&transpile_flags));
        total_commands += 3;
    }

    println!();
    println!("{} programs, up to {} commands", programs.len(), total_commands);
    Ok(())
}
