use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use evotrack::batch::{BatchDriver, ShellLauncher};
use evotrack::config::TrackerConfig;
use evotrack::params::{ExperimentKind, ParameterGrid, Parameters, TuningGrid};
use evotrack::progress::{ExperimentProgressTracker, ProgressReport};
use evotrack::simulate::{SimulationEnd, SyntheticExperiment};
use evotrack::tracker::{NestedOptimization, ResultFileMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Experiment family: evogym, robogrammar, gymrem2d, jorgenrem, tholiao
    #[arg(long)]
    experiment: Option<ExperimentKind>,

    /// List every index of the parameter grid with its parameters
    #[arg(long)]
    list_params: bool,

    /// Run one synthetic experiment process for the given grid index
    #[arg(long)]
    simulate: Option<usize>,

    /// Run the batch driver over the whole parameter grid
    #[arg(long)]
    batch: bool,

    /// Use the seed x default-inner-quantity tuning grid instead
    #[arg(long)]
    tune: bool,

    /// Command run per index by the batch driver; `{index}` is replaced
    /// (default: this binary with --simulate {index})
    #[arg(long)]
    command: Option<String>,

    /// First grid index to run; earlier indices count as complete
    #[arg(long)]
    start_index: Option<usize>,

    /// Completed-index file of the batch driver
    #[arg(long)]
    progress_file: Option<String>,

    /// Directory of per-run result logs
    #[arg(long)]
    results_dir: Option<String>,

    /// Override the step budget of each run
    #[arg(long)]
    max_frames: Option<u64>,

    /// Stop a synthetic run after this many outer evaluations
    #[arg(long)]
    max_evaluations: Option<u64>,

    /// Delete a run's previous result log instead of appending to it
    #[arg(long)]
    truncate: bool,

    /// Hide the batch progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config = TrackerConfig::load()?;
    apply_overrides(&args, &mut config);

    if args.batch && args.simulate.is_some() {
        eprintln!("Error: --batch and --simulate are mutually exclusive");
        std::process::exit(1);
    }

    if args.list_params {
        list_params(&args, &config);
        return Ok(());
    }

    if let Some(index) = args.simulate {
        return run_simulation(&args, &config, index);
    }

    if args.batch {
        return run_batch(&args, &config);
    }

    eprintln!("Nothing to do. Use one of --list-params, --simulate <index>, --batch");
    std::process::exit(1);
}

fn apply_overrides(args: &Args, config: &mut TrackerConfig) {
    if let Some(kind) = args.experiment {
        config.batch.experiment = kind;
    }
    if let Some(start) = args.start_index {
        config.batch.start_index = start;
    }
    if let Some(path) = &args.progress_file {
        config.paths.progress_file = path.clone();
    } else if args.tune {
        config.paths.progress_file = format!(
            "{}tune_{}",
            config.batch.experiment, config.paths.progress_file
        );
    }
    if let Some(dir) = &args.results_dir {
        config.paths.results_dir = dir.clone();
    }
    if args.max_frames.is_some() {
        config.tracker.max_frames = args.max_frames;
    }
    if args.truncate {
        config.tracker.truncate_existing = true;
    }
    if args.quiet {
        config.batch.progress_bar = false;
    }
}

/// Number of runs and parameters of each, for the selected grid
fn grid_len(args: &Args, kind: ExperimentKind) -> usize {
    if args.tune {
        TuningGrid::standard(kind).len()
    } else {
        ParameterGrid::standard(kind).len()
    }
}

fn grid_params(args: &Args, config: &TrackerConfig, index: usize) -> anyhow::Result<Parameters> {
    let kind = config.batch.experiment;
    let mut params = if args.tune {
        TuningGrid::standard(kind).get(index)?
    } else {
        ParameterGrid::standard(kind).get(index)?
    };
    if let Some(max_frames) = config.tracker.max_frames {
        params.max_frames = max_frames;
    }
    Ok(params)
}

fn list_params(args: &Args, config: &TrackerConfig) {
    let kind = config.batch.experiment;
    let total = grid_len(args, kind);
    println!("Total number of executions: {}", total);
    for index in 0..total {
        if let Ok(params) = grid_params(args, config, index) {
            println!(
                "{:>4}: seed={} inner_quantity={} inner_length={} max_frames={} -> {}.txt",
                index,
                params.seed,
                params.inner_quantity(),
                params.inner_length(),
                params.max_frames,
                params.result_file_name()
            );
        }
    }
}

fn run_simulation(args: &Args, config: &TrackerConfig, index: usize) -> anyhow::Result<()> {
    let params = grid_params(args, config, index)?;
    log::info!("Parameters current execution:\n{}", params.describe());

    let results_dir = PathBuf::from(&config.paths.results_dir);
    let mut no = NestedOptimization::for_parameters(
        &results_dir,
        &params,
        config.tracker.mode,
        config.tracker.file_mode(),
    )
    .context("Failed to create result log")?;

    let mut experiment = SyntheticExperiment::new(&params).with_artifact_dir(&results_dir);
    if let Some(max) = args.max_evaluations {
        experiment = experiment.with_max_evaluations(max);
    }

    match experiment.run(&mut no)? {
        SimulationEnd::BudgetExhausted { evaluations } => log::info!(
            "Budget of {} frames exhausted after {} evaluations, best {}",
            no.max_frames(),
            evaluations,
            no.f_best()
        ),
        SimulationEnd::EvaluationLimit { evaluations } => log::info!(
            "Stopped after {} evaluations at step {}, best {}",
            evaluations,
            no.step(),
            no.f_best()
        ),
    }
    log::logger().flush();
    Ok(())
}

fn run_batch(args: &Args, config: &TrackerConfig) -> anyhow::Result<()> {
    let kind = config.batch.experiment;
    let total = grid_len(args, kind);

    let template = match &args.command {
        Some(command) => command.clone(),
        None => default_command(args, config)?,
    };

    log::info!("Starting batch: {} x {} runs", kind, total);
    log::info!("  Progress file: {}", config.paths.progress_file);
    log::info!("  Command: {}", template);

    let progress = ExperimentProgressTracker::new(
        &config.paths.progress_file,
        config.batch.start_index,
        total,
    )
    .context("Failed to load batch progress")?;

    if progress.is_done() {
        log::info!("All {} runs already complete", total);
        return Ok(());
    }

    let mut driver = BatchDriver::new(progress).with_progress_bar(config.batch.progress_bar);
    match ProgressReport::start(&config.paths.report_file) {
        Ok(report) => driver = driver.with_report(report),
        Err(e) => log::warn!("Progress report disabled: {}", e),
    }

    let mut launcher = ShellLauncher::new(template);
    let summary = driver.run(&mut launcher)?;
    log::info!(
        "Batch complete: {} launched, {} previously complete",
        summary.launched.len(),
        summary.skipped
    );
    Ok(())
}

/// This binary in simulate mode, with the batch's settings forwarded
fn default_command(args: &Args, config: &TrackerConfig) -> anyhow::Result<String> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    let mut command = format!(
        "'{}' --experiment {} --simulate {{index}} --results-dir '{}'",
        exe.display(),
        config.batch.experiment,
        config.paths.results_dir
    );
    if args.tune {
        command.push_str(" --tune");
    }
    if let Some(max_frames) = config.tracker.max_frames {
        command.push_str(&format!(" --max-frames {}", max_frames));
    }
    if let Some(max) = args.max_evaluations {
        command.push_str(&format!(" --max-evaluations {}", max));
    }
    if config.tracker.file_mode() == ResultFileMode::Truncate {
        command.push_str(" --truncate");
    }
    Ok(command)
}
