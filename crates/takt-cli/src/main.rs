//! takt CLI - Production Scheduling Engine
//!
//! Command-line interface for validating datasets, scheduling and rendering
//! Gantt charts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use takt_core::{
    DatasetSource, ScheduleError, ScheduleSink, SchedulerConfig, SolveStatus, SolvedSchedule,
    TimelineRenderer,
};
use takt_io::{JsonSink, JsonSource};
use takt_render::SvgGantt;
use takt_solver::{sim_start_for, Planner};

#[derive(Parser)]
#[command(name = "takt")]
#[command(author, version, about = "Production scheduling engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a dataset (no scheduling)
    Check {
        /// Dataset file path (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Schedule a dataset
    Schedule {
        /// Dataset file path (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Scheduler configuration (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the solved schedule to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write an SVG Gantt chart to this file
        #[arg(short, long)]
        gantt: Option<PathBuf>,

        /// Simulation start date (YYYY-MM-DD) at shift start.
        /// Defaults to the next shift from now.
        #[arg(long, value_name = "DATE")]
        as_of: Option<String>,

        /// Override the solver wall-clock limit in seconds
        #[arg(long)]
        time_limit: Option<u64>,

        /// Pin the recorded search workers to 1 for reproducible runs
        #[arg(long)]
        deterministic: bool,

        /// Let tasks float just-in-time instead of pulling them left
        #[arg(long)]
        jit: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

/// 2 for input problems the operator must fix upstream, 1 for everything
/// else (infeasibility, timeout, sink failures)
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ScheduleError>() {
        Some(ScheduleError::InputUnavailable(_) | ScheduleError::InputInconsistent { .. }) => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Schedule {
            file,
            config,
            output,
            gantt,
            as_of,
            time_limit,
            deterministic,
            jit,
        } => schedule(
            &file,
            config.as_deref(),
            output.as_deref(),
            gantt.as_deref(),
            as_of.as_deref(),
            time_limit,
            deterministic,
            jit,
        ),
    }
}

fn check(file: &std::path::Path) -> Result<()> {
    let dataset = JsonSource::new(file).load()?;
    println!(
        "ok: {} operations, {} resources in {} groups, {} BOM links",
        dataset.operations.len(),
        dataset.resources.len(),
        dataset.resource_groups.len(),
        dataset.bom.len()
    );
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<SchedulerConfig> {
    let Some(path) = path else {
        return Ok(SchedulerConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(SchedulerConfig::from_toml(&text)?)
}

#[allow(clippy::fn_params_excessive_bools)]
fn schedule(
    file: &std::path::Path,
    config_path: Option<&std::path::Path>,
    output: Option<&std::path::Path>,
    gantt: Option<&std::path::Path>,
    as_of: Option<&str>,
    time_limit: Option<u64>,
    deterministic: bool,
    jit: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(limit) = time_limit {
        config.solver_time_limit_seconds = limit;
    }
    if deterministic {
        config.deterministic = true;
    }
    if jit {
        config.enable_gravity_strategy = false;
    }

    let sim_start = match as_of {
        Some(text) => {
            let date = text
                .parse::<chrono::NaiveDate>()
                .with_context(|| format!("invalid --as-of date '{text}'"))?;
            date.and_hms_opt(config.shift_start_hour, config.shift_start_min, 0)
                .context("configured shift start is not a valid time of day")?
        }
        None => sim_start_for(chrono::Local::now().naive_local(), &config),
    };

    let dataset = JsonSource::new(file).load()?;
    let planner = Planner::new(config);
    let solved = planner.solve(&dataset, sim_start)?;

    print_summary(&solved);

    if let Some(path) = output {
        JsonSink::new(path).write(&solved)?;
        println!("schedule written to {}", path.display());
    }
    if let Some(path) = gantt {
        let svg = SvgGantt::new()
            .render(&solved.timeline)
            .context("rendering Gantt chart")?;
        fs::write(path, svg).with_context(|| format!("writing {}", path.display()))?;
        println!("Gantt chart written to {}", path.display());
    }
    Ok(())
}

fn print_summary(solved: &SolvedSchedule) {
    let summary = &solved.summary;
    let status = match summary.status {
        SolveStatus::Optimal => "optimal",
        SolveStatus::Feasible => "feasible (time limit reached)",
    };
    println!("{}", "=".repeat(50));
    println!("  SCHEDULE COMPLETE");
    println!("{}", "=".repeat(50));
    println!("Status          : {status}");
    println!("Computation time: {:.2}s", summary.wall_time_seconds);
    println!("Total lateness  : {} min", summary.total_lateness_minutes);
    println!("Makespan        : {} min", summary.makespan_minutes);
    println!("Changeover time : {} min", summary.total_changeover_minutes);
    if summary.calendar_violations > 0 {
        println!(
            "Calendar flags  : {} operation(s) touch non-working days",
            summary.calendar_violations
        );
    }
    if !solved.unscheduled.is_empty() {
        println!("Unscheduled     : {:?}", solved.unscheduled);
    }

    println!("{}", "-".repeat(50));
    println!("{:<30} | {:<12} | {:<6}", "RESOURCE", "LOAD (min)", "UTIL %");
    println!("{}", "-".repeat(50));
    for load in &solved.loads {
        println!(
            "{:<30} | {:<12} | {:.1}",
            load.name, load.load_minutes, load.utilisation_pct
        );
    }
}
