//! # takt-solver
//!
//! Scheduling engine for takt: changeover costs, precedence derivation,
//! the constraint model, the bounded CP search and result materialisation.
//!
//! The pipeline is one synchronous pass per invocation: index the dataset,
//! derive precedences, build the model, solve within the wall-clock budget,
//! then materialise solver minutes back to real datetimes on each machine's
//! own calendar. No state survives between invocations.
//!
//! ## Example
//!
//! ```no_run
//! use takt_core::{Dataset, SchedulerConfig};
//! use takt_solver::Planner;
//!
//! let dataset = Dataset::default();
//! let sim_start = chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
//!     .and_hms_opt(8, 0, 0).unwrap();
//! let planner = Planner::new(SchedulerConfig::default());
//! let solved = planner.solve(&dataset, sim_start).unwrap();
//! println!("makespan: {} min", solved.summary.makespan_minutes);
//! ```

use std::collections::HashMap;
use std::time::Instant;

use chrono::{Days, NaiveDateTime, Timelike};
use tracing::info;

use takt_core::calendar::build_calendars;
use takt_core::{
    Dataset, ResourceId, ScheduleError, SchedulerConfig, SolvedSchedule, WorkingCalendar,
};

pub mod changeover;
pub mod materialise;
pub mod model;
pub mod precedence;

pub use changeover::ChangeoverEngine;
pub use model::{ModelContext, SolveResult};
pub use precedence::{build_precedences, PrecedenceEdge};

/// Upper bound of the solver time axis: the best-supplied machine's working
/// minutes over the planning window, floored at sixty uniform shifts so
/// sparse calendars still leave room to schedule.
pub fn select_horizon(
    ds: &Dataset,
    calendars: &HashMap<ResourceId, WorkingCalendar>,
    sim_start: NaiveDateTime,
    config: &SchedulerConfig,
) -> i64 {
    let best = ds
        .resources
        .iter()
        .filter_map(|r| calendars.get(&r.resource_id))
        .map(|cal| cal.working_minutes_over(sim_start.date(), config.planning_days))
        .max()
        .unwrap_or(0);
    best.max(60 * config.shift_duration_minutes())
}

/// Simulation start for a run launched "now": today at the configured shift
/// start, or tomorrow when the shift is already over.
pub fn sim_start_for(now: NaiveDateTime, config: &SchedulerConfig) -> NaiveDateTime {
    let mut start = now
        .date()
        .and_hms_opt(config.shift_start_hour, config.shift_start_min, 0)
        .unwrap_or_else(|| now.date().and_hms_opt(8, 0, 0).expect("08:00 is a valid time"));
    if now.hour() >= config.shift_end_hour {
        start = start
            .checked_add_days(Days::new(1))
            .unwrap_or(start);
    }
    start
}

/// The scheduling engine. One blocking solve per call.
pub struct Planner {
    config: SchedulerConfig,
}

impl Planner {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run the full pipeline over one dataset.
    pub fn solve(
        &self,
        ds: &Dataset,
        sim_start: NaiveDateTime,
    ) -> Result<SolvedSchedule, ScheduleError> {
        let started = Instant::now();

        let index = ds.index()?;
        let calendars = build_calendars(ds, &self.config);
        let changeover = ChangeoverEngine::new(ds, &index);
        let edges = build_precedences(ds, &index);
        let horizon = select_horizon(ds, &calendars, sim_start, &self.config);
        info!(
            operations = ds.operations.len(),
            resources = ds.resources.len(),
            precedences = edges.len(),
            horizon,
            workers = self.config.effective_workers(),
            "building constraint model"
        );

        let ctx = ModelContext {
            ds,
            index: &index,
            edges: &edges,
            changeover: &changeover,
            config: &self.config,
            horizon,
            sim_start,
        };
        let result = model::solve_model(&ctx)?;

        materialise::materialise_schedule(
            ds,
            &result,
            &changeover,
            &calendars,
            &self.config,
            sim_start,
            started.elapsed(),
        )
    }
}
